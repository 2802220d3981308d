// src/routes/activity_routes.rs

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ActivityLogRow, AppState},
};

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == 1 {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admin can view the activity feed".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/activity", get(list_activity))
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

pub async fn list_activity(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ActivityQuery>,
) -> Result<Json<ApiOk<Vec<ActivityLogRow>>>, ApiError> {
    ensure_admin(&auth)?;

    let limit = q.limit.unwrap_or(100).clamp(1, 500);

    let rows: Vec<ActivityLogRow> = sqlx::query_as::<_, ActivityLogRow>(
        r#"
        SELECT activity_id, user_id, description, category, created_at
        FROM activity_log
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}
