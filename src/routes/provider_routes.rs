// src/routes/provider_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, SlotRow},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_providers))
        .route("/{provider_id}/slots", get(list_provider_slots))
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ProviderDto {
    pub user_id: Uuid,
    pub display_name: String,
}

pub async fn list_providers(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<ProviderDto>>>, ApiError> {
    let rows: Vec<ProviderDto> = sqlx::query_as::<_, ProviderDto>(
        r#"
        SELECT user_id, display_name
        FROM app_user
        WHERE role = 2
          AND is_active = true
        ORDER BY display_name ASC
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

pub async fn list_provider_slots(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(provider_id): Path<Uuid>,
    Query(q): Query<SlotsQuery>,
) -> Result<Json<ApiOk<Vec<SlotRow>>>, ApiError> {
    let rows: Vec<SlotRow> = sqlx::query_as::<_, SlotRow>(
        r#"
        SELECT
          slot_id,
          provider_id,
          slot_date,
          start_time,
          end_time
        FROM provider_slot
        WHERE provider_id = $1
          AND slot_date = $2
        ORDER BY start_time ASC
        "#,
    )
    .bind(provider_id)
    .bind(q.date)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}
