// src/routes/notification_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, NotificationRow, OkData, OkResponse},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/{notification_id}/read", post(mark_read))
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

/// Personal notifications, newest first. Admins additionally see system
/// notices addressed to the admin audience.
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<NotificationRow>>>, ApiError> {
    let audience_filter = if auth.role == 1 {
        "(user_id = $1 OR (is_system AND audience = 'admin'))"
    } else {
        "user_id = $1"
    };

    let sql = format!(
        r#"
        SELECT
          notification_id,
          user_id,
          subject,
          message,
          notification_type,
          appointment_id,
          is_system,
          audience,
          is_read,
          created_at
        FROM notification
        WHERE {audience_filter}
        ORDER BY created_at DESC
        LIMIT 200
        "#
    );

    let rows: Vec<NotificationRow> = sqlx::query_as::<_, NotificationRow>(&sql)
        .bind(auth.user_id)
        .fetch_all(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}

// Admins may also clear the system notices addressed to the admin audience;
// everyone else only touches their own rows.
fn mark_read_filter(role: i16) -> &'static str {
    if role == 1 {
        "(user_id = $2 OR (user_id IS NULL AND is_system AND audience = 'admin'))"
    } else {
        "user_id = $2"
    }
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    let owner_filter = mark_read_filter(auth.role);

    let sql = format!(
        r#"
        UPDATE notification
        SET is_read = true
        WHERE notification_id = $1
          AND {owner_filter}
        "#
    );

    let res = sqlx::query(&sql)
        .bind(notification_id)
        .bind(auth.user_id)
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound(
            "NOT_FOUND",
            "notification not found or not yours".into(),
        ));
    }

    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}

#[cfg(test)]
mod tests {
    use super::mark_read_filter;

    #[test]
    fn admins_can_clear_admin_audience_notices() {
        assert!(mark_read_filter(1).contains("audience = 'admin'"));
    }

    #[test]
    fn patients_and_providers_only_touch_their_own_rows() {
        assert_eq!(mark_read_filter(0), "user_id = $2");
        assert_eq!(mark_read_filter(2), "user_id = $2");
    }
}
