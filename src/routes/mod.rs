use crate::models::AppState;
use axum::Router;

pub mod activity_routes;
pub mod appointment_routes;
pub mod auth_routes;
pub mod notification_routes;
pub mod provider_routes;
pub mod service_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1/services", service_routes::router())
        .nest("/api/v1/providers", provider_routes::router())
        .nest("/api/v1", appointment_routes::router())
        .nest("/api/v1", notification_routes::router())
        .nest("/api/v1", activity_routes::router())
        .with_state(state)
}
