use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::booking::BookingError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Username or password is incorrect".into())
    }

    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        let msg = e.to_string();
        match e {
            BookingError::MissingFields | BookingError::InPast => {
                ApiError::BadRequest("VALIDATION_ERROR", msg)
            }
            BookingError::SlotNotFound => ApiError::NotFound("SLOT_NOT_FOUND", msg),
            BookingError::ServiceTooLong => ApiError::BadRequest("SERVICE_TOO_LONG", msg),
            BookingError::SlotUnavailable => ApiError::Conflict("SLOT_UNAVAILABLE", msg),
            BookingError::NotFound => ApiError::NotFound("NOT_FOUND", msg),
            BookingError::AlreadyFinalized(_) => ApiError::Conflict("ALREADY_FINALIZED", msg),
            BookingError::Persistence(detail) => ApiError::Internal(format!("db error: {detail}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use crate::booking::BookingError;
    use crate::models::AppointmentStatus;

    use super::ApiError;

    async fn response_parts(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn slot_unavailable_maps_to_conflict() {
        let (status, body) = response_parts(BookingError::SlotUnavailable.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "SLOT_UNAVAILABLE");
    }

    #[tokio::test]
    async fn missing_fields_map_to_bad_request() {
        let (status, body) = response_parts(BookingError::MissingFields.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn already_finalized_maps_to_conflict_with_status_in_message() {
        let (status, body) = response_parts(
            BookingError::AlreadyFinalized(AppointmentStatus::Cancelled).into(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "ALREADY_FINALIZED");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("cancelled"));
    }

    #[tokio::test]
    async fn persistence_failures_stay_internal() {
        let (status, body) =
            response_parts(BookingError::Persistence("pool timed out".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL");
    }
}
