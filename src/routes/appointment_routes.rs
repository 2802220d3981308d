// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    booking::workflow::BookingRequest,
    booking::BookingError,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, AppointmentRow, AppointmentType},
};

/*
Roles (app_user.role):
0 patient
1 admin
2 provider
*/

fn is_admin(auth: &AuthContext) -> bool {
    auth.role == 1
}
fn is_patient(auth: &AuthContext) -> bool {
    auth.role == 0
}

fn can_touch(auth: &AuthContext, appt: &AppointmentRow) -> bool {
    is_admin(auth) || appt.patient_id == auth.user_id || appt.provider_id == auth.user_id
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(book_appointment))
        .route("/appointments", get(list_appointments))
        .route("/appointments/availability", get(check_availability))
        .route("/appointments/{appointment_id}", get(get_appointment))
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
        .route("/appointments/{appointment_id}/reschedule", post(reschedule_appointment))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct AppointmentDto {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: String,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppointmentRow> for AppointmentDto {
    fn from(row: AppointmentRow) -> Self {
        Self {
            appointment_id: row.appointment_id,
            patient_id: row.patient_id,
            provider_id: row.provider_id,
            service_id: row.service_id,
            appointment_date: row.appointment_date,
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status.as_str().to_string(),
            appointment_type: row.appointment_type,
            notes: row.notes,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BookRequestBody {
    pub patient_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub appointment_type: Option<AppointmentType>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequestBody {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequestBody {
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// "upcoming" (default) or "past"
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub provider_id: Uuid,
    pub service_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityDto {
    pub available: bool,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

/* ============================================================
   Handlers
   ============================================================ */

pub async fn book_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<BookRequestBody>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    // Patients always book for themselves; staff may book on behalf.
    let patient_id = if is_patient(&auth) {
        Some(auth.user_id)
    } else {
        body.patient_id
    };

    let row = state
        .booking
        .book(BookingRequest {
            patient_id,
            provider_id: body.provider_id,
            service_id: body.service_id,
            appointment_date: body.appointment_date,
            start_time: body.start_time,
            appointment_type: body.appointment_type.unwrap_or_default(),
            notes: body.notes,
        })
        .await?;

    Ok(Json(ApiOk { data: row.into() }))
}

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<AppointmentDto>>>, ApiError> {
    let scope = q.scope.as_deref().unwrap_or("upcoming");
    let upcoming = match scope {
        "upcoming" => true,
        "past" => false,
        other => {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                format!("scope must be 'upcoming' or 'past', got '{other}'"),
            ));
        }
    };

    // Patients see their own bookings, providers their own schedule,
    // admins everything.
    let (party_filter, bind_user) = if is_admin(&auth) {
        ("TRUE", false)
    } else if is_patient(&auth) {
        ("patient_id = $1", true)
    } else {
        ("provider_id = $1", true)
    };

    let scope_filter = if upcoming {
        "appointment_date >= CURRENT_DATE AND status = 0"
    } else {
        "(appointment_date < CURRENT_DATE OR status <> 0)"
    };
    let order = if upcoming {
        "appointment_date ASC, start_time ASC"
    } else {
        "appointment_date DESC, start_time DESC"
    };

    let sql = format!(
        r#"
        SELECT
          appointment_id,
          patient_id,
          provider_id,
          service_id,
          appointment_date,
          start_time,
          end_time,
          status,
          appointment_type,
          notes,
          cancellation_reason,
          created_at,
          updated_at
        FROM appointment
        WHERE {party_filter}
          AND {scope_filter}
        ORDER BY {order}
        "#
    );

    let mut query = sqlx::query_as::<_, AppointmentRow>(&sql);
    if bind_user {
        query = query.bind(auth.user_id);
    }

    let rows = query
        .fetch_all(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk {
        data: rows.into_iter().map(AppointmentDto::from).collect(),
    }))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let row = load_appointment(&state, appointment_id).await?;

    if !can_touch(&auth, &row) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You are not a party to this appointment".into(),
        ));
    }

    Ok(Json(ApiOk { data: row.into() }))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(body): Json<CancelRequestBody>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let row = load_appointment(&state, appointment_id).await?;
    if !can_touch(&auth, &row) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You are not a party to this appointment".into(),
        ));
    }

    let row = state
        .booking
        .cancel(appointment_id, body.reason, auth.user_id)
        .await?;

    Ok(Json(ApiOk { data: row.into() }))
}

pub async fn reschedule_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(body): Json<RescheduleRequestBody>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let row = load_appointment(&state, appointment_id).await?;
    if !can_touch(&auth, &row) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You are not a party to this appointment".into(),
        ));
    }

    let row = state
        .booking
        .reschedule(appointment_id, body.appointment_date, body.start_time, auth.user_id)
        .await?;

    Ok(Json(ApiOk { data: row.into() }))
}

/// Dry-run check a window before the patient commits to booking it.
pub async fn check_availability(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<AvailabilityQuery>,
) -> Result<Json<ApiOk<AvailabilityDto>>, ApiError> {
    let probe = state
        .booking
        .probe(q.provider_id, q.service_id, q.appointment_date, q.start_time)
        .await;

    let dto = match probe {
        Ok(end_time) => AvailabilityDto {
            available: true,
            end_time: Some(end_time),
            reason: None,
        },
        Err(e @ BookingError::Persistence(_)) => return Err(e.into()),
        Err(e) => AvailabilityDto {
            available: false,
            end_time: None,
            reason: Some(e.to_string()),
        },
    };

    Ok(Json(ApiOk { data: dto }))
}

/* ============================================================
   Helpers
   ============================================================ */

async fn load_appointment(
    state: &AppState,
    appointment_id: Uuid,
) -> Result<AppointmentRow, ApiError> {
    sqlx::query_as::<_, AppointmentRow>(
        r#"
        SELECT
          appointment_id,
          patient_id,
          provider_id,
          service_id,
          appointment_date,
          start_time,
          end_time,
          status,
          appointment_type,
          notes,
          cancellation_reason,
          created_at,
          updated_at
        FROM appointment
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "appointment not found".into()))
}
