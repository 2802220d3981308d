// src/booking/workflow.rs
//
// Orchestrates booking, cancellation and reschedule on top of the store and
// the event sink. All validation happens here; the store only guards the
// final check-then-write race.

use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::models::{AppointmentRow, AppointmentType};

use super::availability::check_window;
use super::duration::{end_of_window, resolve_duration};
use super::events::{BookingEvent, BookingEventKind, EventSink};
use super::store::{BookingStore, NewAppointment, StoreError};
use super::BookingError;

/// Incoming booking fields, unvalidated. Required fields are optional here so
/// the workflow owns the missing-field check instead of the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct BookingRequest {
    pub patient_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
}

pub struct BookingWorkflow<S, E> {
    store: S,
    events: E,
}

impl<S, E> BookingWorkflow<S, E>
where
    S: BookingStore,
    E: EventSink,
{
    pub fn new(store: S, events: E) -> Self {
        Self { store, events }
    }

    /// Book an appointment. On success the scheduled row is committed and the
    /// parties are notified; notification failures never undo the booking.
    pub async fn book(&self, req: BookingRequest) -> Result<AppointmentRow, BookingError> {
        let (Some(patient_id), Some(provider_id), Some(date), Some(start)) = (
            req.patient_id,
            req.provider_id,
            req.appointment_date,
            req.start_time,
        ) else {
            return Err(BookingError::MissingFields);
        };

        reject_past(date, start)?;

        let service = match req.service_id {
            Some(id) => self.store.get_service(id).await.map_err(persistence)?,
            None => None,
        };
        let minutes = resolve_duration(service.as_ref());
        let end = end_of_window(start, minutes).ok_or(BookingError::ServiceTooLong)?;

        check_window(&self.store, provider_id, date, start, end, None).await?;

        let new = NewAppointment {
            patient_id,
            provider_id,
            service_id: service.as_ref().map(|s| s.service_id),
            appointment_date: date,
            start_time: start,
            end_time: end,
            appointment_type: req.appointment_type,
            notes: req.notes,
        };

        let appointment_id = match self.store.insert_scheduled(&new).await {
            Ok(id) => id,
            Err(StoreError::Overlap) => return Err(BookingError::SlotUnavailable),
            Err(other) => return Err(persistence(other)),
        };

        let row = self
            .store
            .get_appointment(appointment_id)
            .await
            .map_err(persistence)?
            .ok_or(BookingError::NotFound)?;

        let when = format_window(date, start, end);
        self.emit(BookingEvent::for_user(
            BookingEventKind::Booked,
            appointment_id,
            patient_id,
            "Appointment booked",
            format!("Your appointment on {when} is confirmed."),
        ))
        .await;
        self.emit(BookingEvent::for_user(
            BookingEventKind::Booked,
            appointment_id,
            provider_id,
            "New appointment",
            format!("A patient booked {when}."),
        ))
        .await;
        self.emit(BookingEvent::for_admins(
            BookingEventKind::Booked,
            appointment_id,
            "Appointment booked",
            format!("Appointment {appointment_id} booked for {when}."),
        ))
        .await;
        self.record(
            patient_id,
            format!("Booked appointment {appointment_id} for {when}"),
            "appointment",
        )
        .await;

        Ok(row)
    }

    /// Cancel a scheduled appointment. Terminal appointments are rejected and
    /// their recorded reason is never overwritten.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
        requester_id: Uuid,
    ) -> Result<AppointmentRow, BookingError> {
        let current = self
            .store
            .get_appointment(appointment_id)
            .await
            .map_err(persistence)?
            .ok_or(BookingError::NotFound)?;

        if current.status.is_terminal() {
            return Err(BookingError::AlreadyFinalized(current.status));
        }

        let reason = reason.unwrap_or_else(|| "Cancelled by user".to_string());
        let row = match self.store.mark_cancelled(appointment_id, &reason).await {
            Ok(row) => row,
            // Lost a race with a competing cancel or completion.
            Err(StoreError::Stale) => return Err(self.refetch_finalized(appointment_id).await),
            Err(other) => return Err(persistence(other)),
        };

        let when = format_window(row.appointment_date, row.start_time, row.end_time);
        self.emit(BookingEvent::for_user(
            BookingEventKind::Cancelled,
            appointment_id,
            row.patient_id,
            "Appointment cancelled",
            format!("Your appointment on {when} was cancelled."),
        ))
        .await;
        self.emit(BookingEvent::for_user(
            BookingEventKind::Cancelled,
            appointment_id,
            row.provider_id,
            "Appointment cancelled",
            format!("The appointment on {when} was cancelled."),
        ))
        .await;
        self.emit(BookingEvent::for_admins(
            BookingEventKind::Cancelled,
            appointment_id,
            "Appointment cancelled",
            format!("Appointment {appointment_id} on {when} was cancelled."),
        ))
        .await;
        self.record(
            requester_id,
            format!("Cancelled appointment {appointment_id} ({reason})"),
            "appointment",
        )
        .await;

        Ok(row)
    }

    /// Move a scheduled appointment to a new date and start time, keeping its
    /// current length. The appointment's own window never blocks the move.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        new_date: NaiveDate,
        new_start: NaiveTime,
        requester_id: Uuid,
    ) -> Result<AppointmentRow, BookingError> {
        let current = self
            .store
            .get_appointment(appointment_id)
            .await
            .map_err(persistence)?
            .ok_or(BookingError::NotFound)?;

        if current.status.is_terminal() {
            return Err(BookingError::AlreadyFinalized(current.status));
        }

        reject_past(new_date, new_start)?;

        let minutes = current
            .end_time
            .signed_duration_since(current.start_time)
            .num_minutes() as i32;
        let new_end = end_of_window(new_start, minutes).ok_or(BookingError::ServiceTooLong)?;

        check_window(
            &self.store,
            current.provider_id,
            new_date,
            new_start,
            new_end,
            Some(appointment_id),
        )
        .await?;

        let row = match self
            .store
            .move_scheduled(
                appointment_id,
                current.provider_id,
                new_date,
                new_start,
                new_end,
            )
            .await
        {
            Ok(row) => row,
            Err(StoreError::Overlap) => return Err(BookingError::SlotUnavailable),
            Err(StoreError::Stale) => return Err(self.refetch_finalized(appointment_id).await),
            Err(other) => return Err(persistence(other)),
        };

        let old = format_window(
            current.appointment_date,
            current.start_time,
            current.end_time,
        );
        let when = format_window(row.appointment_date, row.start_time, row.end_time);
        self.emit(BookingEvent::for_user(
            BookingEventKind::Rescheduled,
            appointment_id,
            row.patient_id,
            "Appointment rescheduled",
            format!("Your appointment moved from {old} to {when}."),
        ))
        .await;
        self.emit(BookingEvent::for_user(
            BookingEventKind::Rescheduled,
            appointment_id,
            row.provider_id,
            "Appointment rescheduled",
            format!("The appointment on {old} moved to {when}."),
        ))
        .await;
        self.emit(BookingEvent::for_admins(
            BookingEventKind::Rescheduled,
            appointment_id,
            "Appointment rescheduled",
            format!("Appointment {appointment_id} moved from {old} to {when}."),
        ))
        .await;
        self.record(
            requester_id,
            format!("Rescheduled appointment {appointment_id} to {when}"),
            "appointment",
        )
        .await;

        Ok(row)
    }

    /// Dry-run availability check for a window, resolving the service
    /// duration the same way booking does. Returns the resolved end time.
    pub async fn probe(
        &self,
        provider_id: Uuid,
        service_id: Option<Uuid>,
        date: NaiveDate,
        start: NaiveTime,
    ) -> Result<NaiveTime, BookingError> {
        reject_past(date, start)?;

        let service = match service_id {
            Some(id) => self.store.get_service(id).await.map_err(persistence)?,
            None => None,
        };
        let minutes = resolve_duration(service.as_ref());
        let end = end_of_window(start, minutes).ok_or(BookingError::ServiceTooLong)?;

        check_window(&self.store, provider_id, date, start, end, None).await?;

        Ok(end)
    }

    // ---- internals ----

    async fn refetch_finalized(&self, appointment_id: Uuid) -> BookingError {
        match self.store.get_appointment(appointment_id).await {
            Ok(Some(row)) => BookingError::AlreadyFinalized(row.status),
            Ok(None) => BookingError::NotFound,
            Err(e) => persistence(e),
        }
    }

    async fn emit(&self, event: BookingEvent) {
        if let Err(e) = self.events.notify(&event).await {
            tracing::warn!(
                appointment_id = %event.appointment_id,
                "notification delivery failed: {e:#}"
            );
        }
    }

    async fn record(&self, user_id: Uuid, description: String, category: &str) {
        if let Err(e) = self.events.log_activity(user_id, &description, category).await {
            tracing::warn!(%user_id, "activity log write failed: {e:#}");
        }
    }
}

/// Appointment dates and times are interpreted on the UTC calendar; a clinic
/// operating in another timezone must run the server clock in UTC and accept
/// the offset near midnight.
fn reject_past(date: NaiveDate, start: NaiveTime) -> Result<(), BookingError> {
    let now = Utc::now();
    let today = now.date_naive();
    if date < today || (date == today && start <= now.time()) {
        return Err(BookingError::InPast);
    }
    Ok(())
}

fn format_window(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> String {
    format!(
        "{date} {}-{}",
        start.format("%H:%M"),
        end.format("%H:%M")
    )
}

fn persistence(e: StoreError) -> BookingError {
    BookingError::Persistence(e.to_string())
}
