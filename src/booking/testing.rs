// src/booking/testing.rs
//
// In-memory store and recording sink for workflow tests. The store holds one
// mutex across its check-then-write methods, which gives the same atomicity
// the Postgres implementation gets from SERIALIZABLE transactions.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::models::{
    AppointmentRow, AppointmentStatus, AppointmentType, ServiceRow, SlotRow,
};

use super::availability::windows_overlap;
use super::events::{BookingEvent, EventSink};
use super::store::{BookingStore, NewAppointment, StoreError};

#[derive(Default)]
struct Inner {
    slots: Vec<SlotRow>,
    services: Vec<ServiceRow>,
    appointments: Vec<AppointmentRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_slot(
        &self,
        provider_id: Uuid,
        slot_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Uuid {
        let slot_id = Uuid::new_v4();
        self.inner.lock().unwrap().slots.push(SlotRow {
            slot_id,
            provider_id,
            slot_date,
            start_time,
            end_time,
        });
        slot_id
    }

    pub fn add_service(&self, name: &str, duration_min: Option<i32>) -> Uuid {
        let service_id = Uuid::new_v4();
        let now = Utc::now();
        self.inner.lock().unwrap().services.push(ServiceRow {
            service_id,
            name: name.to_string(),
            duration_min,
            price_cents: 5000,
            is_active: true,
            created_at: now,
            updated_at: now,
        });
        service_id
    }

    pub fn add_scheduled(
        &self,
        patient_id: Uuid,
        provider_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Uuid {
        let appointment_id = Uuid::new_v4();
        let now = Utc::now();
        self.inner.lock().unwrap().appointments.push(AppointmentRow {
            appointment_id,
            patient_id,
            provider_id,
            service_id: None,
            appointment_date: date,
            start_time: start,
            end_time: end,
            status: AppointmentStatus::Scheduled,
            appointment_type: AppointmentType::InPerson,
            notes: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        });
        appointment_id
    }

    pub fn mark_cancelled_sync(&self, appointment_id: Uuid, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner
            .appointments
            .iter_mut()
            .find(|a| a.appointment_id == appointment_id)
        {
            row.status = AppointmentStatus::Cancelled;
            row.cancellation_reason = Some(reason.to_string());
        }
    }
}

fn clashes(
    inner: &Inner,
    provider_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    exclude: Option<Uuid>,
) -> bool {
    inner.appointments.iter().any(|a| {
        a.provider_id == provider_id
            && a.appointment_date == date
            && a.status == AppointmentStatus::Scheduled
            && Some(a.appointment_id) != exclude
            && windows_overlap(a.start_time, a.end_time, start, end)
    })
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn find_covering_slot(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<SlotRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let slot = inner
            .slots
            .iter()
            .filter(|s| {
                s.provider_id == provider_id
                    && s.slot_date == date
                    && s.start_time <= time
                    && s.end_time > time
            })
            .max_by_key(|s| s.start_time)
            .cloned();
        Ok(slot)
    }

    async fn find_overlapping(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<Vec<AppointmentRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .appointments
            .iter()
            .filter(|a| {
                a.provider_id == provider_id
                    && a.appointment_date == date
                    && a.status == AppointmentStatus::Scheduled
                    && Some(a.appointment_id) != exclude
                    && windows_overlap(a.start_time, a.end_time, start, end)
            })
            .cloned()
            .collect())
    }

    async fn get_service(&self, service_id: Uuid) -> Result<Option<ServiceRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .services
            .iter()
            .find(|s| s.service_id == service_id)
            .cloned())
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .appointments
            .iter()
            .find(|a| a.appointment_id == appointment_id)
            .cloned())
    }

    async fn insert_scheduled(&self, new: &NewAppointment) -> Result<Uuid, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if clashes(
            &inner,
            new.provider_id,
            new.appointment_date,
            new.start_time,
            new.end_time,
            None,
        ) {
            return Err(StoreError::Overlap);
        }

        let appointment_id = Uuid::new_v4();
        let now = Utc::now();
        inner.appointments.push(AppointmentRow {
            appointment_id,
            patient_id: new.patient_id,
            provider_id: new.provider_id,
            service_id: new.service_id,
            appointment_date: new.appointment_date,
            start_time: new.start_time,
            end_time: new.end_time,
            status: AppointmentStatus::Scheduled,
            appointment_type: new.appointment_type,
            notes: new.notes.clone(),
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        });
        Ok(appointment_id)
    }

    async fn mark_cancelled(
        &self,
        appointment_id: Uuid,
        reason: &str,
    ) -> Result<AppointmentRow, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .appointments
            .iter_mut()
            .find(|a| {
                a.appointment_id == appointment_id && a.status == AppointmentStatus::Scheduled
            })
            .ok_or(StoreError::Stale)?;

        row.status = AppointmentStatus::Cancelled;
        row.cancellation_reason = Some(reason.to_string());
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn move_scheduled(
        &self,
        appointment_id: Uuid,
        provider_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<AppointmentRow, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if clashes(&inner, provider_id, date, start, end, Some(appointment_id)) {
            return Err(StoreError::Overlap);
        }

        let row = inner
            .appointments
            .iter_mut()
            .find(|a| {
                a.appointment_id == appointment_id && a.status == AppointmentStatus::Scheduled
            })
            .ok_or(StoreError::Stale)?;

        row.appointment_date = date;
        row.start_time = start;
        row.end_time = end;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

/* ============================================================
   Recording sink
   ============================================================ */

#[derive(Default)]
pub struct RecordingSink {
    fail: bool,
    events: Mutex<Vec<BookingEvent>>,
    activity: Mutex<Vec<(Uuid, String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every write fails, for checking that delivery problems
    /// never propagate into booking results.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<BookingEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn activity(&self) -> Vec<(Uuid, String, String)> {
        self.activity.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
        self.activity.lock().unwrap().clear();
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("sink offline");
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn log_activity(
        &self,
        user_id: Uuid,
        description: &str,
        category: &str,
    ) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("sink offline");
        }
        self.activity
            .lock()
            .unwrap()
            .push((user_id, description.to_string(), category.to_string()));
        Ok(())
    }
}
