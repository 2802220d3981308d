// src/booking/store.rs
//
// Storage abstraction for the booking core. The workflow only ever talks to
// `BookingStore`; `PgBookingStore` is the one concrete implementation.
// The check-then-write steps that must not interleave with a competing
// booking (insert_scheduled, move_scheduled) are transactional primitives of
// the store itself, not call sites composing their own transactions.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::models::{
    AppointmentRow, AppointmentStatus, AppointmentType, ServiceRow, SlotRow,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A competing scheduled appointment occupies part of the window.
    #[error("overlapping scheduled appointment")]
    Overlap,

    /// Guarded update matched no row: the appointment is gone or no longer
    /// scheduled.
    #[error("appointment missing or no longer scheduled")]
    Stale,

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        // Serialization failures and exclusion-constraint hits both mean a
        // concurrent booking won the window.
        if let sqlx::Error::Database(db) = &e {
            if matches!(db.code().as_deref(), Some("40001") | Some("23P01")) {
                return StoreError::Overlap;
            }
        }
        StoreError::Database(e.to_string())
    }
}

/// Fields of an appointment about to be committed. End time is already
/// resolved by the workflow.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Slot that starts at-or-before `time` and still covers it, if any.
    async fn find_covering_slot(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<SlotRow>, StoreError>;

    /// Scheduled appointments for the provider/date overlapping
    /// `[start, end)` under half-open semantics, optionally excluding one
    /// appointment (used when rescheduling it).
    async fn find_overlapping(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<Vec<AppointmentRow>, StoreError>;

    async fn get_service(&self, service_id: Uuid) -> Result<Option<ServiceRow>, StoreError>;

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentRow>, StoreError>;

    /// Critical section: re-check the window and insert the scheduled row as
    /// one atomic step. Fails with `Overlap` when a competing booking holds
    /// any part of the window.
    async fn insert_scheduled(&self, new: &NewAppointment) -> Result<Uuid, StoreError>;

    /// Guarded cancel: only a currently scheduled appointment transitions.
    /// Returns the updated row, or `Stale` if it was already terminal.
    async fn mark_cancelled(
        &self,
        appointment_id: Uuid,
        reason: &str,
    ) -> Result<AppointmentRow, StoreError>;

    /// Critical section for reschedule: re-check the target window (excluding
    /// the appointment itself) and move date/start/end atomically, preserving
    /// identity. `Stale` if the appointment is gone or terminal.
    async fn move_scheduled(
        &self,
        appointment_id: Uuid,
        provider_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<AppointmentRow, StoreError>;
}

/* ============================================================
   Postgres implementation
   ============================================================ */

#[derive(Clone)]
pub struct PgBookingStore {
    pool: sqlx::PgPool,
}

impl PgBookingStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

const APPOINTMENT_COLUMNS: &str = r#"
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
"#;

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn find_covering_slot(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<SlotRow>, StoreError> {
        let row: Option<SlotRow> = sqlx::query_as::<_, SlotRow>(
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
              AND start_time <= $3
              AND end_time > $3
            ORDER BY start_time DESC
            LIMIT 1
            "#,
        )
        .bind(provider_id)
        .bind(date)
        .bind(time)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_overlapping(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<Vec<AppointmentRow>, StoreError> {
        let sql = format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointment
            WHERE provider_id = $1
              AND appointment_date = $2
              AND status = $3
              AND start_time < $5
              AND end_time > $4
              AND ($6::uuid IS NULL OR appointment_id <> $6)
            ORDER BY start_time ASC
            "#
        );

        let rows: Vec<AppointmentRow> = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(provider_id)
            .bind(date)
            .bind(AppointmentStatus::Scheduled)
            .bind(start)
            .bind(end)
            .bind(exclude)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn get_service(&self, service_id: Uuid) -> Result<Option<ServiceRow>, StoreError> {
        let row: Option<ServiceRow> = sqlx::query_as::<_, ServiceRow>(
            r#"
            SELECT
              service_id,
              name,
              duration_min,
              price_cents,
              is_active,
              created_at,
              updated_at
            FROM service
            WHERE service_id = $1
            "#,
        )
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentRow>, StoreError> {
        let sql = format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointment
            WHERE appointment_id = $1
            "#
        );

        let row: Option<AppointmentRow> = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(appointment_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn insert_scheduled(&self, new: &NewAppointment) -> Result<Uuid, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Two concurrent bookings for overlapping windows must not both pass
        // the re-check; SERIALIZABLE forces one of them to fail at commit.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let clash: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM appointment
                WHERE provider_id = $1
                  AND appointment_date = $2
                  AND status = $3
                  AND start_time < $5
                  AND end_time > $4
            )
            "#,
        )
        .bind(new.provider_id)
        .bind(new.appointment_date)
        .bind(AppointmentStatus::Scheduled)
        .bind(new.start_time)
        .bind(new.end_time)
        .fetch_one(&mut *tx)
        .await?;

        if clash {
            return Err(StoreError::Overlap);
        }

        let appointment_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO appointment (
              patient_id,
              provider_id,
              service_id,
              appointment_date,
              start_time,
              end_time,
              status,
              appointment_type,
              notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING appointment_id
            "#,
        )
        .bind(new.patient_id)
        .bind(new.provider_id)
        .bind(new.service_id)
        .bind(new.appointment_date)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(AppointmentStatus::Scheduled)
        .bind(new.appointment_type)
        .bind(new.notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(appointment_id)
    }

    async fn mark_cancelled(
        &self,
        appointment_id: Uuid,
        reason: &str,
    ) -> Result<AppointmentRow, StoreError> {
        let sql = format!(
            r#"
            UPDATE appointment
            SET status = $2,
                cancellation_reason = $3,
                updated_at = now()
            WHERE appointment_id = $1
              AND status = $4
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );

        let row: Option<AppointmentRow> = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(appointment_id)
            .bind(AppointmentStatus::Cancelled)
            .bind(reason)
            .bind(AppointmentStatus::Scheduled)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(StoreError::Stale)
    }

    async fn move_scheduled(
        &self,
        appointment_id: Uuid,
        provider_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<AppointmentRow, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let clash: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM appointment
                WHERE provider_id = $1
                  AND appointment_date = $2
                  AND status = $3
                  AND start_time < $5
                  AND end_time > $4
                  AND appointment_id <> $6
            )
            "#,
        )
        .bind(provider_id)
        .bind(date)
        .bind(AppointmentStatus::Scheduled)
        .bind(start)
        .bind(end)
        .bind(appointment_id)
        .fetch_one(&mut *tx)
        .await?;

        if clash {
            return Err(StoreError::Overlap);
        }

        let sql = format!(
            r#"
            UPDATE appointment
            SET appointment_date = $2,
                start_time = $3,
                end_time = $4,
                updated_at = now()
            WHERE appointment_id = $1
              AND status = $5
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );

        let row: Option<AppointmentRow> = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(appointment_id)
            .bind(date)
            .bind(start)
            .bind(end)
            .bind(AppointmentStatus::Scheduled)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Err(StoreError::Stale);
        };

        tx.commit().await?;

        Ok(row)
    }
}
