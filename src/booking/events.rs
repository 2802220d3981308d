// src/booking/events.rs
//
// Post-commit side effects of the booking workflow: notifications for the
// people involved, a system notice for the admin audience, and an activity
// log line. Sinks are fire-and-forget from the workflow's point of view;
// a failed insert is logged and swallowed, never surfaced to the caller.

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEventKind {
    Booked,
    Cancelled,
    Rescheduled,
}

impl BookingEventKind {
    pub fn notification_type(self) -> &'static str {
        match self {
            BookingEventKind::Booked => "appointment_booked",
            BookingEventKind::Cancelled => "appointment_cancelled",
            BookingEventKind::Rescheduled => "appointment_rescheduled",
        }
    }
}

/// One notification to deliver. `recipient: None` addresses the admin
/// audience instead of a single user.
#[derive(Debug, Clone)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub appointment_id: Uuid,
    pub recipient: Option<Uuid>,
    pub subject: String,
    pub message: String,
}

impl BookingEvent {
    pub fn for_user(
        kind: BookingEventKind,
        appointment_id: Uuid,
        recipient: Uuid,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            appointment_id,
            recipient: Some(recipient),
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn for_admins(
        kind: BookingEventKind,
        appointment_id: Uuid,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            appointment_id,
            recipient: None,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()>;

    async fn log_activity(
        &self,
        user_id: Uuid,
        description: &str,
        category: &str,
    ) -> anyhow::Result<()>;
}

/* ============================================================
   Postgres sink
   ============================================================ */

#[derive(Clone)]
pub struct PgEventSink {
    pool: sqlx::PgPool,
}

impl PgEventSink {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventSink for PgEventSink {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification (
              user_id,
              subject,
              message,
              notification_type,
              appointment_id,
              is_system,
              audience
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.recipient)
        .bind(&event.subject)
        .bind(&event.message)
        .bind(event.kind.notification_type())
        .bind(event.appointment_id)
        .bind(event.recipient.is_none())
        .bind(event.recipient.is_none().then_some("admin"))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn log_activity(
        &self,
        user_id: Uuid,
        description: &str,
        category: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_log (user_id, description, category)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(description)
        .bind(category)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
