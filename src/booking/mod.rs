pub mod availability;
pub mod duration;
pub mod events;
pub mod store;
pub mod workflow;

#[cfg(test)]
pub mod testing;

use crate::models::AppointmentStatus;

/// Failure taxonomy of the booking workflow. Every variant maps to a distinct
/// user-facing message; none of them aborts the process.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("patient, provider, date and start time are required")]
    MissingFields,

    #[error("the selected time slot is not offered by this provider")]
    SlotNotFound,

    #[error("this time slot is too short for the selected service")]
    ServiceTooLong,

    #[error("this time slot is no longer available, please pick another")]
    SlotUnavailable,

    #[error("appointment not found")]
    NotFound,

    #[error("appointment is already {}", .0.as_str())]
    AlreadyFinalized(AppointmentStatus),

    #[error("appointments cannot be booked in the past")]
    InPast,

    #[error("storage error: {0}")]
    Persistence(String),
}
