use chrono::{Duration, NaiveTime};

use crate::models::ServiceRow;

/// System-wide fallback when no service is chosen or the service carries no
/// configured duration.
pub const DEFAULT_DURATION_MIN: i32 = 30;

/// Map a (possibly absent) service to an appointment length in minutes.
/// Never fails: an unknown or duration-less service falls back to the default.
pub fn resolve_duration(service: Option<&ServiceRow>) -> i32 {
    service
        .and_then(|s| s.duration_min)
        .filter(|&m| m > 0)
        .unwrap_or(DEFAULT_DURATION_MIN)
}

/// Compute the end of a window starting at `start`, rejecting windows that
/// would wrap past midnight (those can never fit inside a same-day slot).
pub fn end_of_window(start: NaiveTime, minutes: i32) -> Option<NaiveTime> {
    let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(minutes as i64));
    (wrapped == 0 && end > start).then_some(end)
}
