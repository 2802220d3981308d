// src/booking/availability.rs
//
// Window arithmetic and the availability check that gates every booking and
// reschedule. All windows are half-open [start, end): an appointment ending
// at 10:00 never blocks one starting at 10:00.

use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::models::SlotRow;

use super::store::{BookingStore, StoreError};
use super::BookingError;

/// Half-open overlap predicate. True when the two windows share at least one
/// instant; touching endpoints do not count.
pub fn windows_overlap(
    start_a: NaiveTime,
    end_a: NaiveTime,
    start_b: NaiveTime,
    end_b: NaiveTime,
) -> bool {
    start_a < end_b && start_b < end_a
}

/// True when the slot contains the whole requested window.
pub fn slot_covers(slot: &SlotRow, start: NaiveTime, end: NaiveTime) -> bool {
    slot.start_time <= start && slot.end_time >= end
}

/// Validate that `[start, end)` on `date` is bookable with the provider:
/// a declared slot must cover the whole window, and no scheduled appointment
/// may overlap it. `exclude` carves one appointment out of the overlap check
/// so a reschedule never collides with itself.
pub async fn check_window<S: BookingStore + ?Sized>(
    store: &S,
    provider_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    exclude: Option<Uuid>,
) -> Result<(), BookingError> {
    let slot = store
        .find_covering_slot(provider_id, date, start)
        .await
        .map_err(store_failure)?
        .ok_or(BookingError::SlotNotFound)?;

    if !slot_covers(&slot, start, end) {
        return Err(BookingError::ServiceTooLong);
    }

    let clashes = store
        .find_overlapping(provider_id, date, start, end, exclude)
        .await
        .map_err(store_failure)?;

    if !clashes.is_empty() {
        return Err(BookingError::SlotUnavailable);
    }

    Ok(())
}

fn store_failure(e: StoreError) -> BookingError {
    match e {
        StoreError::Overlap => BookingError::SlotUnavailable,
        other => BookingError::Persistence(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Days, Utc};

    use crate::booking::testing::MemoryStore;

    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn tomorrow() -> NaiveDate {
        Utc::now().date_naive() + Days::new(1)
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        assert!(!windows_overlap(t(9, 0), t(9, 30), t(9, 30), t(10, 0)));
        assert!(!windows_overlap(t(9, 30), t(10, 0), t(9, 0), t(9, 30)));
    }

    #[test]
    fn partial_overlap_is_detected_both_ways() {
        assert!(windows_overlap(t(9, 0), t(9, 45), t(9, 30), t(10, 0)));
        assert!(windows_overlap(t(9, 30), t(10, 0), t(9, 0), t(9, 45)));
    }

    #[test]
    fn containment_counts_as_overlap() {
        assert!(windows_overlap(t(9, 0), t(11, 0), t(9, 30), t(10, 0)));
        assert!(windows_overlap(t(9, 30), t(10, 0), t(9, 0), t(11, 0)));
    }

    #[test]
    fn slot_coverage_is_inclusive_at_both_ends() {
        let slot = SlotRow {
            slot_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            slot_date: tomorrow(),
            start_time: t(9, 0),
            end_time: t(12, 0),
        };
        assert!(slot_covers(&slot, t(9, 0), t(12, 0)));
        assert!(slot_covers(&slot, t(10, 0), t(10, 30)));
        assert!(!slot_covers(&slot, t(11, 45), t(12, 15)));
        assert!(!slot_covers(&slot, t(8, 45), t(9, 15)));
    }

    #[tokio::test]
    async fn window_outside_any_slot_is_not_found() {
        let store = MemoryStore::new();
        let provider = Uuid::new_v4();
        store.add_slot(provider, tomorrow(), t(9, 0), t(12, 0));

        let res = check_window(&store, provider, tomorrow(), t(14, 0), t(14, 30), None).await;
        assert_matches!(res, Err(BookingError::SlotNotFound));
    }

    #[tokio::test]
    async fn window_spilling_past_slot_end_is_too_long() {
        let store = MemoryStore::new();
        let provider = Uuid::new_v4();
        store.add_slot(provider, tomorrow(), t(9, 0), t(10, 0));

        let res = check_window(&store, provider, tomorrow(), t(9, 45), t(10, 45), None).await;
        assert_matches!(res, Err(BookingError::ServiceTooLong));
    }

    #[tokio::test]
    async fn clear_window_inside_slot_passes() {
        let store = MemoryStore::new();
        let provider = Uuid::new_v4();
        store.add_slot(provider, tomorrow(), t(9, 0), t(12, 0));

        let res = check_window(&store, provider, tomorrow(), t(9, 0), t(9, 30), None).await;
        assert_matches!(res, Ok(()));
    }

    #[tokio::test]
    async fn scheduled_appointment_blocks_overlapping_window() {
        let store = MemoryStore::new();
        let provider = Uuid::new_v4();
        store.add_slot(provider, tomorrow(), t(9, 0), t(12, 0));
        store.add_scheduled(Uuid::new_v4(), provider, tomorrow(), t(9, 0), t(9, 30));

        let res = check_window(&store, provider, tomorrow(), t(9, 15), t(9, 45), None).await;
        assert_matches!(res, Err(BookingError::SlotUnavailable));
    }

    #[tokio::test]
    async fn back_to_back_appointments_are_allowed() {
        let store = MemoryStore::new();
        let provider = Uuid::new_v4();
        store.add_slot(provider, tomorrow(), t(9, 0), t(12, 0));
        store.add_scheduled(Uuid::new_v4(), provider, tomorrow(), t(9, 0), t(9, 30));

        let res = check_window(&store, provider, tomorrow(), t(9, 30), t(10, 0), None).await;
        assert_matches!(res, Ok(()));
    }

    #[tokio::test]
    async fn cancelled_appointment_frees_its_window() {
        let store = MemoryStore::new();
        let provider = Uuid::new_v4();
        store.add_slot(provider, tomorrow(), t(9, 0), t(12, 0));
        let id = store.add_scheduled(Uuid::new_v4(), provider, tomorrow(), t(9, 0), t(9, 30));
        store.mark_cancelled_sync(id, "patient request");

        let res = check_window(&store, provider, tomorrow(), t(9, 0), t(9, 30), None).await;
        assert_matches!(res, Ok(()));
    }

    #[tokio::test]
    async fn excluded_appointment_does_not_block_itself() {
        let store = MemoryStore::new();
        let provider = Uuid::new_v4();
        store.add_slot(provider, tomorrow(), t(9, 0), t(12, 0));
        let id = store.add_scheduled(Uuid::new_v4(), provider, tomorrow(), t(9, 0), t(9, 30));

        let res = check_window(&store, provider, tomorrow(), t(9, 0), t(9, 30), Some(id)).await;
        assert_matches!(res, Ok(()));
    }
}
