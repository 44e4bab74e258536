//! Batch tracking.
//!
//! A batch groups every migration applied by one forward run. Only the batch
//! with the highest id among applied records can be reversed.

use chrono::{DateTime, Utc};

/// Batch id stored on records that were never applied.
pub const UNASSIGNED_BATCH: i64 = 0;

/// Compute the batch id for a forward run starting at `now`.
///
/// The id is the wall clock in seconds, bumped past `latest_assigned` so two
/// runs inside the same second still land in distinct batches.
pub fn current_batch(now: DateTime<Utc>, latest_assigned: i64) -> i64 {
    now.timestamp().max(latest_assigned.saturating_add(1))
}

/// Pick the batch a reverse run is scoped to.
///
/// `None` means no filter: either nothing is applied or every applied record
/// still carries the unassigned batch.
pub fn reversal_scope(last_applied_batch: i64) -> Option<i64> {
    (last_applied_batch > UNASSIGNED_BATCH).then_some(last_applied_batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_current_batch_is_wall_clock() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(current_batch(now, 0), now.timestamp());
        assert_eq!(current_batch(now, now.timestamp() - 10), now.timestamp());
    }

    #[test]
    fn test_current_batch_same_second() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let first = current_batch(now, 0);
        let second = current_batch(now, first);
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_reversal_scope() {
        assert_eq!(reversal_scope(0), None);
        assert_eq!(reversal_scope(1_717_243_200), Some(1_717_243_200));
    }
}
