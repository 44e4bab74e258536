//! Migration id allocation.
//!
//! Seeded records get small sequential ids; explicitly created records get
//! wall-clock ids. Every sequential id is below [`TIMESTAMP_ID_FLOOR`] and
//! every timestamp id is at or above it, so seeded migrations always sort
//! before created ones.

use chrono::{DateTime, Utc};

use crate::error::{MigrateResult, MigrationError};

/// Lowest id the timestamp strategy may hand out.
pub const TIMESTAMP_ID_FLOOR: i64 = 1_000_000_000_000;

/// Strategy for assigning a record's `migration_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdAllocator {
    /// 1-based position in the sorted discovery order.
    Sequential,
    /// Microseconds since the Unix epoch.
    Timestamp,
}

impl IdAllocator {
    /// Allocate a sequential id for the file at `position` (1-based).
    ///
    /// The id is never below `minimum`, which keeps ids rising with file
    /// order inside one seeding pass. `taken` reports whether an id is
    /// already held by another record; a taken id moves past
    /// `highest_sequential`.
    pub fn sequential(
        position: usize,
        minimum: i64,
        highest_sequential: i64,
        taken: impl Fn(i64) -> bool,
    ) -> MigrateResult<i64> {
        let position =
            i64::try_from(position).map_err(|_| MigrationError::IdRangeExhausted(i64::MAX))?;
        let candidate = position.max(minimum);
        let id = if taken(candidate) {
            highest_sequential.max(candidate) + 1
        } else {
            candidate
        };

        if id >= TIMESTAMP_ID_FLOOR {
            return Err(MigrationError::IdRangeExhausted(id));
        }
        Ok(id)
    }

    /// Allocate a timestamp id strictly greater than `highest_existing`.
    pub fn timestamp(now: DateTime<Utc>, highest_existing: i64) -> i64 {
        now.timestamp_micros()
            .max(TIMESTAMP_ID_FLOOR)
            .max(highest_existing.saturating_add(1))
    }

    /// Which strategy produced an id.
    pub fn classify(id: i64) -> Self {
        if id >= TIMESTAMP_ID_FLOOR {
            Self::Timestamp
        } else {
            Self::Sequential
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sequential_uses_position() {
        assert_eq!(IdAllocator::sequential(1, 1, 0, |_| false).unwrap(), 1);
        assert_eq!(IdAllocator::sequential(7, 1, 3, |_| false).unwrap(), 7);
    }

    #[test]
    fn test_sequential_skips_taken_position() {
        // files 1..=3 were seeded earlier; a new file lands at position 2
        let taken = [1, 2, 3];
        let id = IdAllocator::sequential(2, 1, 3, |id| taken.contains(&id)).unwrap();
        assert_eq!(id, 4);
    }

    #[test]
    fn test_sequential_respects_minimum() {
        // an earlier file in the same pass already moved up to 6
        let taken = [1, 5, 6];
        let id = IdAllocator::sequential(3, 7, 6, |id| taken.contains(&id)).unwrap();
        assert_eq!(id, 7);

        // a taken minimum still moves past every sequential id
        let id = IdAllocator::sequential(2, 5, 6, |id| taken.contains(&id)).unwrap();
        assert_eq!(id, 7);
    }

    #[test]
    fn test_sequential_range_is_bounded() {
        let err = IdAllocator::sequential(1, 1, TIMESTAMP_ID_FLOOR - 1, |_| true).unwrap_err();
        assert!(matches!(err, MigrationError::IdRangeExhausted(_)));
    }

    #[test]
    fn test_timestamp_is_monotonic() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let first = IdAllocator::timestamp(now, 0);
        assert_eq!(first, now.timestamp_micros());

        // same instant again still moves forward
        let second = IdAllocator::timestamp(now, first);
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_timestamp_respects_floor() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(IdAllocator::timestamp(epoch, 0), TIMESTAMP_ID_FLOOR);
    }

    #[test]
    fn test_seeded_ids_sort_before_created_ids() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let created = IdAllocator::timestamp(epoch, 0);
        let largest_seeded =
            IdAllocator::sequential(1, 1, TIMESTAMP_ID_FLOOR - 2, |_| true).unwrap();

        assert!(largest_seeded < created);
        assert_eq!(IdAllocator::classify(largest_seeded), IdAllocator::Sequential);
        assert_eq!(IdAllocator::classify(created), IdAllocator::Timestamp);
    }
}
