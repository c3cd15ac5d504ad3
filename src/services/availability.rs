//! Date-range availability rules.
//!
//! A stay is a half-open interval `[check_in, check_out)`: the guest
//! occupies the night of `check_in` but not the night of `check_out`,
//! so a departure and an arrival on the same day do not collide.
//!
//! | Existing stay | Candidate stay | Overlap? |
//! |---------------|----------------|----------|
//! | [10, 15)      | [15, 20)       | no, back-to-back |
//! | [10, 15)      | [14, 20)       | yes |
//! | [10, 15)      | [11, 12)       | yes, contained |
//! | [10, 15)      | [5, 10)        | no |
//!
//! The predicate here is the single source of truth for the in-memory
//! store and for request validation. The Postgres store enforces the
//! same rule with a `daterange(check_in, check_out) WITH &&` exclusion
//! constraint, so a conflicting insert loses even when two writers race.

use chrono::NaiveDate;

use crate::services::BookingError;

/// Returns true when the two half-open ranges `[start_a, end_a)` and
/// `[start_b, end_b)` share at least one night.
///
/// # Example
///
/// ```rust,ignore
/// let a_in = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
/// let a_out = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
/// let b_in = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
/// let b_out = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
/// assert!(!ranges_overlap(a_in, a_out, b_in, b_out));
/// ```
pub fn ranges_overlap(
    start_a: NaiveDate,
    end_a: NaiveDate,
    start_b: NaiveDate,
    end_b: NaiveDate,
) -> bool {
    start_a < end_b && start_b < end_a
}

/// Validates the shape of a requested stay before any store lookup.
///
/// # Returns
///
/// * `Ok(())` when `check_in < check_out`
/// * `Err(BookingError::Validation)` otherwise, including the
///   zero-night case where both dates are equal
pub fn validate_date_range(check_in: NaiveDate, check_out: NaiveDate) -> Result<(), BookingError> {
    if check_in >= check_out {
        return Err(BookingError::Validation(format!(
            "check-out ({}) must be after check-in ({})",
            check_out, check_in
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_back_to_back_stays_do_not_overlap() {
        // existing [1, 4), candidate [4, 7): turnover day is shared but not a night
        assert!(!ranges_overlap(
            date(2024, 6, 1),
            date(2024, 6, 4),
            date(2024, 6, 4),
            date(2024, 6, 7)
        ));
        // and the mirror image
        assert!(!ranges_overlap(
            date(2024, 6, 4),
            date(2024, 6, 7),
            date(2024, 6, 1),
            date(2024, 6, 4)
        ));
    }

    #[test]
    fn test_single_shared_night_overlaps() {
        assert!(ranges_overlap(
            date(2024, 6, 1),
            date(2024, 6, 4),
            date(2024, 6, 3),
            date(2024, 6, 10)
        ));
    }

    #[test]
    fn test_contained_range_overlaps() {
        assert!(ranges_overlap(
            date(2024, 6, 1),
            date(2024, 6, 30),
            date(2024, 6, 10),
            date(2024, 6, 12)
        ));
    }

    #[test]
    fn test_identical_ranges_overlap() {
        assert!(ranges_overlap(
            date(2024, 6, 1),
            date(2024, 6, 4),
            date(2024, 6, 1),
            date(2024, 6, 4)
        ));
    }

    #[test]
    fn test_disjoint_ranges_do_not_overlap() {
        assert!(!ranges_overlap(
            date(2024, 6, 1),
            date(2024, 6, 4),
            date(2024, 6, 20),
            date(2024, 6, 24)
        ));
    }

    #[test]
    fn test_validate_date_range() {
        assert!(validate_date_range(date(2024, 6, 1), date(2024, 6, 4)).is_ok());

        let same_day = validate_date_range(date(2024, 6, 1), date(2024, 6, 1));
        assert!(matches!(same_day, Err(BookingError::Validation(_))));

        let inverted = validate_date_range(date(2024, 6, 4), date(2024, 6, 1));
        assert!(matches!(inverted, Err(BookingError::Validation(_))));
    }
}
