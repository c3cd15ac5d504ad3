//! Reservation pricing.
//!
//! All amounts are integer minor units (cents). The quote for a stay is
//!
//! ```text
//! total = nightly_rate * nights + cleaning_fee + service_fee
//! ```
//!
//! where `nights = check_out - check_in` in days. Pricing is a pure
//! function of the listing's fee schedule and the date range, so the
//! same request always produces the same total, and the breakdown is
//! snapshotted onto the reservation row at creation time. Later edits
//! to the listing never change what a guest was charged.

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::Listing;
use crate::services::BookingError;

/// Itemized quote for one stay.
///
/// | Field | Meaning |
/// |-------|---------|
/// | `nights` | Number of nights, always >= 1 |
/// | `nightly_rate` | Listing rate per night, in cents |
/// | `cleaning_fee` | Flat per-stay fee, in cents |
/// | `service_fee` | Flat per-stay fee, in cents |
/// | `total` | `nightly_rate * nights + cleaning_fee + service_fee` |
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceBreakdown {
    pub nights: i64,
    pub nightly_rate: i64,
    pub cleaning_fee: i64,
    pub service_fee: i64,
    pub total: i64,
}

/// Computes the number of nights in `[check_in, check_out)`.
///
/// # Returns
///
/// * `Ok(n)` with `n >= 1`
/// * `Err(BookingError::Validation)` for zero-night or inverted ranges
pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> Result<i64, BookingError> {
    let nights = check_out.signed_duration_since(check_in).num_days();
    if nights < 1 {
        return Err(BookingError::Validation(format!(
            "stay must cover at least one night, got {} to {}",
            check_in, check_out
        )));
    }
    Ok(nights)
}

/// Quotes a stay against a listing's fee schedule.
///
/// # Example
///
/// ```rust,ignore
/// // $100.00/night, $50.00 cleaning, $20.00 service, 3 nights
/// let quote = quote_stay(&listing, check_in, check_out)?;
/// assert_eq!(quote.total, 47_000); // $470.00
/// ```
pub fn quote_stay(
    listing: &Listing,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<PriceBreakdown, BookingError> {
    let nights = nights_between(check_in, check_out)?;
    let total = listing.nightly_rate * nights + listing.cleaning_fee + listing.service_fee;

    Ok(PriceBreakdown {
        nights,
        nightly_rate: listing.nightly_rate,
        cleaning_fee: listing.cleaning_fee,
        service_fee: listing.service_fee,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn listing(nightly_rate: i64, cleaning_fee: i64, service_fee: i64) -> Listing {
        Listing {
            id: 1,
            title: "Test listing".to_string(),
            nightly_rate,
            cleaning_fee,
            service_fee,
            max_guests: 4,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_three_night_quote_with_both_fees() {
        // $100/night * 3 + $50 cleaning + $20 service = $470.00
        let quote = quote_stay(&listing(10_000, 5_000, 2_000), date(2024, 6, 1), date(2024, 6, 4))
            .unwrap();
        assert_eq!(quote.nights, 3);
        assert_eq!(quote.total, 47_000);
    }

    #[test]
    fn test_quote_without_service_fee() {
        // $100/night * 3 + $30 cleaning = $330.00
        let quote = quote_stay(&listing(10_000, 3_000, 0), date(2024, 6, 1), date(2024, 6, 4))
            .unwrap();
        assert_eq!(quote.total, 33_000);
    }

    #[test]
    fn test_single_night() {
        let quote = quote_stay(&listing(8_500, 1_500, 500), date(2024, 6, 1), date(2024, 6, 2))
            .unwrap();
        assert_eq!(quote.nights, 1);
        assert_eq!(quote.total, 10_500);
    }

    #[test]
    fn test_quote_is_deterministic() {
        let l = listing(12_345, 6_789, 1_011);
        let a = quote_stay(&l, date(2024, 7, 10), date(2024, 7, 17)).unwrap();
        let b = quote_stay(&l, date(2024, 7, 10), date(2024, 7, 17)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.total, 12_345 * 7 + 6_789 + 1_011);
    }

    #[test]
    fn test_zero_night_quote_rejected() {
        let result = quote_stay(&listing(10_000, 0, 0), date(2024, 6, 1), date(2024, 6, 1));
        assert!(matches!(result, Err(BookingError::Validation(_))));
    }
}
