//! # API Request Models
//!
//! Structures for incoming API request bodies.
//! Each struct represents the expected JSON body for an endpoint.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Request to start a checkout for a stay.
///
/// ## Example JSON
///
/// ```json
/// {
///     "listingId": 42,
///     "guestId": 7,
///     "checkIn": "2024-06-01",
///     "checkOut": "2024-06-04",
///     "guestCount": 2,
///     "currency": "usd"
/// }
/// ```
///
/// ## Notes
///
/// - Dates are ISO 8601 (`YYYY-MM-DD`); `checkOut` is exclusive, so the
///   example above is a 3-night stay
/// - `currency` defaults to `usd` when omitted
/// - `successUrl` / `cancelUrl` override the configured redirect targets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Which listing the guest wants to book.
    pub listing_id: i64,

    /// The guest making the booking.
    pub guest_id: i64,

    /// First night of the stay.
    pub check_in: NaiveDate,

    /// Departure date (exclusive; not itself a night of the stay).
    pub check_out: NaiveDate,

    /// How many guests are staying.
    pub guest_count: i32,

    /// ISO currency code for the charge. Defaults to `usd`.
    pub currency: Option<String>,

    /// Optional: where the gateway sends the guest after paying.
    pub success_url: Option<String>,

    /// Optional: where the gateway sends the guest after backing out.
    pub cancel_url: Option<String>,
}

/// Request to cancel a reservation.
///
/// ## Example JSON
///
/// ```json
/// {
///     "reason": "change of plans"
/// }
/// ```
///
/// The body is optional; an empty object (or no body field) records a
/// generic reason.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    /// Free-text reason recorded on the reservation.
    pub reason: Option<String>,
}
