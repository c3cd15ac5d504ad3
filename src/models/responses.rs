//! # API Response Models
//!
//! Structures for outgoing API response bodies.
//! All responses are wrapped in a standard format.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::Reservation;
use crate::utils::format_amount;

/// Standard API response wrapper.
///
/// All API responses follow this format:
///
/// ## Success Response
///
/// ```json
/// {
///     "success": true,
///     "data": { ... },
///     "error": null
/// }
/// ```
///
/// ## Error Response
///
/// ```json
/// {
///     "success": false,
///     "data": null,
///     "error": {
///         "code": "BOOKING_CONFLICT",
///         "message": "Listing is not available for the selected dates"
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,

    /// Response data (null on error).
    pub data: Option<T>,

    /// Error information (null on success).
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// API error information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error code (e.g., "BOOKING_CONFLICT").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

/// Checkout creation response.
///
/// Returned by `POST /checkout` once the pending reservation is stored
/// and the gateway session is open.
///
/// ## Example Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "reservationId": "550e8400-e29b-41d4-a716-446655440000",
///         "sessionId": "cs_test_a1b2c3",
///         "redirectUrl": "https://checkout.gateway.com/pay/cs_test_a1b2c3"
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// Pending reservation created for this checkout.
    pub reservation_id: Uuid,

    /// Gateway checkout session ID (for support lookups).
    pub session_id: String,

    /// Hosted payment page the client should redirect to.
    pub redirect_url: String,
}

/// Reservation snapshot response.
///
/// Returned by `GET /reservations/:id` and by the cancel endpoints.
///
/// ## Example Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "id": "550e8400-e29b-41d4-a716-446655440000",
///         "listingId": 42,
///         "guestId": 7,
///         "checkIn": "2024-06-01",
///         "checkOut": "2024-06-04",
///         "guestCount": 2,
///         "nights": 3,
///         "total": 33000,
///         "formattedTotal": "330.00 USD",
///         "currency": "usd",
///         "status": "confirmed",
///         "paymentStatus": "completed"
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    /// Reservation ID.
    pub id: Uuid,

    /// Listing being booked.
    pub listing_id: i64,

    /// Guest who booked it.
    pub guest_id: i64,

    /// First night of the stay.
    pub check_in: NaiveDate,

    /// Departure date (exclusive).
    pub check_out: NaiveDate,

    /// Number of guests.
    pub guest_count: i32,

    /// Number of nights charged.
    pub nights: i64,

    /// Nightly rate at booking time (minor units).
    pub nightly_rate: i64,

    /// Cleaning fee at booking time (minor units).
    pub cleaning_fee: i64,

    /// Service fee at booking time (minor units).
    pub service_fee: i64,

    /// Total charged (minor units).
    pub total: i64,

    /// Human-readable total (e.g., "330.00 USD").
    pub formatted_total: String,

    /// ISO currency code.
    pub currency: String,

    /// Reservation status: pending, confirmed, cancelled.
    pub status: String,

    /// Payment status: pending, completed, failed.
    pub payment_status: String,

    /// Gateway checkout session linked to this reservation.
    pub gateway_session_id: Option<String>,

    /// When the reservation was created.
    pub created_at: DateTime<Utc>,

    /// When payment was confirmed.
    pub paid_at: Option<DateTime<Utc>>,

    /// When the reservation was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,

    /// Why the reservation was cancelled.
    pub cancellation_reason: Option<String>,
}

impl ReservationResponse {
    /// Build an API snapshot from a stored reservation.
    pub fn from_reservation(reservation: &Reservation) -> Self {
        let nights = reservation
            .check_out
            .signed_duration_since(reservation.check_in)
            .num_days();

        Self {
            id: reservation.id,
            listing_id: reservation.listing_id,
            guest_id: reservation.guest_id,
            check_in: reservation.check_in,
            check_out: reservation.check_out,
            guest_count: reservation.guest_count,
            nights,
            nightly_rate: reservation.nightly_rate,
            cleaning_fee: reservation.cleaning_fee,
            service_fee: reservation.service_fee,
            total: reservation.total,
            formatted_total: format_amount(reservation.total, &reservation.currency),
            currency: reservation.currency.clone(),
            status: reservation.status.clone(),
            payment_status: reservation.payment_status.clone(),
            gateway_session_id: reservation.gateway_session_id.clone(),
            created_at: reservation.created_at,
            paid_at: reservation.paid_at,
            cancelled_at: reservation.cancelled_at,
            cancellation_reason: reservation.cancellation_reason.clone(),
        }
    }
}

/// Webhook acknowledgement.
///
/// Returned by `POST /payments/webhook` with HTTP 200 once a delivery
/// has been verified and handled (or recognized as a replay). Any
/// non-2xx status tells the gateway to redeliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    /// Event type that was processed (e.g., "checkout.session.completed").
    pub received: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status: "healthy" or "unhealthy".
    pub status: String,

    /// Database connection status.
    pub database: bool,

    /// Service version.
    pub version: String,

    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
}
