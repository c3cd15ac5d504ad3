//! # Database Models
//!
//! This module defines the data structures that map to database tables.
//! Each struct represents a row in a table.
//!
//! ## Table Overview
//!
//! | Table | Description |
//! |-------|-------------|
//! | `listings` | Rental listings (rates, capacity, active flag) |
//! | `reservations` | Booking records tracked through the state machine |
//! | `webhook_events` | Every gateway callback, with processing outcome |
//! | `notification_jobs` | Queued confirmation/cancellation messages |
//!
//! ## Relationship Diagram
//!
//! ```text
//! ┌─────────────┐       ┌──────────────────┐
//! │  listings   │──────<│   reservations   │
//! │             │       │                  │
//! │ id (PK)     │       │ listing_id (FK)  │
//! │ nightly_rate│       │ check_in/out     │
//! │ ...         │       │ status           │
//! └─────────────┘       └──────────────────┘
//!                               │
//!                               │
//!                               ▼
//!                       ┌──────────────────┐
//!                       │notification_jobs │
//!                       │                  │
//!                       │ reservation_id   │
//!                       │ job_type         │
//!                       │ status           │
//!                       └──────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reservation lifecycle status.
///
/// The overall state of the booking. Transitions are enforced by the
/// lifecycle service; the database only ever sees the lowercase string
/// forms produced by `to_string()`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReservationStatus {
    /// Created at checkout, awaiting payment
    Pending,
    /// Payment completed at the gateway
    Confirmed,
    /// Terminal: expired, aborted, or cancelled
    Cancelled,
}

impl ToString for ReservationStatus {
    fn to_string(&self) -> String {
        match self {
            ReservationStatus::Pending => "pending".to_string(),
            ReservationStatus::Confirmed => "confirmed".to_string(),
            ReservationStatus::Cancelled => "cancelled".to_string(),
        }
    }
}

impl ReservationStatus {
    /// Parse the stored string form back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReservationStatus::Pending),
            "confirmed" => Some(ReservationStatus::Confirmed),
            "cancelled" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }
}

/// Payment status, tracked alongside the reservation status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Gateway session open, nothing collected yet
    Pending,
    /// Gateway reported the payment completed
    Completed,
    /// Session expired or payment failed
    Failed,
}

impl ToString for PaymentStatus {
    fn to_string(&self) -> String {
        match self {
            PaymentStatus::Pending => "pending".to_string(),
            PaymentStatus::Completed => "completed".to_string(),
            PaymentStatus::Failed => "failed".to_string(),
        }
    }
}

impl PaymentStatus {
    /// Parse the stored string form back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// Represents a listing row in the database.
///
/// Listing CRUD belongs to another part of the platform; the booking core
/// only reads these rows to check existence, capacity, and rates.
///
/// ## Fields
///
/// | Field | Type | Description |
/// |-------|------|-------------|
/// | id | i64 | Listing identifier |
/// | nightly_rate | i64 | Price per night in minor units |
/// | cleaning_fee | i64 | Flat fee in minor units (0 = none) |
/// | service_fee | i64 | Flat fee in minor units (0 = none) |
/// | max_guests | i32 | Capacity limit enforced at checkout |
/// | is_active | bool | Inactive listings reject checkouts |
///
/// ## Note on Types
///
/// Money is `i64` minor units (cents): $125.00 is stored as 12500.
/// PostgreSQL has no unsigned integers, and integer cents avoid every
/// floating-point rounding hazard in price arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Listing identifier.
    pub id: i64,

    /// Display title, carried into notification payloads.
    pub title: String,

    /// Price per night, in minor units.
    pub nightly_rate: i64,

    /// Flat cleaning fee in minor units. Zero when the listing has none.
    pub cleaning_fee: i64,

    /// Flat service fee in minor units. Zero when the listing has none.
    pub service_fee: i64,

    /// Maximum guests the listing accommodates.
    pub max_guests: i32,

    /// Whether the listing currently accepts bookings.
    pub is_active: bool,

    /// When the listing row was created.
    pub created_at: DateTime<Utc>,
}

/// Represents a reservation row in the database.
///
/// The central entity of the booking core. Created `pending/pending` by
/// checkout, then driven through the state machine by webhook
/// reconciliation, the abandonment sweeper, or guest cancellation.
/// Rows are never deleted here; `cancelled` is terminal.
///
/// ## Example
///
/// A guest books listing 42 for 3 nights at $100/night + $30 cleaning:
/// ```text
/// Reservation {
///     id: "550e8400-e29b-41d4-a716-446655440000",
///     listing_id: 42,
///     guest_id: 7,
///     check_in: 2024-06-01,
///     check_out: 2024-06-04,
///     total: 33_000,          // $330.00 in cents
///     status: "pending",
///     payment_status: "pending",
///     ...
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique reservation ID (UUID v4).
    pub id: Uuid,

    /// The booked listing.
    pub listing_id: i64,

    /// The guest who initiated checkout. Identity is owned elsewhere;
    /// only the id is referenced here.
    pub guest_id: i64,

    /// First night of the stay (inclusive).
    pub check_in: NaiveDate,

    /// Checkout date (exclusive). Always after `check_in`.
    pub check_out: NaiveDate,

    /// Number of guests staying.
    pub guest_count: i32,

    /// Nightly rate snapshot at booking time, in minor units.
    pub nightly_rate: i64,

    /// Cleaning fee snapshot, in minor units.
    pub cleaning_fee: i64,

    /// Service fee snapshot, in minor units.
    pub service_fee: i64,

    /// Total charged, in minor units. Computed once at creation and
    /// never recomputed afterwards.
    pub total: i64,

    /// ISO 4217 currency code for the amounts above.
    pub currency: String,

    /// Lifecycle status: "pending", "confirmed", or "cancelled".
    pub status: String,

    /// Payment status: "pending", "completed", or "failed".
    pub payment_status: String,

    /// The gateway checkout session opened for this reservation.
    /// NULL only during the instant between insert and session creation.
    pub gateway_session_id: Option<String>,

    /// The gateway's payment-intent id, recorded at confirmation.
    /// NULL until payment completes.
    pub payment_intent_id: Option<String>,

    /// When the reservation was created.
    pub created_at: DateTime<Utc>,

    /// When payment was confirmed. NULL until then.
    pub paid_at: Option<DateTime<Utc>>,

    /// When the reservation was cancelled. NULL unless cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,

    /// Why the reservation was cancelled, e.g. "payment session expired".
    pub cancellation_reason: Option<String>,
}

/// Represents a gateway webhook event row.
///
/// Every delivery is recorded before processing. The gateway event id is
/// unique, so a redelivered event is recognized and acknowledged without
/// re-applying side effects. `processed` flips to true only after the
/// state transition and notification enqueue both succeeded, which is
/// what makes at-least-once redelivery safe to lean on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    /// Unique row ID.
    pub id: Uuid,

    /// The gateway's event id ("evt_..."), unique per delivery content.
    pub gateway_event_id: String,

    /// Event type, e.g. "checkout.session.completed".
    pub event_type: String,

    /// Raw event payload as received.
    pub payload: serde_json::Value,

    /// Whether processing completed (transition applied + job enqueued).
    pub processed: bool,

    /// Error message from the last failed processing attempt.
    pub processing_error: Option<String>,

    /// When the event was first received.
    pub created_at: DateTime<Utc>,
}

/// Represents a notification job row.
///
/// The booking core only enqueues these; a background dispatcher picks
/// them up and hands them to the delivery collaborator. Delivery retries
/// and formatting are that collaborator's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    /// Unique job ID.
    pub id: Uuid,

    /// Job type: "booking_confirmed" or "booking_cancelled".
    pub job_type: String,

    /// The reservation this notification is about.
    pub reservation_id: Uuid,

    /// Message payload for the dispatcher (guest id, dates, total).
    pub payload: serde_json::Value,

    /// Queue status: "pending", "sent", or "failed".
    pub status: String,

    /// Error message from the last failed delivery attempt.
    pub error_message: Option<String>,

    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,

    /// When the job was delivered. NULL until then.
    pub sent_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_roundtrip() {
        assert_eq!(ReservationStatus::Pending.to_string(), "pending");
        assert_eq!(ReservationStatus::Confirmed.to_string(), "confirmed");
        assert_eq!(ReservationStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(
            ReservationStatus::parse("confirmed"),
            Some(ReservationStatus::Confirmed)
        );
        assert_eq!(ReservationStatus::parse("bogus"), None);
    }

    #[test]
    fn test_payment_status_string_roundtrip() {
        assert_eq!(PaymentStatus::Completed.to_string(), "completed");
        assert_eq!(PaymentStatus::parse("failed"), Some(PaymentStatus::Failed));
        assert_eq!(PaymentStatus::parse(""), None);
    }
}
