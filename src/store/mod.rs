//! # Reservation Store
//!
//! Persistence seam for the booking services. Everything the services
//! need from durable storage goes through the [`ReservationStore`]
//! trait, so the checkout/reconciliation logic can run against real
//! PostgreSQL in production and against an in-memory store in tests.
//!
//! ## Implementations
//!
//! | Store | Backing | Used by |
//! |-------|---------|---------|
//! | `PostgresStore` | deadpool-postgres pool | the running service |
//! | `MemoryStore` | mutex-guarded maps | tests, local experiments |
//!
//! ## The availability contract
//!
//! Both implementations promise the same thing about `insert_pending`:
//! it atomically rejects a reservation whose `[check_in, check_out)`
//! overlaps a non-cancelled reservation for the same listing. Postgres
//! enforces it with an exclusion constraint; the memory store checks
//! under its lock. Callers may probe `is_available` first for a
//! friendly early answer, but the insert is the authoritative check.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::{Listing, NotificationJob, PaymentStatus, Reservation, WebhookEventRecord};
use crate::services::BookingError;

/// Storage operations for reservations and their satellite tables.
///
/// Transition methods (`confirm_if_pending`, `cancel_if_pending`,
/// `cancel_if_confirmed`) have compare-and-swap semantics: the status
/// precondition and the update apply atomically, and `None` comes back
/// when the reservation had already left the expected state. Callers
/// re-fetch to decide whether that means "already done" or "invalid".
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Fetch a listing by id.
    async fn get_listing(&self, id: i64) -> Result<Option<Listing>, BookingError>;

    /// Report whether `[check_in, check_out)` is free of non-cancelled
    /// reservations for the listing.
    async fn is_available(
        &self,
        listing_id: i64,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<bool, BookingError>;

    /// Insert a pending reservation, enforcing the no-overlap contract.
    ///
    /// Returns `BookingError::Conflict` when the dates are taken.
    async fn insert_pending(&self, reservation: &Reservation) -> Result<(), BookingError>;

    /// Fetch a reservation by id.
    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, BookingError>;

    /// Fetch a reservation by its gateway checkout session id.
    async fn get_by_session(&self, session_id: &str) -> Result<Option<Reservation>, BookingError>;

    /// Attach the gateway session id to a reservation after the session
    /// has been opened.
    async fn set_gateway_session(&self, id: Uuid, session_id: &str) -> Result<(), BookingError>;

    /// CAS: pending -> confirmed/completed, recording the payment
    /// intent and paid timestamp.
    async fn confirm_if_pending(
        &self,
        id: Uuid,
        payment_intent_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Reservation>, BookingError>;

    /// CAS: pending -> cancelled, with the payment status the
    /// cancellation leaves behind and a human-readable reason.
    async fn cancel_if_pending(
        &self,
        id: Uuid,
        payment_status: PaymentStatus,
        reason: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Option<Reservation>, BookingError>;

    /// CAS: confirmed -> cancelled. Payment status stays completed;
    /// refunds are handled outside this core.
    async fn cancel_if_confirmed(
        &self,
        id: Uuid,
        reason: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Option<Reservation>, BookingError>;

    /// Pending reservations created before `cutoff`, oldest first.
    async fn find_stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Reservation>, BookingError>;

    /// Record a delivered webhook event. Returns `false` when the
    /// gateway event id was already recorded.
    async fn record_webhook_event(&self, event: &WebhookEventRecord) -> Result<bool, BookingError>;

    /// Fetch a recorded webhook event by gateway event id.
    async fn get_webhook_event(
        &self,
        gateway_event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, BookingError>;

    /// Record the processing outcome for a webhook event.
    async fn mark_webhook_event(
        &self,
        gateway_event_id: &str,
        processed: bool,
        error: Option<&str>,
    ) -> Result<(), BookingError>;

    /// Enqueue a notification job.
    async fn enqueue_notification(&self, job: &NotificationJob) -> Result<(), BookingError>;

    /// Pending notification jobs, oldest first.
    async fn pending_notifications(&self, limit: i64) -> Result<Vec<NotificationJob>, BookingError>;

    /// Record the delivery outcome for a notification job.
    async fn mark_notification(
        &self,
        id: Uuid,
        status: &str,
        error: Option<&str>,
    ) -> Result<(), BookingError>;

    /// Total reservation count, for the health endpoint.
    async fn reservation_count(&self) -> Result<i64, BookingError>;
}
