//! # Notification Queue & Dispatcher
//!
//! Guest-facing messaging stays outside this service. What lives here
//! is the seam: a [`NotificationQueue`] the lifecycle manager enqueues
//! into when a reservation is confirmed or cancelled, a durable
//! store-backed implementation of that seam, and a background
//! dispatcher that drains the queue toward a delivery sink.
//!
//! ## Flow
//!
//! ```text
//! ReservationLifecycle ──enqueue──▶ notification_jobs (pending)
//!                                          │
//!                NotificationDispatcher ───┘ every NOTIFY_INTERVAL_SECS
//!                                          │
//!                                   deliver + mark sent/failed
//! ```
//!
//! Delivery in this repo is a structured log line; a real deployment
//! replaces `deliver` with an email/SMS/push integration. The queue
//! contract is unchanged either way: one job per applied transition,
//! jobs survive a restart, a failed delivery is marked and visible.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::{NotificationJob, Reservation};
use crate::services::BookingError;
use crate::store::ReservationStore;

/// Job type for a reservation that reached `confirmed`.
pub const JOB_BOOKING_CONFIRMED: &str = "booking_confirmed";

/// Job type for a reservation that reached `cancelled`.
pub const JOB_BOOKING_CANCELLED: &str = "booking_cancelled";

// ============================================================================
// JOB CONSTRUCTION
// ============================================================================

fn job_for(reservation: &Reservation, job_type: &str, payload: serde_json::Value) -> NotificationJob {
    NotificationJob {
        id: Uuid::new_v4(),
        job_type: job_type.to_string(),
        reservation_id: reservation.id,
        payload,
        status: "pending".to_string(),
        error_message: None,
        created_at: Utc::now(),
        sent_at: None,
    }
}

/// Builds the confirmation job for a freshly confirmed reservation.
pub fn confirmation_job(reservation: &Reservation) -> NotificationJob {
    job_for(
        reservation,
        JOB_BOOKING_CONFIRMED,
        json!({
            "guestId": reservation.guest_id,
            "listingId": reservation.listing_id,
            "checkIn": reservation.check_in,
            "checkOut": reservation.check_out,
            "total": reservation.total,
            "currency": reservation.currency,
        }),
    )
}

/// Builds the cancellation job, carrying the recorded reason.
pub fn cancellation_job(reservation: &Reservation, reason: &str) -> NotificationJob {
    job_for(
        reservation,
        JOB_BOOKING_CANCELLED,
        json!({
            "guestId": reservation.guest_id,
            "listingId": reservation.listing_id,
            "checkIn": reservation.check_in,
            "checkOut": reservation.check_out,
            "reason": reason,
        }),
    )
}

// ============================================================================
// QUEUE INTERFACE
// ============================================================================

/// The enqueue seam the booking core depends on. Durability and retry
/// are the implementation's concern, not the caller's.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, job: NotificationJob) -> Result<(), BookingError>;
}

/// Queue backed by the reservation store's `notification_jobs` rows.
#[derive(Clone)]
pub struct StoreQueue {
    store: Arc<dyn ReservationStore>,
}

impl StoreQueue {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationQueue for StoreQueue {
    async fn enqueue(&self, job: NotificationJob) -> Result<(), BookingError> {
        debug!(
            "Enqueueing {} notification for reservation {}",
            job.job_type, job.reservation_id
        );
        self.store.enqueue_notification(&job).await
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Background worker draining pending notification jobs.
///
/// ## Usage
///
/// ```rust,ignore
/// let dispatcher = NotificationDispatcher::new(store, config.notify_interval_secs);
/// tokio::spawn(async move {
///     dispatcher.start().await;
/// });
/// ```
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn ReservationStore>,
    interval_secs: u64,
}

/// How many jobs one dispatch pass claims.
const DISPATCH_BATCH: i64 = 50;

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn ReservationStore>, interval_secs: u64) -> Self {
        Self { store, interval_secs }
    }

    /// Start the dispatch loop. Runs forever; spawn it.
    pub async fn start(&self) {
        info!(
            "Starting notification dispatcher (interval: {}s)",
            self.interval_secs
        );

        let mut ticker = interval(Duration::from_secs(self.interval_secs));

        loop {
            ticker.tick().await;

            if let Err(e) = self.dispatch_pending().await {
                error!("Notification dispatch pass failed: {}", e);
            }
        }
    }

    /// One dispatch pass: claim pending jobs, deliver each, record the
    /// outcome. Returns the number of jobs delivered.
    pub async fn dispatch_pending(&self) -> Result<usize, BookingError> {
        let jobs = self.store.pending_notifications(DISPATCH_BATCH).await?;
        if jobs.is_empty() {
            return Ok(0);
        }

        debug!("Dispatching {} notification job(s)", jobs.len());
        let mut delivered = 0;

        for job in jobs {
            match self.deliver(&job).await {
                Ok(()) => {
                    self.store.mark_notification(job.id, "sent", None).await?;
                    delivered += 1;
                }
                Err(e) => {
                    warn!("Delivery failed for job {}: {}", job.id, e);
                    self.store
                        .mark_notification(job.id, "failed", Some(&e.to_string()))
                        .await?;
                }
            }
        }

        Ok(delivered)
    }

    /// The delivery sink. Log-only in this service.
    async fn deliver(&self, job: &NotificationJob) -> Result<(), BookingError> {
        info!(
            "📣 Notification [{}] reservation {} payload {}",
            job.job_type, job.reservation_id, job.payload
        );
        Ok(())
    }
}
