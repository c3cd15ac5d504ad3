//! In-memory [`ReservationStore`].
//!
//! Mutex-guarded maps with the same observable contract as the
//! Postgres store, most importantly the atomic overlap check inside
//! `insert_pending`. Service tests run the real checkout/reconciliation
//! logic against this store, including the concurrent double-booking
//! scenarios.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::{Listing, NotificationJob, PaymentStatus, Reservation, WebhookEventRecord};
use crate::services::availability::ranges_overlap;
use crate::services::BookingError;
use crate::store::ReservationStore;

#[derive(Default)]
struct MemoryInner {
    listings: HashMap<i64, Listing>,
    reservations: HashMap<Uuid, Reservation>,
    webhook_events: HashMap<String, WebhookEventRecord>,
    notification_jobs: Vec<NotificationJob>,
}

/// Store backed by process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a listing. Listing CRUD is outside the booking core, so the
    /// memory store exposes this directly for setup.
    pub fn add_listing(&self, listing: Listing) -> Result<(), BookingError> {
        let mut inner = self.lock()?;
        inner.listings.insert(listing.id, listing);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, BookingError> {
        self.inner
            .lock()
            .map_err(|_| BookingError::Persistence("memory store lock poisoned".to_string()))
    }
}

/// The overlap scan shared by `is_available` and `insert_pending`.
/// Must be called with the lock held so check and insert are atomic.
fn has_conflict(
    inner: &MemoryInner,
    listing_id: i64,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> bool {
    inner.reservations.values().any(|r| {
        r.listing_id == listing_id
            && r.status != "cancelled"
            && ranges_overlap(r.check_in, r.check_out, check_in, check_out)
    })
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn get_listing(&self, id: i64) -> Result<Option<Listing>, BookingError> {
        let inner = self.lock()?;
        Ok(inner.listings.get(&id).cloned())
    }

    async fn is_available(
        &self,
        listing_id: i64,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<bool, BookingError> {
        let inner = self.lock()?;
        Ok(!has_conflict(&inner, listing_id, check_in, check_out))
    }

    async fn insert_pending(&self, reservation: &Reservation) -> Result<(), BookingError> {
        let mut inner = self.lock()?;

        if has_conflict(
            &inner,
            reservation.listing_id,
            reservation.check_in,
            reservation.check_out,
        ) {
            return Err(BookingError::Conflict(format!(
                "listing {} already has a reservation overlapping [{}, {})",
                reservation.listing_id, reservation.check_in, reservation.check_out
            )));
        }

        inner
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, BookingError> {
        let inner = self.lock()?;
        Ok(inner.reservations.get(&id).cloned())
    }

    async fn get_by_session(&self, session_id: &str) -> Result<Option<Reservation>, BookingError> {
        let inner = self.lock()?;
        Ok(inner
            .reservations
            .values()
            .find(|r| r.gateway_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn set_gateway_session(&self, id: Uuid, session_id: &str) -> Result<(), BookingError> {
        let mut inner = self.lock()?;
        match inner.reservations.get_mut(&id) {
            Some(r) => {
                r.gateway_session_id = Some(session_id.to_string());
                Ok(())
            }
            None => Err(BookingError::NotFound(format!("Reservation not found: {}", id))),
        }
    }

    async fn confirm_if_pending(
        &self,
        id: Uuid,
        payment_intent_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Reservation>, BookingError> {
        let mut inner = self.lock()?;
        match inner.reservations.get_mut(&id) {
            Some(r) if r.status == "pending" => {
                r.status = "confirmed".to_string();
                r.payment_status = "completed".to_string();
                r.payment_intent_id = Some(payment_intent_id.to_string());
                r.paid_at = Some(paid_at);
                Ok(Some(r.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn cancel_if_pending(
        &self,
        id: Uuid,
        payment_status: PaymentStatus,
        reason: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Option<Reservation>, BookingError> {
        let mut inner = self.lock()?;
        match inner.reservations.get_mut(&id) {
            Some(r) if r.status == "pending" => {
                r.status = "cancelled".to_string();
                r.payment_status = payment_status.to_string();
                r.cancellation_reason = Some(reason.to_string());
                r.cancelled_at = Some(cancelled_at);
                Ok(Some(r.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn cancel_if_confirmed(
        &self,
        id: Uuid,
        reason: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Option<Reservation>, BookingError> {
        let mut inner = self.lock()?;
        match inner.reservations.get_mut(&id) {
            Some(r) if r.status == "confirmed" => {
                r.status = "cancelled".to_string();
                r.cancellation_reason = Some(reason.to_string());
                r.cancelled_at = Some(cancelled_at);
                Ok(Some(r.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Reservation>, BookingError> {
        let inner = self.lock()?;
        let mut stale: Vec<Reservation> = inner
            .reservations
            .values()
            .filter(|r| r.status == "pending" && r.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|r| r.created_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn record_webhook_event(&self, event: &WebhookEventRecord) -> Result<bool, BookingError> {
        let mut inner = self.lock()?;
        if inner.webhook_events.contains_key(&event.gateway_event_id) {
            return Ok(false);
        }
        inner
            .webhook_events
            .insert(event.gateway_event_id.clone(), event.clone());
        Ok(true)
    }

    async fn get_webhook_event(
        &self,
        gateway_event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, BookingError> {
        let inner = self.lock()?;
        Ok(inner.webhook_events.get(gateway_event_id).cloned())
    }

    async fn mark_webhook_event(
        &self,
        gateway_event_id: &str,
        processed: bool,
        error: Option<&str>,
    ) -> Result<(), BookingError> {
        let mut inner = self.lock()?;
        if let Some(event) = inner.webhook_events.get_mut(gateway_event_id) {
            event.processed = processed;
            event.processing_error = error.map(str::to_string);
        }
        Ok(())
    }

    async fn enqueue_notification(&self, job: &NotificationJob) -> Result<(), BookingError> {
        let mut inner = self.lock()?;
        inner.notification_jobs.push(job.clone());
        Ok(())
    }

    async fn pending_notifications(&self, limit: i64) -> Result<Vec<NotificationJob>, BookingError> {
        let inner = self.lock()?;
        let mut jobs: Vec<NotificationJob> = inner
            .notification_jobs
            .iter()
            .filter(|j| j.status == "pending")
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs.truncate(limit as usize);
        Ok(jobs)
    }

    async fn mark_notification(
        &self,
        id: Uuid,
        status: &str,
        error: Option<&str>,
    ) -> Result<(), BookingError> {
        let mut inner = self.lock()?;
        if let Some(job) = inner.notification_jobs.iter_mut().find(|j| j.id == id) {
            job.status = status.to_string();
            job.error_message = error.map(str::to_string);
            if status == "sent" {
                job.sent_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn reservation_count(&self) -> Result<i64, BookingError> {
        let inner = self.lock()?;
        Ok(inner.reservations.len() as i64)
    }
}
