//! # Reservation Lifecycle Manager
//!
//! The only component that moves a reservation between states. Every
//! other service (checkout, reconciler, sweeper, handlers) goes through
//! the methods here, so the guard rules live in exactly one place.
//!
//! ## State machine
//!
//! | Status/PaymentStatus  | Moves to             | Trigger |
//! |-----------------------|----------------------|---------|
//! | pending/pending       | confirmed/completed  | gateway reports payment completed |
//! | pending/pending       | cancelled/failed     | session expired, abandoned checkout |
//! | pending/pending       | cancelled/pending    | guest aborts before paying |
//! | confirmed/completed   | cancelled/completed  | guest cancels a paid stay |
//! | cancelled/*           | (terminal)           | |
//!
//! ## Guards
//!
//! 1. Only a `pending` reservation confirms.
//! 2. Guest-initiated cancellation is rejected once the stay has
//!    started (check-in today or earlier).
//! 3. A transition is applied with a single conditional UPDATE, so the
//!    state check and the write commit together or not at all.
//!
//! Guard 3 is what makes duplicate webhook deliveries and racing
//! workers safe: both issue the compare-and-swap, storage applies it
//! once, and the loser re-reads the row to find out why.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::{PaymentStatus, Reservation, ReservationStatus};
use crate::services::notifier::{cancellation_job, confirmation_job, NotificationQueue};
use crate::services::BookingError;
use crate::store::ReservationStore;

// ============================================================================
// TRANSITION TABLE
// ============================================================================

/// Whether the state machine allows `from -> to`.
pub fn can_transition(from: ReservationStatus, to: ReservationStatus) -> bool {
    use ReservationStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled)
    )
}

/// Whether a status admits no further transitions.
pub fn is_terminal(status: ReservationStatus) -> bool {
    matches!(status, ReservationStatus::Cancelled)
}

/// Result of a transition attempt that tolerates redelivery.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// This call performed the transition.
    Applied(Reservation),
    /// The reservation was already in the target state. Nothing was
    /// written and no side effects ran.
    AlreadyApplied(Reservation),
    /// The precondition no longer holds and the target state was not
    /// reached either. Nothing was written.
    Skipped(Reservation),
}

impl TransitionOutcome {
    pub fn reservation(&self) -> &Reservation {
        match self {
            TransitionOutcome::Applied(r)
            | TransitionOutcome::AlreadyApplied(r)
            | TransitionOutcome::Skipped(r) => r,
        }
    }
}

// ============================================================================
// SERVICE
// ============================================================================

/// Applies guarded transitions and enqueues the matching notification
/// for each one that lands.
///
/// ## Usage
///
/// ```rust,ignore
/// let lifecycle = ReservationLifecycle::new(store.clone(), queue.clone());
/// lifecycle.confirm_payment(reservation_id, "pi_123").await?;
/// ```
#[derive(Clone)]
pub struct ReservationLifecycle {
    store: Arc<dyn ReservationStore>,
    notifications: Arc<dyn NotificationQueue>,
}

impl ReservationLifecycle {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        notifications: Arc<dyn NotificationQueue>,
    ) -> Self {
        Self { store, notifications }
    }

    /// pending/pending -> confirmed/completed, recording the canonical
    /// payment intent and the paid timestamp.
    ///
    /// # Returns
    ///
    /// * `Applied` - this call confirmed the reservation and enqueued
    ///   the confirmation notification
    /// * `AlreadyApplied` - reservation was confirmed earlier
    ///   (duplicate webhook delivery)
    /// * `Err(NotFound)` - no such reservation
    /// * `Err(InvalidTransition)` - reservation is cancelled; payment
    ///   was captured for a dead reservation and needs follow-up
    pub async fn confirm_payment(
        &self,
        reservation_id: Uuid,
        payment_intent_id: &str,
    ) -> Result<TransitionOutcome, BookingError> {
        if let Some(confirmed) = self
            .store
            .confirm_if_pending(reservation_id, payment_intent_id, Utc::now())
            .await?
        {
            info!(
                "✅ Reservation {} confirmed with payment intent {}",
                reservation_id, payment_intent_id
            );
            self.notifications.enqueue(confirmation_job(&confirmed)).await?;
            return Ok(TransitionOutcome::Applied(confirmed));
        }

        // compare-and-swap lost: read the row to see why
        let current = self.fetch(reservation_id).await?;
        match ReservationStatus::parse(&current.status) {
            Some(ReservationStatus::Confirmed) => {
                warn!(
                    "Reservation {} already confirmed, duplicate confirmation ignored",
                    reservation_id
                );
                Ok(TransitionOutcome::AlreadyApplied(current))
            }
            Some(ReservationStatus::Cancelled) => {
                error!(
                    "Payment {} completed for cancelled reservation {}, manual follow-up required",
                    payment_intent_id, reservation_id
                );
                Err(BookingError::InvalidTransition {
                    from: current.status.clone(),
                    to: "confirmed".to_string(),
                })
            }
            _ => Err(BookingError::Conflict(format!(
                "reservation {} changed state during confirmation",
                reservation_id
            ))),
        }
    }

    /// pending/pending -> cancelled/failed, the abandonment path.
    /// Idempotent: a reservation that already left `pending` is
    /// reported, not re-cancelled.
    pub async fn cancel_if_still_pending(
        &self,
        reservation_id: Uuid,
        reason: &str,
    ) -> Result<TransitionOutcome, BookingError> {
        if let Some(cancelled) = self
            .store
            .cancel_if_pending(reservation_id, PaymentStatus::Failed, reason, Utc::now())
            .await?
        {
            info!("✅ Reservation {} cancelled: {}", reservation_id, reason);
            self.notifications
                .enqueue(cancellation_job(&cancelled, reason))
                .await?;
            return Ok(TransitionOutcome::Applied(cancelled));
        }

        let current = self.fetch(reservation_id).await?;
        match ReservationStatus::parse(&current.status) {
            Some(ReservationStatus::Cancelled) => {
                Ok(TransitionOutcome::AlreadyApplied(current))
            }
            Some(ReservationStatus::Confirmed) => {
                // payment won the race against expiry; leave it alone
                warn!(
                    "Reservation {} is confirmed, skipping cancellation ({})",
                    reservation_id, reason
                );
                Ok(TransitionOutcome::Skipped(current))
            }
            _ => Err(BookingError::Conflict(format!(
                "reservation {} changed state during cancellation",
                reservation_id
            ))),
        }
    }

    /// Guest aborts an unpaid reservation: pending/pending ->
    /// cancelled/pending. The payment status stays `pending` because no
    /// payment outcome ever arrived.
    pub async fn guest_cancel_pending(
        &self,
        reservation_id: Uuid,
        reason: &str,
    ) -> Result<Reservation, BookingError> {
        let current = self.fetch(reservation_id).await?;
        self.reject_if_started(&current)?;

        match self
            .store
            .cancel_if_pending(reservation_id, PaymentStatus::Pending, reason, Utc::now())
            .await?
        {
            Some(cancelled) => {
                info!("✅ Reservation {} cancelled by guest", reservation_id);
                self.notifications
                    .enqueue(cancellation_job(&cancelled, reason))
                    .await?;
                Ok(cancelled)
            }
            None => {
                let current = self.fetch(reservation_id).await?;
                Err(BookingError::InvalidTransition {
                    from: current.status.clone(),
                    to: "cancelled".to_string(),
                })
            }
        }
    }

    /// Guest cancels a paid stay: confirmed/completed ->
    /// cancelled/completed. The money side is untouched here; refunds
    /// are settled outside this service.
    pub async fn guest_cancel_confirmed(
        &self,
        reservation_id: Uuid,
        reason: &str,
    ) -> Result<Reservation, BookingError> {
        let current = self.fetch(reservation_id).await?;
        self.reject_if_started(&current)?;

        match self
            .store
            .cancel_if_confirmed(reservation_id, reason, Utc::now())
            .await?
        {
            Some(cancelled) => {
                info!("✅ Confirmed reservation {} cancelled by guest", reservation_id);
                self.notifications
                    .enqueue(cancellation_job(&cancelled, reason))
                    .await?;
                Ok(cancelled)
            }
            None => {
                let current = self.fetch(reservation_id).await?;
                Err(BookingError::InvalidTransition {
                    from: current.status.clone(),
                    to: "cancelled".to_string(),
                })
            }
        }
    }

    async fn fetch(&self, reservation_id: Uuid) -> Result<Reservation, BookingError> {
        self.store
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!("Reservation not found: {}", reservation_id))
            })
    }

    /// Guard 2: a stay whose check-in is today or earlier can no longer
    /// be cancelled by the guest.
    fn reject_if_started(&self, reservation: &Reservation) -> Result<(), BookingError> {
        let today = Utc::now().date_naive();
        if reservation.check_in <= today {
            return Err(BookingError::Conflict(format!(
                "stay starting {} can no longer be cancelled",
                reservation.check_in
            )));
        }
        Ok(())
    }
}
