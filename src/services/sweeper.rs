//! # Abandonment Sweeper
//!
//! A checkout that never finishes leaves a `pending/pending` row
//! holding its dates. The gateway's session-expired event reclaims most
//! of them (the push path, handled by the reconciler); this sweeper is
//! the pull path that catches the rest: sessions the gateway never
//! opened because the create call failed, and events that were lost
//! past the provider's retry horizon.
//!
//! Both paths converge on the same idempotent
//! `cancel_if_still_pending` transition, so they can fire in any order
//! or simultaneously without double-cancelling.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::services::lifecycle::{ReservationLifecycle, TransitionOutcome};
use crate::services::BookingError;
use crate::store::ReservationStore;

/// Reservations reclaimed per sweep pass.
const SWEEP_BATCH: i64 = 100;

/// Background worker cancelling pending reservations past their TTL.
///
/// ## Usage
///
/// ```rust,ignore
/// let sweeper = AbandonmentSweeper::new(
///     store.clone(),
///     lifecycle.clone(),
///     config.sweep_interval_secs,
///     config.pending_ttl_secs,
/// );
/// tokio::spawn(async move {
///     sweeper.start().await;
/// });
/// ```
#[derive(Clone)]
pub struct AbandonmentSweeper {
    store: Arc<dyn ReservationStore>,
    lifecycle: ReservationLifecycle,
    interval_secs: u64,
    pending_ttl_secs: i64,
}

impl AbandonmentSweeper {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        lifecycle: ReservationLifecycle,
        interval_secs: u64,
        pending_ttl_secs: i64,
    ) -> Self {
        Self { store, lifecycle, interval_secs, pending_ttl_secs }
    }

    /// Start the sweep loop. Runs forever; spawn it.
    pub async fn start(&self) {
        info!(
            "Starting abandonment sweeper (interval: {}s, pending TTL: {}s)",
            self.interval_secs, self.pending_ttl_secs
        );

        let mut ticker = interval(Duration::from_secs(self.interval_secs));

        loop {
            ticker.tick().await;

            if let Err(e) = self.sweep_once().await {
                error!("Sweep pass failed: {}", e);
            }
        }
    }

    /// One sweep pass. Returns how many reservations were cancelled.
    pub async fn sweep_once(&self) -> Result<usize, BookingError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.pending_ttl_secs);
        let stale = self.store.find_stale_pending(cutoff, SWEEP_BATCH).await?;
        if stale.is_empty() {
            return Ok(0);
        }

        info!("Sweeping {} stale pending reservation(s)", stale.len());
        let mut swept = 0;

        for reservation in stale {
            match self
                .lifecycle
                .cancel_if_still_pending(reservation.id, "checkout abandoned")
                .await
            {
                Ok(TransitionOutcome::Applied(_)) => swept += 1,
                // lost the race to a payment or another sweeper; fine
                Ok(_) => {}
                Err(e) => warn!("Sweep of reservation {} failed: {}", reservation.id, e),
            }
        }

        if swept > 0 {
            info!("✅ Swept {} abandoned reservation(s)", swept);
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Reservation;
    use crate::services::notifier::StoreQueue;
    use crate::store::MemoryStore;
    use chrono::{DateTime, Duration as ChronoDuration, NaiveDate};
    use uuid::Uuid;

    fn setup() -> (Arc<MemoryStore>, AbandonmentSweeper) {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(StoreQueue::new(store.clone()));
        let lifecycle = ReservationLifecycle::new(store.clone(), queue);
        let sweeper = AbandonmentSweeper::new(store.clone(), lifecycle, 60, 1800);
        (store, sweeper)
    }

    async fn seed_pending_at(
        store: &MemoryStore,
        check_in: NaiveDate,
        created_at: DateTime<chrono::Utc>,
    ) -> Reservation {
        let reservation = Reservation {
            id: Uuid::new_v4(),
            listing_id: 42,
            guest_id: 7,
            check_in,
            check_out: check_in + ChronoDuration::days(3),
            guest_count: 2,
            nightly_rate: 10_000,
            cleaning_fee: 0,
            service_fee: 0,
            total: 30_000,
            currency: "usd".to_string(),
            status: "pending".to_string(),
            payment_status: "pending".to_string(),
            gateway_session_id: None,
            payment_intent_id: None,
            created_at,
            paid_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        };
        store.insert_pending(&reservation).await.unwrap();
        reservation
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_sweep_cancels_only_expired_pending_rows() {
        let (store, sweeper) = setup();
        let now = Utc::now();

        let stale = seed_pending_at(&store, date(2024, 7, 1), now - ChronoDuration::hours(2)).await;
        let fresh = seed_pending_at(&store, date(2024, 8, 1), now).await;

        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

        let swept = store.get_reservation(stale.id).await.unwrap().unwrap();
        assert_eq!(swept.status, "cancelled");
        assert_eq!(swept.payment_status, "failed");
        assert_eq!(swept.cancellation_reason.as_deref(), Some("checkout abandoned"));

        let untouched = store.get_reservation(fresh.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, "pending");

        // the dates are free again
        assert!(store
            .is_available(42, date(2024, 7, 1), date(2024, 7, 4))
            .await
            .unwrap());

        // second pass finds nothing
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_ignores_reservations_that_left_pending() {
        let (store, sweeper) = setup();
        let now = Utc::now();

        let r = seed_pending_at(&store, date(2024, 7, 1), now - ChronoDuration::hours(2)).await;
        store
            .confirm_if_pending(r.id, "pi_1", now)
            .await
            .unwrap()
            .expect("confirmation should apply");

        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
        let stored = store.get_reservation(r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "confirmed");
    }
}
