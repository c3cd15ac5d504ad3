//! # Checkout Orchestrator
//!
//! Turns a booking request into a pending reservation plus a hosted
//! payment session. The ordering inside [`CheckoutService::create_checkout`]
//! is the whole point of the module:
//!
//! ```text
//! 1. Validate the date range
//! 2. Load the listing, check it is active and fits the party
//! 3. Probe availability
//! 4. Snapshot the price
//! 5. Persist the pending/pending reservation   <-- before the gateway
//! 6. Open the gateway session, tagged with the reservation id
//! ```
//!
//! The reservation row goes in before the gateway is contacted. If the
//! gateway call then fails, the row sits in `pending` until the sweeper
//! reclaims it. The reverse order would be worse: a paid-for session
//! pointing at a reservation that was never written.
//!
//! Step 3 is advisory. Two requests can both pass it for the same
//! dates; the storage exclusion constraint decides the winner at step 5
//! and the loser surfaces a date conflict.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::Reservation;
use crate::gateway::{CreateSessionParams, PaymentGateway};
use crate::services::{availability, pricing, BookingError};
use crate::store::ReservationStore;

/// Inputs for one checkout attempt.
#[derive(Debug, Clone)]
pub struct CheckoutParams {
    pub listing_id: i64,
    pub guest_id: i64,
    pub check_in: chrono::NaiveDate,
    pub check_out: chrono::NaiveDate,
    pub guest_count: i32,
    /// Lowercase ISO code; defaults to `usd`.
    pub currency: Option<String>,
    /// Overrides the configured post-payment redirect.
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

/// What a successful checkout hands back to the client.
#[derive(Debug, Clone)]
pub struct CheckoutSessionInfo {
    pub session_id: String,
    pub redirect_url: String,
    pub reservation_id: Uuid,
}

/// Orchestrates reservation creation against the store and the payment
/// gateway.
///
/// ## Usage
///
/// ```rust,ignore
/// let checkout = CheckoutService::new(store.clone(), gateway.clone(), config.clone());
/// let info = checkout.create_checkout(params).await?;
/// // redirect the guest to info.redirect_url
/// ```
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn ReservationStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: AppConfig,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: AppConfig,
    ) -> Self {
        Self { store, gateway, config }
    }

    /// Runs the full checkout flow.
    ///
    /// ## Returns
    ///
    /// * `Ok(CheckoutSessionInfo)` - pending reservation created,
    ///   session open, guest can be redirected
    /// * `Err(Validation)` - bad dates or guest count
    /// * `Err(NotFound)` - unknown or inactive listing
    /// * `Err(Conflict)` - dates not available
    /// * `Err(Gateway)` - provider unreachable; the pending row is left
    ///   for the sweeper
    pub async fn create_checkout(
        &self,
        params: CheckoutParams,
    ) -> Result<CheckoutSessionInfo, BookingError> {
        info!(
            "Checkout requested: listing {} guest {} {} to {} ({} guests)",
            params.listing_id, params.guest_id, params.check_in, params.check_out,
            params.guest_count
        );

        // 1. Date ordering
        availability::validate_date_range(params.check_in, params.check_out)?;

        // 2. Listing must exist, be active, and fit the party
        let listing = self
            .store
            .get_listing(params.listing_id)
            .await?
            .filter(|l| l.is_active)
            .ok_or_else(|| {
                BookingError::NotFound(format!("Listing not found: {}", params.listing_id))
            })?;

        if params.guest_count < 1 {
            return Err(BookingError::Validation(
                "guest count must be at least 1".to_string(),
            ));
        }
        if params.guest_count > listing.max_guests {
            return Err(BookingError::Validation(format!(
                "listing sleeps at most {} guests",
                listing.max_guests
            )));
        }

        // 3. Availability probe
        if !self
            .store
            .is_available(params.listing_id, params.check_in, params.check_out)
            .await?
        {
            return Err(BookingError::Conflict(
                "not available for selected dates".to_string(),
            ));
        }

        // 4. Price snapshot
        let quote = pricing::quote_stay(&listing, params.check_in, params.check_out)?;
        let currency = params
            .currency
            .unwrap_or_else(|| "usd".to_string())
            .to_lowercase();

        // 5. Pending reservation, persisted before any gateway traffic.
        //    A racing request for the same dates fails right here.
        let reservation = Reservation {
            id: Uuid::new_v4(),
            listing_id: listing.id,
            guest_id: params.guest_id,
            check_in: params.check_in,
            check_out: params.check_out,
            guest_count: params.guest_count,
            nightly_rate: quote.nightly_rate,
            cleaning_fee: quote.cleaning_fee,
            service_fee: quote.service_fee,
            total: quote.total,
            currency: currency.clone(),
            status: "pending".to_string(),
            payment_status: "pending".to_string(),
            gateway_session_id: None,
            payment_intent_id: None,
            created_at: Utc::now(),
            paid_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        };
        self.store.insert_pending(&reservation).await?;

        // 6. Gateway session, tagged for reconciliation
        let session_params = CreateSessionParams {
            reservation_id: reservation.id,
            listing_id: listing.id,
            guest_id: params.guest_id,
            amount: quote.total,
            currency,
            description: format!("{} ({} nights)", listing.title, quote.nights),
            success_url: params
                .success_url
                .unwrap_or_else(|| self.config.checkout_success_url.clone()),
            cancel_url: params
                .cancel_url
                .unwrap_or_else(|| self.config.checkout_cancel_url.clone()),
        };

        let session = match self.gateway.create_checkout_session(&session_params).await {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    "Gateway session failed for reservation {}, row stays pending for the sweeper: {}",
                    reservation.id, e
                );
                return Err(e.into());
            }
        };

        self.store
            .set_gateway_session(reservation.id, &session.id)
            .await?;

        let redirect_url = session.url.ok_or_else(|| {
            BookingError::Gateway("gateway session carries no redirect URL".to_string())
        })?;

        info!(
            "✅ Checkout session {} created for reservation {} ({} {})",
            session.id, reservation.id, quote.total, reservation.currency
        );

        Ok(CheckoutSessionInfo {
            session_id: session.id,
            redirect_url,
            reservation_id: reservation.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Listing;
    use crate::gateway::MockGateway;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: String::new(),
            gateway_api_url: "https://gateway.invalid".to_string(),
            gateway_secret_key: "sk_test".to_string(),
            gateway_webhook_secret: "whsec_test".to_string(),
            webhook_tolerance_secs: 300,
            gateway_timeout_secs: 30,
            checkout_success_url: "http://localhost:3000/bookings/success".to_string(),
            checkout_cancel_url: "http://localhost:3000/bookings/cancelled".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            sweep_interval_secs: 60,
            pending_ttl_secs: 1800,
            notify_interval_secs: 5,
        }
    }

    fn seaside_cottage() -> Listing {
        Listing {
            id: 42,
            title: "Seaside cottage".to_string(),
            nightly_rate: 10_000,
            cleaning_fee: 3_000,
            service_fee: 0,
            max_guests: 4,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn setup() -> (Arc<MemoryStore>, Arc<MockGateway>, CheckoutService) {
        let store = Arc::new(MemoryStore::new());
        store.add_listing(seaside_cottage()).unwrap();
        let gateway = Arc::new(MockGateway::new());
        let service = CheckoutService::new(store.clone(), gateway.clone(), test_config());
        (store, gateway, service)
    }

    fn params() -> CheckoutParams {
        CheckoutParams {
            listing_id: 42,
            guest_id: 7,
            check_in: date(2024, 6, 1),
            check_out: date(2024, 6, 4),
            guest_count: 2,
            currency: None,
            success_url: None,
            cancel_url: None,
        }
    }

    #[tokio::test]
    async fn test_checkout_persists_pending_row_then_opens_session() {
        let (store, gateway, service) = setup();

        let info = service.create_checkout(params()).await.unwrap();
        assert!(info.redirect_url.starts_with("https://mock.gateway.test/pay/"));

        let stored = store
            .get_reservation(info.reservation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, "pending");
        assert_eq!(stored.payment_status, "pending");
        // 3 nights at $100 plus $30 cleaning
        assert_eq!(stored.total, 33_000);
        assert_eq!(stored.gateway_session_id.as_deref(), Some(info.session_id.as_str()));

        // session charge and correlation metadata match the snapshot
        let call = gateway.last_create_call().unwrap().unwrap();
        assert_eq!(call.amount, 33_000);
        assert_eq!(call.reservation_id, info.reservation_id);
        assert_eq!(call.listing_id, 42);
        assert_eq!(call.guest_id, 7);
    }

    #[tokio::test]
    async fn test_rejects_inverted_and_empty_ranges() {
        let (store, _, service) = setup();

        let mut inverted = params();
        inverted.check_in = date(2024, 6, 4);
        inverted.check_out = date(2024, 6, 1);
        assert!(matches!(
            service.create_checkout(inverted).await,
            Err(BookingError::Validation(_))
        ));

        let mut zero_nights = params();
        zero_nights.check_out = zero_nights.check_in;
        assert!(matches!(
            service.create_checkout(zero_nights).await,
            Err(BookingError::Validation(_))
        ));

        assert_eq!(store.reservation_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_listings_are_not_found() {
        let (store, _, service) = setup();

        let mut unknown = params();
        unknown.listing_id = 999;
        assert!(matches!(
            service.create_checkout(unknown).await,
            Err(BookingError::NotFound(_))
        ));

        let mut dark = seaside_cottage();
        dark.id = 43;
        dark.is_active = false;
        store.add_listing(dark).unwrap();

        let mut inactive = params();
        inactive.listing_id = 43;
        assert!(matches!(
            service.create_checkout(inactive).await,
            Err(BookingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_guest_count_bounds() {
        let (_, _, service) = setup();

        let mut none = params();
        none.guest_count = 0;
        assert!(matches!(
            service.create_checkout(none).await,
            Err(BookingError::Validation(_))
        ));

        let mut crowd = params();
        crowd.guest_count = 5; // listing sleeps 4
        assert!(matches!(
            service.create_checkout(crowd).await,
            Err(BookingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_overlapping_checkout_conflicts() {
        let (store, _, service) = setup();

        service.create_checkout(params()).await.unwrap();

        let mut overlap = params();
        overlap.check_in = date(2024, 6, 3);
        overlap.check_out = date(2024, 6, 8);
        assert!(matches!(
            service.create_checkout(overlap).await,
            Err(BookingError::Conflict(_))
        ));

        // back-to-back succeeds
        let mut next = params();
        next.check_in = date(2024, 6, 4);
        next.check_out = date(2024, 6, 7);
        service.create_checkout(next).await.unwrap();

        assert_eq!(store.reservation_count().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_single_winner() {
        let (store, _, service) = setup();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.create_checkout(params()).await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for outcome in futures::future::join_all(handles).await {
            match outcome.unwrap() {
                Ok(_) => wins += 1,
                Err(BookingError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(store.reservation_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_pending_row_for_sweeper() {
        let (store, gateway, service) = setup();
        gateway.prime_create_failure().unwrap();

        let err = service.create_checkout(params()).await.unwrap_err();
        assert!(matches!(err, BookingError::Gateway(_)));

        // the row exists, unlinked, waiting for the sweeper
        assert_eq!(store.reservation_count().await.unwrap(), 1);
        let stale = store
            .find_stale_pending(Utc::now() + chrono::Duration::seconds(1), 10)
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert!(stale[0].gateway_session_id.is_none());
    }
}
