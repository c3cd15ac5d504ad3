//! # Webhook Reconciler
//!
//! Applies the payment gateway's callbacks to reservation state. The
//! gateway delivers at-least-once and unordered, so everything here is
//! written to survive duplicates and replays.
//!
//! ## Flow
//!
//! ```text
//! 1. Verify the signature over the raw bytes    -> 400 on failure
//! 2. Parse the event envelope
//! 3. Record the event (audit + replay check)    -> ack if already done
//! 4. Dispatch by type:
//!      checkout.session.completed  -> confirm via lifecycle
//!      checkout.session.expired    -> cancel-if-still-pending
//!      anything else               -> acknowledged no-op
//! 5. Mark the audit row; failures return non-2xx so the gateway
//!    redelivers
//! ```
//!
//! For a completed payment the session is re-fetched from the gateway
//! and the payment intent is taken from that fetch, not from the event
//! body. The event only says "go look"; the gateway's current answer is
//! the source of truth.
//!
//! A processing failure after step 1 must surface as an error response.
//! Redelivery is the durability mechanism: the audit row is only
//! marked processed once the state flip and the notification enqueue
//! have both happened, so a crash in between is retried by the gateway
//! and resolved by the state check.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::WebhookEventRecord;
use crate::gateway::webhook::{self, WebhookEvent};
use crate::gateway::{PaymentGateway, EVENT_CHECKOUT_COMPLETED, EVENT_CHECKOUT_EXPIRED};
use crate::services::lifecycle::ReservationLifecycle;
use crate::services::BookingError;
use crate::store::ReservationStore;

/// Verifies, records and applies gateway webhook deliveries.
///
/// ## Usage
///
/// ```rust,ignore
/// let reconciler = WebhookReconciler::new(store, gateway, lifecycle, config);
/// let event_type = reconciler.reconcile(&body, signature_header).await?;
/// ```
#[derive(Clone)]
pub struct WebhookReconciler {
    store: Arc<dyn ReservationStore>,
    gateway: Arc<dyn PaymentGateway>,
    lifecycle: ReservationLifecycle,
    config: AppConfig,
}

impl WebhookReconciler {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        gateway: Arc<dyn PaymentGateway>,
        lifecycle: ReservationLifecycle,
        config: AppConfig,
    ) -> Self {
        Self { store, gateway, lifecycle, config }
    }

    /// Processes one delivery. Returns the event type for the
    /// acknowledgement body.
    pub async fn reconcile(
        &self,
        body: &[u8],
        signature_header: &str,
    ) -> Result<String, BookingError> {
        // 1. Authenticate the raw bytes before reading anything else
        webhook::verify_signature(
            &self.config.gateway_webhook_secret,
            signature_header,
            body,
            self.config.webhook_tolerance_secs,
        )
        .map_err(|e| {
            warn!("🚨 Webhook signature rejected: {}", e);
            BookingError::from(e)
        })?;

        // 2. Parse envelope and keep the raw payload for the audit row
        let payload: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| BookingError::Gateway(format!("webhook payload: {}", e)))?;
        let event = webhook::parse_event(body)?;

        // 3. Audit row doubles as replay suppression. An unprocessed
        //    existing row means an earlier attempt died mid-flight, so
        //    the event runs again.
        let record = WebhookEventRecord {
            id: Uuid::new_v4(),
            gateway_event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            payload,
            processed: false,
            processing_error: None,
            created_at: Utc::now(),
        };
        let fresh = self.store.record_webhook_event(&record).await?;
        if !fresh {
            if let Some(existing) = self.store.get_webhook_event(&event.id).await? {
                if existing.processed {
                    info!("Webhook event {} already processed, acknowledging replay", event.id);
                    return Ok(event.event_type);
                }
            }
            warn!("Reprocessing webhook event {} after earlier failure", event.id);
        }

        // 4. Dispatch
        let result = match event.event_type.as_str() {
            EVENT_CHECKOUT_COMPLETED => self.handle_completed(&event).await,
            EVENT_CHECKOUT_EXPIRED => self.handle_expired(&event).await,
            other => {
                info!("Acknowledging unrelated webhook event type: {}", other);
                Ok(())
            }
        };

        // 5. Record the outcome; an error response triggers redelivery
        match result {
            Ok(()) => {
                self.store.mark_webhook_event(&event.id, true, None).await?;
                Ok(event.event_type)
            }
            Err(e) => {
                self.store
                    .mark_webhook_event(&event.id, false, Some(&e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }

    /// checkout.session.completed: confirm the reservation with the
    /// canonical payment intent.
    async fn handle_completed(&self, event: &WebhookEvent) -> Result<(), BookingError> {
        let claimed = event.session()?;
        let reservation_id = self.resolve_reservation_id(event, &claimed).await?;

        // Re-query the gateway; the event body is a hint, not evidence
        let session = self.gateway.fetch_checkout_session(&claimed.id).await?;
        if !session.is_paid() {
            warn!(
                "Completed event {} but session {} is not paid per gateway, leaving for retry",
                event.id, claimed.id
            );
            return Err(BookingError::Gateway(format!(
                "session {} not paid at gateway",
                claimed.id
            )));
        }
        let payment_intent_id = session.payment_intent_id.ok_or_else(|| {
            BookingError::Gateway(format!("session {} carries no payment intent", claimed.id))
        })?;

        self.lifecycle
            .confirm_payment(reservation_id, &payment_intent_id)
            .await?;
        Ok(())
    }

    /// checkout.session.expired: reclaim the dates if payment never
    /// arrived.
    async fn handle_expired(&self, event: &WebhookEvent) -> Result<(), BookingError> {
        let claimed = event.session()?;
        let reservation_id = self.resolve_reservation_id(event, &claimed).await?;

        self.lifecycle
            .cancel_if_still_pending(reservation_id, "payment session expired")
            .await?;
        Ok(())
    }

    /// Correlation: the session metadata carries the reservation id.
    /// If a misconfigured gateway drops the metadata, the persisted
    /// session link is the fallback.
    async fn resolve_reservation_id(
        &self,
        event: &WebhookEvent,
        session: &crate::gateway::CheckoutSession,
    ) -> Result<Uuid, BookingError> {
        if let Some(id) = session.reservation_id() {
            return Ok(id);
        }

        warn!(
            "Webhook event {} carries no reservation metadata, resolving via session {}",
            event.id, session.id
        );
        let reservation = self
            .store
            .get_by_session(&session.id)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!(
                    "no reservation linked to gateway session {}",
                    session.id
                ))
            })?;
        Ok(reservation.id)
    }
}
