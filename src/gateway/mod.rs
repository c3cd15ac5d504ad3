//! Payment gateway boundary.
//!
//! Everything that talks to (or pretends to be) the hosted payment
//! provider lives behind the [`PaymentGateway`] trait. The booking
//! services never see an HTTP client or a wire payload, only
//! [`CheckoutSession`] values.
//!
//! | Implementation | File | Used by |
//! |----------------|-----------|---------|
//! | `HttpGateway`  | `http.rs` | production, Stripe-compatible REST |
//! | `MockGateway`  | `mock.rs` | tests and local development |
//!
//! `webhook.rs` holds the signature scheme and event parsing for the
//! provider's callback channel. It is deliberately separate from the
//! trait: webhooks arrive on our HTTP surface, not through the client.
//!
//! ## Correlation
//!
//! Every session is created with `reservationId`, `listingId` and
//! `guestId` metadata. When an event arrives, the metadata (not the
//! session id) is the primary key back into our own tables, so a
//! reservation can be resolved even if the session id was never
//! persisted on our side.

pub mod http;
pub mod mock;
pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use http::HttpGateway;
pub use mock::MockGateway;

// ============================================================================
// EVENT TYPES
// ============================================================================

/// The guest finished the hosted payment page and the payment succeeded.
pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// The session reached its expiry deadline without a completed payment.
pub const EVENT_CHECKOUT_EXPIRED: &str = "checkout.session.expired";

// ============================================================================
// ERRORS
// ============================================================================

/// Errors produced at the gateway boundary.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport-level failure: DNS, timeout, connection reset.
    #[error("Gateway request failed: {0}")]
    Http(String),

    /// The gateway answered with a non-2xx status.
    #[error("Gateway returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The gateway answered 2xx but the payload did not parse.
    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),

    /// A webhook payload failed signature verification.
    #[error("Webhook signature rejected: {0}")]
    Signature(String),
}

// ============================================================================
// SESSION TYPES
// ============================================================================

/// Correlation metadata attached to every checkout session we create
/// and echoed back by the gateway on fetches and webhook events.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    #[serde(default)]
    pub reservation_id: Option<String>,
    #[serde(default)]
    pub listing_id: Option<String>,
    #[serde(default)]
    pub guest_id: Option<String>,
}

/// Inputs for creating a hosted checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSessionParams {
    pub reservation_id: Uuid,
    pub listing_id: i64,
    pub guest_id: i64,
    /// Total charge in minor units (cents).
    pub amount: i64,
    /// Lowercase ISO currency code, e.g. `"usd"`.
    pub currency: String,
    /// Line-item description shown on the hosted page.
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A checkout session as the gateway reports it.
///
/// Statuses are carried as the gateway's own strings: `status` is one
/// of `open`, `complete` or `expired`, and `payment_status` is `paid`,
/// `unpaid` or `no_payment_required`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page URL. Present while the session is open.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    /// The payment intent behind this session, once one exists. This is
    /// the canonical value to persist; webhook payloads may omit it.
    #[serde(default, rename = "payment_intent")]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

impl CheckoutSession {
    /// True when the gateway has collected the funds for this session.
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    /// The reservation this session was created for, parsed out of the
    /// correlation metadata.
    pub fn reservation_id(&self) -> Option<Uuid> {
        self.metadata
            .reservation_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

// ============================================================================
// GATEWAY TRAIT
// ============================================================================

/// Client-side operations against the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a hosted checkout session for the given charge.
    async fn create_checkout_session(
        &self,
        params: &CreateSessionParams,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Fetches the current state of a session by id. Used during
    /// webhook reconciliation to read the canonical payment intent
    /// instead of trusting the event payload.
    async fn fetch_checkout_session(&self, session_id: &str)
        -> Result<CheckoutSession, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_paid_helper() {
        let mut session = CheckoutSession {
            id: "cs_1".to_string(),
            url: None,
            status: Some("complete".to_string()),
            payment_status: Some("paid".to_string()),
            payment_intent_id: Some("pi_1".to_string()),
            metadata: SessionMetadata::default(),
        };
        assert!(session.is_paid());

        session.payment_status = Some("unpaid".to_string());
        assert!(!session.is_paid());

        session.payment_status = None;
        assert!(!session.is_paid());
    }

    #[test]
    fn test_reservation_id_parses_metadata() {
        let id = Uuid::new_v4();
        let session = CheckoutSession {
            id: "cs_1".to_string(),
            url: None,
            status: None,
            payment_status: None,
            payment_intent_id: None,
            metadata: SessionMetadata {
                reservation_id: Some(id.to_string()),
                listing_id: Some("42".to_string()),
                guest_id: Some("7".to_string()),
            },
        };
        assert_eq!(session.reservation_id(), Some(id));

        let garbled = CheckoutSession {
            metadata: SessionMetadata {
                reservation_id: Some("not-a-uuid".to_string()),
                ..Default::default()
            },
            ..session
        };
        assert_eq!(garbled.reservation_id(), None);
    }

    #[test]
    fn test_session_deserializes_gateway_payload() {
        let raw = serde_json::json!({
            "id": "cs_test_123",
            "url": "https://pay.example.com/cs_test_123",
            "status": "open",
            "payment_status": "unpaid",
            "payment_intent": null,
            "metadata": {
                "reservationId": "0c5b2b8e-60f0-4bb6-a14e-64cbf0bd72b1",
                "listingId": "42",
                "guestId": "7"
            }
        });
        let session: CheckoutSession = serde_json::from_value(raw).unwrap();
        assert_eq!(session.id, "cs_test_123");
        assert_eq!(session.metadata.listing_id.as_deref(), Some("42"));
        assert!(!session.is_paid());
    }
}
