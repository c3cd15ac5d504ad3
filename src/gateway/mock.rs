//! Always-reachable in-process gateway.
//!
//! Sessions live in a mutex-guarded map. Tests drive the full checkout
//! and reconciliation flow by creating a session, flipping it to
//! complete or expired with the helpers below, and feeding the matching
//! event body through the webhook path. Failure priming makes the
//! gateway-down cases reproducible.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::gateway::{
    CheckoutSession, CreateSessionParams, GatewayError, PaymentGateway, SessionMetadata,
};

#[derive(Default)]
struct MockState {
    sessions: HashMap<String, CheckoutSession>,
    create_calls: Vec<CreateSessionParams>,
    fail_next_create: bool,
    counter: u64,
}

/// In-memory stand-in for the hosted payment provider.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, GatewayError> {
        self.state
            .lock()
            .map_err(|_| GatewayError::Http("mock gateway lock poisoned".to_string()))
    }

    /// Makes the next `create_checkout_session` call fail with a
    /// transport error. One-shot.
    pub fn prime_create_failure(&self) -> Result<(), GatewayError> {
        self.lock()?.fail_next_create = true;
        Ok(())
    }

    /// Number of sessions created so far.
    pub fn created_count(&self) -> Result<usize, GatewayError> {
        Ok(self.lock()?.create_calls.len())
    }

    /// The parameters of the most recent create call.
    pub fn last_create_call(&self) -> Result<Option<CreateSessionParams>, GatewayError> {
        Ok(self.lock()?.create_calls.last().cloned())
    }

    /// Marks a session paid, assigning it a payment intent. Returns the
    /// updated session, or None for an unknown id.
    pub fn complete_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSession>, GatewayError> {
        let mut state = self.lock()?;
        let counter = state.counter;
        Ok(state.sessions.get_mut(session_id).map(|session| {
            session.status = Some("complete".to_string());
            session.payment_status = Some("paid".to_string());
            if session.payment_intent_id.is_none() {
                session.payment_intent_id = Some(format!("pi_mock_{}", counter));
            }
            session.clone()
        }))
    }

    /// Marks a session expired without payment.
    pub fn expire_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSession>, GatewayError> {
        let mut state = self.lock()?;
        Ok(state.sessions.get_mut(session_id).map(|session| {
            session.status = Some("expired".to_string());
            session.payment_status = Some("unpaid".to_string());
            session.clone()
        }))
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        params: &CreateSessionParams,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut state = self.lock()?;

        if state.fail_next_create {
            state.fail_next_create = false;
            return Err(GatewayError::Http("mock gateway: primed create failure".to_string()));
        }

        state.counter += 1;
        let id = format!("cs_mock_{}", state.counter);
        let session = CheckoutSession {
            id: id.clone(),
            url: Some(format!("https://mock.gateway.test/pay/{}", id)),
            status: Some("open".to_string()),
            payment_status: Some("unpaid".to_string()),
            payment_intent_id: None,
            metadata: SessionMetadata {
                reservation_id: Some(params.reservation_id.to_string()),
                listing_id: Some(params.listing_id.to_string()),
                guest_id: Some(params.guest_id.to_string()),
            },
        };

        debug!("Mock gateway created session {} for reservation {}", id, params.reservation_id);
        state.create_calls.push(params.clone());
        state.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn fetch_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        let state = self.lock()?;
        state
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| GatewayError::Api {
                status: 404,
                body: format!("no such session: {}", session_id),
            })
    }
}

/// Builds the JSON body the provider would deliver for a session event.
/// Pair with [`crate::gateway::webhook::build_signature_header`] to
/// exercise the webhook endpoint end to end.
pub fn event_body(event_id: &str, event_type: &str, session: &CheckoutSession) -> Vec<u8> {
    serde_json::json!({
        "id": event_id,
        "type": event_type,
        "data": { "object": session }
    })
    .to_string()
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn params() -> CreateSessionParams {
        CreateSessionParams {
            reservation_id: Uuid::new_v4(),
            listing_id: 42,
            guest_id: 7,
            amount: 33_000,
            currency: "usd".to_string(),
            description: "Seaside cottage, 3 nights".to_string(),
            success_url: "http://localhost:3000/success".to_string(),
            cancel_url: "http://localhost:3000/cancel".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_then_fetch_roundtrip() {
        let gateway = MockGateway::new();
        let created = gateway.create_checkout_session(&params()).await.unwrap();
        assert!(created.id.starts_with("cs_mock_"));
        assert_eq!(created.status.as_deref(), Some("open"));
        assert!(!created.is_paid());

        let fetched = gateway.fetch_checkout_session(&created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(gateway.created_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_complete_assigns_payment_intent() {
        let gateway = MockGateway::new();
        let created = gateway.create_checkout_session(&params()).await.unwrap();

        let completed = gateway.complete_session(&created.id).unwrap().unwrap();
        assert!(completed.is_paid());
        assert!(completed.payment_intent_id.is_some());

        let fetched = gateway.fetch_checkout_session(&created.id).await.unwrap();
        assert_eq!(fetched.payment_intent_id, completed.payment_intent_id);
    }

    #[tokio::test]
    async fn test_primed_failure_is_one_shot() {
        let gateway = MockGateway::new();
        gateway.prime_create_failure().unwrap();

        let err = gateway.create_checkout_session(&params()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Http(_)));

        // next call succeeds again
        gateway.create_checkout_session(&params()).await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_unknown_session() {
        let gateway = MockGateway::new();
        let err = gateway.fetch_checkout_session("cs_missing").await.unwrap_err();
        assert!(matches!(err, GatewayError::Api { status: 404, .. }));
    }
}
