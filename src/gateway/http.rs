//! Stripe-compatible REST gateway client.
//!
//! Talks to a hosted checkout provider over its form-encoded REST API:
//! `POST /v1/checkout/sessions` to open a session and
//! `GET /v1/checkout/sessions/{id}` to read it back. Authentication is
//! a bearer secret key. The base URL is configurable so staging and
//! test doubles can stand in for the real provider.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::config::AppConfig;
use crate::gateway::{CheckoutSession, CreateSessionParams, GatewayError, PaymentGateway};

/// HTTP client for the payment provider's REST API.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl HttpGateway {
    /// Builds the client with the configured request timeout.
    pub fn new(config: &AppConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.gateway_api_url.trim_end_matches('/').to_string(),
            secret_key: config.gateway_secret_key.clone(),
        })
    }

    async fn read_session(&self, response: reqwest::Response) -> Result<CheckoutSession, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Gateway returned {}: {}", status, body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

/// Flattens session inputs into the provider's bracketed form encoding.
fn session_form(params: &CreateSessionParams) -> Vec<(String, String)> {
    vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), params.success_url.clone()),
        ("cancel_url".to_string(), params.cancel_url.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        (
            "line_items[0][price_data][currency]".to_string(),
            params.currency.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            params.amount.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            params.description.clone(),
        ),
        (
            "metadata[reservationId]".to_string(),
            params.reservation_id.to_string(),
        ),
        (
            "metadata[listingId]".to_string(),
            params.listing_id.to_string(),
        ),
        ("metadata[guestId]".to_string(), params.guest_id.to_string()),
    ]
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_checkout_session(
        &self,
        params: &CreateSessionParams,
    ) -> Result<CheckoutSession, GatewayError> {
        debug!(
            "Creating gateway session for reservation {} ({} {})",
            params.reservation_id, params.amount, params.currency
        );

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_url))
            .bearer_auth(&self.secret_key)
            .form(&session_form(params))
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        self.read_session(response).await
    }

    async fn fetch_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        debug!("Fetching gateway session {}", session_id);

        let response = self
            .client
            .get(format!("{}/v1/checkout/sessions/{}", self.api_url, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        self.read_session(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_session_form_carries_charge_and_metadata() {
        let reservation_id = Uuid::new_v4();
        let params = CreateSessionParams {
            reservation_id,
            listing_id: 42,
            guest_id: 7,
            amount: 33_000,
            currency: "usd".to_string(),
            description: "Seaside cottage, 3 nights".to_string(),
            success_url: "http://localhost:3000/bookings/success".to_string(),
            cancel_url: "http://localhost:3000/bookings/cancelled".to_string(),
        };

        let form = session_form(&params);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(
            get("line_items[0][price_data][unit_amount]"),
            Some("33000")
        );
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(
            get("metadata[reservationId]"),
            Some(reservation_id.to_string().as_str())
        );
        assert_eq!(get("metadata[listingId]"), Some("42"));
        assert_eq!(get("metadata[guestId]"), Some("7"));
    }
}
