//! # API Request Handlers
//!
//! This module contains the handler functions for each API endpoint.
//! Each handler:
//! 1. Extracts request data
//! 2. Calls the appropriate service
//! 3. Maps the result onto an HTTP status and a formatted response
//!
//! ## Error Handling
//!
//! All errors are caught and returned as JSON:
//!
//! ```json
//! {
//!     "success": false,
//!     "error": {
//!         "code": "BOOKING_CONFLICT",
//!         "message": "Conflict: Listing is not available for the selected dates"
//!     }
//! }
//! ```
//!
//! A single mapping from `BookingError` to status code is shared by every
//! handler. The only per-endpoint variation is the conflict status: a
//! checkout that loses the dates answers 409, while a cancel that is no
//! longer allowed answers 400 (the client asked for something the
//! reservation's state forbids, not something another request raced it
//! to).

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{
    ApiResponse,
    CancelRequest,
    CheckoutRequest,
    CheckoutResponse,
    HealthResponse,
    ReservationResponse,
    WebhookAck,
};
use crate::services::{BookingError, CheckoutParams};
use crate::store::ReservationStore;
use crate::AppState;

/// Header carrying the gateway's webhook signature
/// (`t=<unix-seconds>,v1=<hex digest>`).
pub const SIGNATURE_HEADER: &str = "Gateway-Signature";

// ==========================================
// ERROR MAPPING
// ==========================================

/// Stable error code for each `BookingError` variant.
///
/// Clients branch on these; the human-readable detail rides in the
/// message field.
fn error_code(error: &BookingError) -> &'static str {
    match error {
        BookingError::Validation(_) => "VALIDATION_FAILED",
        BookingError::NotFound(_) => "NOT_FOUND",
        BookingError::Conflict(_) => "BOOKING_CONFLICT",
        BookingError::InvalidTransition { .. } => "INVALID_STATE",
        BookingError::Authenticity(_) => "INVALID_SIGNATURE",
        BookingError::Gateway(_) => "GATEWAY_ERROR",
        BookingError::Persistence(_) => "STORAGE_ERROR",
    }
}

/// HTTP status for each `BookingError` variant.
///
/// `conflict_status` is what Conflict/InvalidTransition map to; see the
/// module docs for why checkout and cancel disagree on it.
fn error_status(error: &BookingError, conflict_status: StatusCode) -> StatusCode {
    match error {
        BookingError::Validation(_) => StatusCode::BAD_REQUEST,
        BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        BookingError::Conflict(_) => conflict_status,
        BookingError::InvalidTransition { .. } => conflict_status,
        BookingError::Authenticity(_) => StatusCode::BAD_REQUEST,
        BookingError::Gateway(_) => StatusCode::BAD_GATEWAY,
        BookingError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the error response for a failed service call.
fn error_response(error: &BookingError, conflict_status: StatusCode) -> HttpResponse {
    HttpResponse::build(error_status(error, conflict_status))
        .json(ApiResponse::<()>::error(error_code(error), &error.to_string()))
}

// ==========================================
// HANDLERS
// ==========================================

/// API information endpoint (root).
///
/// Returns information about available API endpoints.
///
/// ## Endpoint
///
/// `GET /`
pub async fn api_info() -> HttpResponse {
    let info = json!({
        "name": "Booking API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Backend API for booking checkout and payment reconciliation",
        "endpoints": {
            "health": {
                "method": "GET",
                "path": "/health",
                "description": "Health check endpoint"
            },
            "checkout": {
                "method": "POST",
                "path": "/checkout",
                "description": "Price a stay, hold the dates, open a payment session"
            },
            "webhook": {
                "method": "POST",
                "path": "/payments/webhook",
                "description": "Signed payment gateway callbacks"
            },
            "reservations": {
                "get": {
                    "method": "GET",
                    "path": "/reservations/{id}",
                    "description": "Reservation snapshot"
                },
                "cancelPending": {
                    "method": "POST",
                    "path": "/reservations/{id}/cancel-pending",
                    "description": "Guest cancels before paying"
                },
                "cancel": {
                    "method": "POST",
                    "path": "/reservations/{id}/cancel",
                    "description": "Guest cancels a confirmed stay"
                }
            }
        }
    });

    HttpResponse::Ok().json(ApiResponse::success(info))
}

/// Health check endpoint.
///
/// ## Endpoint
///
/// `GET /health`
///
/// ## Example
///
/// ```bash
/// curl http://127.0.0.1:8080/health
/// ```
///
/// ## Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "status": "healthy",
///         "database": true,
///         "version": "0.1.0",
///         "timestamp": "2025-12-08T12:00:00Z"
///     }
/// }
/// ```
pub async fn health_check(state: web::Data<Arc<AppState>>) -> HttpResponse {
    // A cheap round-trip query doubles as the connectivity probe
    let db_healthy = state.store.reservation_count().await.is_ok();

    let response = HealthResponse {
        status: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
        database: db_healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    HttpResponse::build(status_code).json(ApiResponse::success(response))
}

/// Start a checkout for a stay.
///
/// Validates the dates and guest count, prices the stay from the
/// listing's current rates, stores a pending reservation that holds the
/// dates, and opens a hosted payment session. The client redirects the
/// guest to `redirectUrl`; confirmation arrives later via webhook.
///
/// ## Endpoint
///
/// `POST /checkout`
///
/// ## Example
///
/// ```bash
/// curl -X POST http://127.0.0.1:8080/checkout \
///   -H "Content-Type: application/json" \
///   -d '{
///     "listingId": 42,
///     "guestId": 7,
///     "checkIn": "2024-06-01",
///     "checkOut": "2024-06-04",
///     "guestCount": 2
///   }'
/// ```
///
/// ## Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "reservationId": "550e8400-e29b-41d4-a716-446655440000",
///         "sessionId": "cs_test_a1b2c3",
///         "redirectUrl": "https://checkout.gateway.com/pay/cs_test_a1b2c3"
///     }
/// }
/// ```
///
/// ## Errors
///
/// - `400 VALIDATION_FAILED` - bad dates or guest count
/// - `404 NOT_FOUND` - unknown or inactive listing
/// - `409 BOOKING_CONFLICT` - dates already taken
/// - `502 GATEWAY_ERROR` - payment gateway unreachable
pub async fn create_checkout(
    state: web::Data<Arc<AppState>>,
    body: web::Json<CheckoutRequest>,
) -> HttpResponse {
    info!(
        "Checkout request: listing {} for guest {}, {} to {}",
        body.listing_id, body.guest_id, body.check_in, body.check_out
    );

    let request = body.into_inner();
    let params = CheckoutParams {
        listing_id: request.listing_id,
        guest_id: request.guest_id,
        check_in: request.check_in,
        check_out: request.check_out,
        guest_count: request.guest_count,
        currency: request.currency,
        success_url: request.success_url,
        cancel_url: request.cancel_url,
    };

    match state.checkout.create_checkout(params).await {
        Ok(session) => HttpResponse::Created().json(ApiResponse::success(CheckoutResponse {
            reservation_id: session.reservation_id,
            session_id: session.session_id,
            redirect_url: session.redirect_url,
        })),
        Err(e) => {
            error!("Checkout failed: {}", e);
            error_response(&e, StatusCode::CONFLICT)
        }
    }
}

/// Payment gateway webhook endpoint.
///
/// Receives signed event deliveries from the gateway. The body is kept
/// as raw bytes because the signature covers them exactly as sent;
/// parsing happens only after verification. Any non-2xx answer makes
/// the gateway redeliver, which is how transient failures here heal.
///
/// ## Endpoint
///
/// `POST /payments/webhook`
///
/// ## Headers
///
/// - `Gateway-Signature: t=<unix-seconds>,v1=<hex digest>`
///
/// ## Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "received": "checkout.session.completed"
///     }
/// }
/// ```
pub async fn payment_webhook(
    state: web::Data<Arc<AppState>>,
    request: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let signature = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let signature = match signature {
        Some(header) => header,
        None => {
            warn!("🚨 Webhook delivery without a {} header", SIGNATURE_HEADER);
            return HttpResponse::BadRequest().json(ApiResponse::<()>::error(
                "MISSING_SIGNATURE",
                "Webhook signature header is required",
            ));
        }
    };

    match state.reconciler.reconcile(&body, signature).await {
        Ok(event_type) => HttpResponse::Ok().json(ApiResponse::success(WebhookAck {
            received: event_type,
        })),
        Err(e) => {
            error!("Webhook processing failed: {}", e);
            error_response(&e, StatusCode::CONFLICT)
        }
    }
}

/// Get a reservation snapshot.
///
/// ## Endpoint
///
/// `GET /reservations/{id}`
///
/// ## Example
///
/// ```bash
/// curl http://127.0.0.1:8080/reservations/550e8400-e29b-41d4-a716-446655440000
/// ```
///
/// ## Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "id": "550e8400-e29b-41d4-a716-446655440000",
///         "status": "confirmed",
///         "paymentStatus": "completed",
///         "total": 33000,
///         "formattedTotal": "330.00 USD"
///     }
/// }
/// ```
pub async fn get_reservation(
    state: web::Data<Arc<AppState>>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    let reservation_id = path.into_inner();

    match state.store.get_reservation(reservation_id).await {
        Ok(Some(reservation)) => HttpResponse::Ok().json(ApiResponse::success(
            ReservationResponse::from_reservation(&reservation),
        )),
        Ok(None) => HttpResponse::NotFound().json(ApiResponse::<()>::error(
            "NOT_FOUND",
            &format!("Reservation not found: {}", reservation_id),
        )),
        Err(e) => {
            error!("Reservation lookup failed: {}", e);
            error_response(&e, StatusCode::CONFLICT)
        }
    }
}

/// Guest cancels an unpaid checkout.
///
/// Only works while the reservation is still pending; the dates free up
/// immediately. If the payment already confirmed, the guest must use
/// the regular cancel endpoint instead.
///
/// ## Endpoint
///
/// `POST /reservations/{id}/cancel-pending`
///
/// ## Example
///
/// ```bash
/// curl -X POST http://127.0.0.1:8080/reservations/550e8400.../cancel-pending \
///   -H "Content-Type: application/json" \
///   -d '{"reason": "changed my mind"}'
/// ```
///
/// ## Errors
///
/// - `400 BOOKING_CONFLICT` - the stay has already started
/// - `400 INVALID_STATE` - reservation is not pending anymore
/// - `404 NOT_FOUND` - unknown reservation
pub async fn cancel_pending_reservation(
    state: web::Data<Arc<AppState>>,
    path: web::Path<Uuid>,
    body: Option<web::Json<CancelRequest>>,
) -> HttpResponse {
    let reservation_id = path.into_inner();
    let reason = cancel_reason(body);
    info!("Cancel-pending request for reservation {}", reservation_id);

    match state
        .lifecycle
        .guest_cancel_pending(reservation_id, &reason)
        .await
    {
        Ok(reservation) => HttpResponse::Ok().json(ApiResponse::success(
            ReservationResponse::from_reservation(&reservation),
        )),
        Err(e) => {
            error!("Cancel-pending failed for {}: {}", reservation_id, e);
            error_response(&e, StatusCode::BAD_REQUEST)
        }
    }
}

/// Guest cancels a confirmed stay.
///
/// The reservation is released and the dates free up. The captured
/// payment is deliberately left untouched; refunds are a back-office
/// decision, not an API side effect.
///
/// ## Endpoint
///
/// `POST /reservations/{id}/cancel`
///
/// ## Example
///
/// ```bash
/// curl -X POST http://127.0.0.1:8080/reservations/550e8400.../cancel \
///   -H "Content-Type: application/json" \
///   -d '{"reason": "trip cancelled"}'
/// ```
///
/// ## Errors
///
/// - `400 BOOKING_CONFLICT` - the stay has already started
/// - `400 INVALID_STATE` - reservation is not confirmed
/// - `404 NOT_FOUND` - unknown reservation
pub async fn cancel_reservation(
    state: web::Data<Arc<AppState>>,
    path: web::Path<Uuid>,
    body: Option<web::Json<CancelRequest>>,
) -> HttpResponse {
    let reservation_id = path.into_inner();
    let reason = cancel_reason(body);
    info!("Cancel request for reservation {}", reservation_id);

    match state
        .lifecycle
        .guest_cancel_confirmed(reservation_id, &reason)
        .await
    {
        Ok(reservation) => HttpResponse::Ok().json(ApiResponse::success(
            ReservationResponse::from_reservation(&reservation),
        )),
        Err(e) => {
            error!("Cancel failed for {}: {}", reservation_id, e);
            error_response(&e, StatusCode::BAD_REQUEST)
        }
    }
}

/// The recorded reason for a guest cancellation. The body is optional;
/// an absent or empty reason falls back to a generic one.
fn cancel_reason(body: Option<web::Json<CancelRequest>>) -> String {
    body.and_then(|request| request.into_inner().reason)
        .filter(|reason| !reason.trim().is_empty())
        .unwrap_or_else(|| "cancelled by guest".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use actix_web::{test, App};
    use chrono::NaiveDate;
    use serde_json::Value;

    use crate::api::configure_routes;
    use crate::config::AppConfig;
    use crate::db::models::Listing;
    use crate::gateway::mock::event_body;
    use crate::gateway::webhook::build_signature_header;
    use crate::gateway::{MockGateway, EVENT_CHECKOUT_COMPLETED, EVENT_CHECKOUT_EXPIRED};
    use crate::services::notifier::StoreQueue;
    use crate::services::{
        CheckoutService, CheckoutSessionInfo, ReservationLifecycle, WebhookReconciler,
    };
    use crate::store::memory::MemoryStore;
    use crate::store::ReservationStore;

    const SECRET: &str = "whsec_test";

    /// Builds the full service stack over an in-memory store, one seeded
    /// listing, and the mock gateway.
    fn test_state() -> (Arc<AppState>, MockGateway) {
        let store = MemoryStore::default();
        store
            .add_listing(Listing {
                id: 42,
                title: "Seaside cottage".to_string(),
                nightly_rate: 10_000,
                cleaning_fee: 3_000,
                service_fee: 0,
                max_guests: 4,
                is_active: true,
                created_at: Utc::now(),
            })
            .unwrap();

        let config = AppConfig {
            database_url: String::new(),
            gateway_api_url: "https://gateway.invalid".to_string(),
            gateway_secret_key: "sk_test".to_string(),
            gateway_webhook_secret: SECRET.to_string(),
            webhook_tolerance_secs: 300,
            gateway_timeout_secs: 30,
            checkout_success_url: "http://localhost:3000/bookings/success".to_string(),
            checkout_cancel_url: "http://localhost:3000/bookings/cancelled".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            sweep_interval_secs: 60,
            pending_ttl_secs: 1800,
            notify_interval_secs: 5,
        };

        let store: Arc<dyn ReservationStore> = Arc::new(store);
        let gateway = MockGateway::default();
        let gateway_arc: Arc<dyn crate::gateway::PaymentGateway> = Arc::new(gateway.clone());

        let notifications = Arc::new(StoreQueue::new(store.clone()));
        let lifecycle = ReservationLifecycle::new(store.clone(), notifications);
        let checkout = CheckoutService::new(store.clone(), gateway_arc.clone(), config.clone());
        let reconciler = WebhookReconciler::new(
            store.clone(),
            gateway_arc,
            lifecycle.clone(),
            config.clone(),
        );

        let state = Arc::new(AppState {
            config,
            store,
            checkout,
            lifecycle,
            reconciler,
        });
        (state, gateway)
    }

    /// A 3-night stay far enough out that the cancellation guard
    /// (check-in today or earlier) never trips.
    fn stay_range() -> (NaiveDate, NaiveDate) {
        let check_in = Utc::now().date_naive() + chrono::Duration::days(30);
        (check_in, check_in + chrono::Duration::days(3))
    }

    fn checkout_body() -> Value {
        let (check_in, check_out) = stay_range();
        json!({
            "listingId": 42,
            "guestId": 7,
            "checkIn": check_in.to_string(),
            "checkOut": check_out.to_string(),
            "guestCount": 2
        })
    }

    /// Seeds a pending reservation for the standard dates through the
    /// checkout service directly.
    async fn seed_checkout(state: &AppState) -> CheckoutSessionInfo {
        let (check_in, check_out) = stay_range();
        state
            .checkout
            .create_checkout(CheckoutParams {
                listing_id: 42,
                guest_id: 7,
                check_in,
                check_out,
                guest_count: 2,
                currency: None,
                success_url: None,
                cancel_url: None,
            })
            .await
            .unwrap()
    }

    #[actix_rt::test]
    async fn test_checkout_returns_created_session() {
        let (state, gateway) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/checkout")
            .set_json(checkout_body())
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["success"], Value::Bool(true));
        assert!(body["data"]["reservationId"].is_string());
        assert!(body["data"]["sessionId"].is_string());
        assert!(body["data"]["redirectUrl"]
            .as_str()
            .unwrap()
            .starts_with("https://"));
        assert_eq!(gateway.created_count().unwrap(), 1);
    }

    #[actix_rt::test]
    async fn test_checkout_rejects_inverted_dates() {
        let (state, _) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let mut body = checkout_body();
        body["checkIn"] = json!("2024-06-04");
        body["checkOut"] = json!("2024-06-01");

        let request = test::TestRequest::post()
            .uri("/checkout")
            .set_json(body)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["error"]["code"], json!("VALIDATION_FAILED"));
    }

    #[actix_rt::test]
    async fn test_checkout_unknown_listing_is_404() {
        let (state, _) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let mut body = checkout_body();
        body["listingId"] = json!(999);

        let request = test::TestRequest::post()
            .uri("/checkout")
            .set_json(body)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_checkout_taken_dates_are_409() {
        let (state, _) = test_state();
        seed_checkout(&state).await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        // Same dates again from another guest
        let mut body = checkout_body();
        body["guestId"] = json!(8);

        let request = test::TestRequest::post()
            .uri("/checkout")
            .set_json(body)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["error"]["code"], json!("BOOKING_CONFLICT"));
    }

    #[actix_rt::test]
    async fn test_webhook_without_signature_header_is_400() {
        let (state, _) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/payments/webhook")
            .set_payload("{}")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["error"]["code"], json!("MISSING_SIGNATURE"));
    }

    #[actix_rt::test]
    async fn test_webhook_bad_signature_is_400() {
        let (state, _) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let payload = b"{\"id\":\"evt_1\",\"type\":\"checkout.session.completed\"}".to_vec();
        let header = build_signature_header("whsec_wrong", Utc::now().timestamp(), &payload);

        let request = test::TestRequest::post()
            .uri("/payments/webhook")
            .insert_header((SIGNATURE_HEADER, header))
            .set_payload(payload)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["error"]["code"], json!("INVALID_SIGNATURE"));
    }

    #[actix_rt::test]
    async fn test_completed_webhook_confirms_reservation() {
        let (state, gateway) = test_state();
        let info = seed_checkout(&state).await;
        let session = gateway.complete_session(&info.session_id).unwrap().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let payload = event_body("evt_1", EVENT_CHECKOUT_COMPLETED, &session);
        let header = build_signature_header(SECRET, Utc::now().timestamp(), &payload);

        let request = test::TestRequest::post()
            .uri("/payments/webhook")
            .insert_header((SIGNATURE_HEADER, header))
            .set_payload(payload)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["data"]["received"], json!(EVENT_CHECKOUT_COMPLETED));

        // The snapshot now shows the confirmed, paid reservation
        let request = test::TestRequest::get()
            .uri(&format!("/reservations/{}", info.reservation_id))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["data"]["status"], json!("confirmed"));
        assert_eq!(body["data"]["paymentStatus"], json!("completed"));
        assert_eq!(body["data"]["total"], json!(33_000));
        assert_eq!(body["data"]["formattedTotal"], json!("330.00 USD"));
    }

    #[actix_rt::test]
    async fn test_expired_webhook_frees_the_dates() {
        let (state, gateway) = test_state();
        let info = seed_checkout(&state).await;
        let session = gateway.expire_session(&info.session_id).unwrap().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let payload = event_body("evt_1", EVENT_CHECKOUT_EXPIRED, &session);
        let header = build_signature_header(SECRET, Utc::now().timestamp(), &payload);

        let request = test::TestRequest::post()
            .uri("/payments/webhook")
            .insert_header((SIGNATURE_HEADER, header))
            .set_payload(payload)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        // A second checkout for the same dates now succeeds
        let request = test::TestRequest::post()
            .uri("/checkout")
            .set_json(checkout_body())
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[actix_rt::test]
    async fn test_get_unknown_reservation_is_404() {
        let (state, _) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let request = test::TestRequest::get()
            .uri(&format!("/reservations/{}", Uuid::new_v4()))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_cancel_pending_then_repeat_is_rejected() {
        let (state, _) = test_state();
        let info = seed_checkout(&state).await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let request = test::TestRequest::post()
            .uri(&format!("/reservations/{}/cancel-pending", info.reservation_id))
            .set_json(json!({"reason": "changed my mind"}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["data"]["status"], json!("cancelled"));
        assert_eq!(body["data"]["cancellationReason"], json!("changed my mind"));

        // Already cancelled; the guard answers 400
        let request = test::TestRequest::post()
            .uri(&format!("/reservations/{}/cancel-pending", info.reservation_id))
            .set_json(json!({}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["error"]["code"], json!("INVALID_STATE"));
    }

    #[actix_rt::test]
    async fn test_cancel_confirmed_keeps_payment_captured() {
        let (state, gateway) = test_state();
        let info = seed_checkout(&state).await;
        let session = gateway.complete_session(&info.session_id).unwrap().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let payload = event_body("evt_1", EVENT_CHECKOUT_COMPLETED, &session);
        let header = build_signature_header(SECRET, Utc::now().timestamp(), &payload);
        let request = test::TestRequest::post()
            .uri("/payments/webhook")
            .insert_header((SIGNATURE_HEADER, header))
            .set_payload(payload)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        // Cancel without a body; the generic reason is recorded
        let request = test::TestRequest::post()
            .uri(&format!("/reservations/{}/cancel", info.reservation_id))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["data"]["status"], json!("cancelled"));
        assert_eq!(body["data"]["paymentStatus"], json!("completed"));
        assert_eq!(body["data"]["cancellationReason"], json!("cancelled by guest"));
    }

    #[actix_rt::test]
    async fn test_health_endpoint_reports_healthy() {
        let (state, _) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let request = test::TestRequest::get().uri("/health").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["data"]["status"], json!("healthy"));
        assert_eq!(body["data"]["database"], Value::Bool(true));
    }

    // `use actix_web::test` above shadows the built-in `#[test]` in the
    // macro namespace, so the built-in attribute is named explicitly.
    #[::core::prelude::v1::test]
    fn test_error_status_mapping() {
        let conflict = BookingError::Conflict("dates taken".to_string());
        assert_eq!(
            error_status(&conflict, StatusCode::CONFLICT),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_status(&conflict, StatusCode::BAD_REQUEST),
            StatusCode::BAD_REQUEST
        );

        let gateway = BookingError::Gateway("timeout".to_string());
        assert_eq!(
            error_status(&gateway, StatusCode::CONFLICT),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(error_code(&gateway), "GATEWAY_ERROR");

        let validation = BookingError::Validation("bad dates".to_string());
        assert_eq!(
            error_status(&validation, StatusCode::CONFLICT),
            StatusCode::BAD_REQUEST
        );
    }

    #[::core::prelude::v1::test]
    fn test_cancel_reason_fallbacks() {
        assert_eq!(cancel_reason(None), "cancelled by guest");

        let blank = CancelRequest {
            reason: Some("   ".to_string()),
        };
        assert_eq!(cancel_reason(Some(web::Json(blank))), "cancelled by guest");

        let given = CancelRequest {
            reason: Some("plans changed".to_string()),
        };
        assert_eq!(cancel_reason(Some(web::Json(given))), "plans changed");
    }
}
