//! # API Route Configuration
//!
//! This module sets up all the HTTP routes for the API.

use actix_web::web;

use super::handlers;

/// Configure all API routes.
///
/// This function is called from main.rs to set up
/// all the endpoint routes.
///
/// ## Route Structure
///
/// ```text
/// /
/// ├── /health                  GET - Health check
/// ├── /checkout                POST - Start checkout for a stay
/// ├── /payments
/// │   └── /webhook             POST - Gateway callback (signed)
/// └── /reservations
///     ├── /:id                 GET - Reservation snapshot
///     ├── /:id/cancel-pending  POST - Guest cancels before paying
///     └── /:id/cancel          POST - Guest cancels a confirmed stay
/// ```
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint - API information
        .route("/", web::get().to(handlers::api_info))

        // Health check endpoint
        .route("/health", web::get().to(handlers::health_check))

        // Start a checkout: price the stay, hold the dates, open a
        // gateway session
        .route("/checkout", web::post().to(handlers::create_checkout))

        // Payment gateway callbacks
        .service(
            web::scope("/payments")
                // Signed webhook deliveries from the gateway
                .route("/webhook", web::post().to(handlers::payment_webhook))
        )

        // Reservation endpoints
        .service(
            web::scope("/reservations")
                // Reservation snapshot
                .route("/{id}", web::get().to(handlers::get_reservation))

                // Guest abandons an unpaid checkout
                .route(
                    "/{id}/cancel-pending",
                    web::post().to(handlers::cancel_pending_reservation),
                )

                // Guest cancels a confirmed stay (payment stays captured)
                .route("/{id}/cancel", web::post().to(handlers::cancel_reservation)),
        );
}
