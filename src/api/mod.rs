//! # REST API Module
//!
//! This module defines all HTTP endpoints for the booking backend.
//!
//! ## Endpoint Overview
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/checkout` | Start checkout for a stay |
//! | POST | `/payments/webhook` | Gateway callback (signed) |
//! | GET | `/reservations/:id` | Reservation snapshot |
//! | POST | `/reservations/:id/cancel-pending` | Guest cancels before paying |
//! | POST | `/reservations/:id/cancel` | Guest cancels a confirmed stay |
//! | GET | `/health` | Health check |
//!
//! ## Request/Response Format
//!
//! All requests and responses use JSON:
//!
//! ```json
//! // Success response
//! {
//!     "success": true,
//!     "data": { ... }
//! }
//!
//! // Error response
//! {
//!     "success": false,
//!     "error": {
//!         "code": "ERROR_CODE",
//!         "message": "Human readable message"
//!     }
//! }
//! ```
//!
//! The webhook endpoint is the exception on the request side: its body
//! is the gateway's raw payload, authenticated by the signature header
//! rather than parsed into a typed request first.

pub mod routes;
pub mod handlers;

pub use routes::configure_routes;
