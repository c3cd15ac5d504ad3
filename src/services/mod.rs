//! # Services Module
//!
//! This module contains the core business logic services for the
//! booking backend. Each service handles a specific domain.
//!
//! ## Services Overview
//!
//! | Service | Responsibility |
//! |---------|---------------|
//! | `CheckoutService` | Validates a stay, snapshots the price, opens the gateway session |
//! | `ReservationLifecycle` | State machine, transition guards, atomic application |
//! | `WebhookReconciler` | Verifies and applies gateway callbacks |
//! | `AbandonmentSweeper` | Cancels pending reservations whose session expired |
//! | `NotificationDispatcher` | Delivers queued confirmation/cancellation jobs |
//!
//! ## Service Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SERVICES LAYER                            │
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │                    CheckoutService                        │   │
//! │  │  • validate dates/guests  • price snapshot                │   │
//! │  │  • insert pending row     • open gateway session          │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! │                              │                                   │
//! │         ┌────────────────────┼────────────────────┐             │
//! │         ▼                    ▼                    ▼             │
//! │  ┌────────────┐      ┌────────────┐       ┌────────────┐       │
//! │  │Reservation │      │  Webhook   │       │Abandonment │       │
//! │  │ Lifecycle  │      │ Reconciler │       │  Sweeper   │       │
//! │  │            │      │            │       │            │       │
//! │  │ Guards     │      │ Verify sig │       │ Expire TTL │       │
//! │  │ CAS apply  │      │ Idempotent │       │ Idempotent │       │
//! │  └────────────┘      └────────────┘       └────────────┘       │
//! │                              │                                   │
//! │                              ▼                                   │
//! │                      ┌──────────────┐                           │
//! │                      │ Notification │                           │
//! │                      │  Dispatcher  │                           │
//! │                      └──────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod availability;
pub mod checkout;
pub mod lifecycle;
pub mod notifier;
pub mod pricing;
pub mod reconciler;
pub mod sweeper;

pub use checkout::{CheckoutParams, CheckoutService, CheckoutSessionInfo};
pub use lifecycle::ReservationLifecycle;
pub use notifier::{NotificationDispatcher, NotificationQueue};
pub use reconciler::WebhookReconciler;
pub use sweeper::AbandonmentSweeper;

/// Errors that can occur in booking operations.
///
/// Every service reports through this taxonomy so callers can tell
/// expected outcomes (validation, not found, conflict) apart from
/// infrastructure failures (gateway, persistence) without inspecting
/// message strings. The API layer maps each variant to a status code;
/// the webhook handler additionally uses the split to decide what the
/// gateway should retry.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// Malformed input: bad date ordering, missing fields, guest count
    /// out of range.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Unknown listing or reservation.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Date overlap with an existing reservation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A state transition the lifecycle table does not allow.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Webhook signature verification failed. Logged as a potential
    /// attack signal and never retried.
    #[error("Webhook authenticity check failed: {0}")]
    Authenticity(String),

    /// The external payment provider failed or answered nonsense.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Storage layer failure.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<crate::gateway::GatewayError> for BookingError {
    fn from(e: crate::gateway::GatewayError) -> Self {
        match e {
            crate::gateway::GatewayError::Signature(msg) => BookingError::Authenticity(msg),
            other => BookingError::Gateway(other.to_string()),
        }
    }
}
