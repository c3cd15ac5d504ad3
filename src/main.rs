//! # Booking Backend Service
//!
//! This is the main entry point for the backend service that keeps
//! reservations and payments consistent. It provides:
//!
//! - REST API for checkout, reservation lookup and cancellation
//! - Signed webhook endpoint reconciling gateway payment outcomes
//! - Background workers for abandoned checkouts and notifications
//! - Database storage with the double-booking guarantee in the schema
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        BACKEND SERVICE                           │
//! │                                                                  │
//! │  ┌─────────────────────┐  ┌───────────────────────────────────┐ │
//! │  │      REST API       │  │       Background Workers          │ │
//! │  │      (Actix)        │  │  • Abandonment Sweeper            │ │
//! │  │                     │  │  • Notification Dispatcher        │ │
//! │  │  /checkout          │  │                                   │ │
//! │  │  /payments/webhook  │  │                                   │ │
//! │  │  /reservations/:id  │  │                                   │ │
//! │  └─────────────────────┘  └───────────────────────────────────┘ │
//! │            │                              │                      │
//! │            └──────────────┬───────────────┘                      │
//! │                           │                                      │
//! │  ┌────────────────────────┴──────────────────────────────────┐  │
//! │  │                     SERVICE LAYER                          │  │
//! │  │  ┌───────────────┐ ┌─────────────────────┐ ┌────────────┐ │  │
//! │  │  │CheckoutService│ │ReservationLifecycle │ │Reconciler  │ │  │
//! │  │  └───────────────┘ └─────────────────────┘ └────────────┘ │  │
//! │  └────────────────────────┬──────────────────────────────────┘  │
//! │                           │                                      │
//! │          ┌────────────────┴────────────────┐                    │
//! │          │                                 │                     │
//! │   ┌──────┴──────┐                   ┌──────┴──────┐             │
//! │   │  PostgreSQL │                   │   Payment   │             │
//! │   │  Database   │                   │   Gateway   │             │
//! │   └─────────────┘                   └─────────────┘             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! 1. Set up PostgreSQL and create the database
//! 2. Copy `.env.example` to `.env` and configure
//! 3. Start the server: `cargo run` (migrations run automatically)
//!
//! ## Environment Variables
//!
//! See `.env.example` for all required configuration.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod api;
mod config;
mod db;
mod gateway;
mod models;
mod services;
mod store;
mod utils;

use config::AppConfig;
use db::Database;
use gateway::{HttpGateway, PaymentGateway};
use services::notifier::StoreQueue;
use services::{
    AbandonmentSweeper, CheckoutService, NotificationDispatcher, ReservationLifecycle,
    WebhookReconciler,
};
use store::{PostgresStore, ReservationStore};

/// Application state shared across all handlers.
///
/// This struct contains all the shared resources that API handlers
/// and background workers need access to.
///
/// ## Why Arc?
/// `Arc` (Atomic Reference Counting) allows us to share ownership
/// of these resources across multiple threads safely.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Reservation storage (PostgreSQL in production)
    pub store: Arc<dyn ReservationStore>,

    /// Checkout orchestration service
    pub checkout: CheckoutService,

    /// Reservation state machine (confirm / cancel transitions)
    pub lifecycle: ReservationLifecycle,

    /// Webhook verification and reconciliation
    pub reconciler: WebhookReconciler,
}

/// Main entry point for the backend service.
///
/// This function:
/// 1. Loads configuration from environment
/// 2. Initializes database connection and runs migrations
/// 3. Sets up the payment gateway client
/// 4. Starts background workers
/// 5. Launches the HTTP server
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // =========================================
    // STEP 1: Initialize Logging
    // =========================================
    // Set up structured logging with tracing.
    // RUST_LOG overrides the default level.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("🚀 Starting Booking Backend Service");

    // =========================================
    // STEP 2: Load Configuration
    // =========================================
    // Load from environment variables (from .env file)
    dotenvy::dotenv().ok(); // It's okay if .env doesn't exist

    let config = AppConfig::from_env().expect("Failed to load configuration");

    info!("📋 Configuration loaded");
    info!("   Gateway API: {}", config.gateway_api_url);
    info!("   Pending TTL: {}s", config.pending_ttl_secs);

    // =========================================
    // STEP 3: Initialize Database
    // =========================================
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    info!("🗄️  Database connected");

    // Run migrations to ensure schema is up to date
    db.run_migrations().await.expect("Failed to run migrations");

    info!("📦 Database migrations complete");

    // =========================================
    // STEP 4: Initialize Payment Gateway
    // =========================================
    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(HttpGateway::new(&config).expect("Failed to create gateway client"));

    info!("💳 Payment gateway client initialized");

    // =========================================
    // STEP 5: Initialize Services
    // =========================================
    let store: Arc<dyn ReservationStore> = Arc::new(PostgresStore::new(db.clone()));
    let notifications = Arc::new(StoreQueue::new(store.clone()));

    let lifecycle = ReservationLifecycle::new(store.clone(), notifications);
    let checkout = CheckoutService::new(store.clone(), gateway.clone(), config.clone());
    let reconciler = WebhookReconciler::new(
        store.clone(),
        gateway.clone(),
        lifecycle.clone(),
        config.clone(),
    );

    info!("🔧 Services initialized");

    // =========================================
    // STEP 6: Create Application State
    // =========================================
    let app_state = Arc::new(AppState {
        config: config.clone(),
        store: store.clone(),
        checkout,
        lifecycle: lifecycle.clone(),
        reconciler,
    });

    // =========================================
    // STEP 7: Start Background Workers
    // =========================================
    // The sweeper is the pull side of abandonment handling: expired
    // webhooks push, the sweeper catches whatever they miss.
    let sweeper = AbandonmentSweeper::new(
        store.clone(),
        lifecycle.clone(),
        config.sweep_interval_secs,
        config.pending_ttl_secs,
    );
    tokio::spawn(async move {
        sweeper.start().await;
    });

    info!("🧹 Abandonment sweeper started");

    let dispatcher = NotificationDispatcher::new(store.clone(), config.notify_interval_secs);
    tokio::spawn(async move {
        dispatcher.start().await;
    });

    info!("📮 Notification dispatcher started");

    // =========================================
    // STEP 8: Start HTTP Server
    // =========================================
    let server_host = config.server_host.clone();
    let server_port = config.server_port;

    info!("🌐 Starting HTTP server on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        App::new()
            // Attach shared application state
            .app_data(web::Data::new(app_state.clone()))

            // Allow the booking frontend to call us from another origin
            .wrap(Cors::permissive())

            // Add logging middleware
            .wrap(middleware::Logger::default())

            // Configure API routes
            .configure(api::configure_routes)
    })
    .bind(format!("{}:{}", server_host, server_port))?
    .run()
    .await
}
