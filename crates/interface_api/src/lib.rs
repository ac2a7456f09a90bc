//! HTTP API Layer
//!
//! This crate provides the REST API for the COD dispatch system using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for webhooks, orders, payments, settlements
//! - **Middleware**: Authentication, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects (camelCase on the wire)
//! - **Error Handling**: Consistent error responses
//!
//! The payment webhook is public and authenticated by its HMAC signature;
//! everything under `/api/v1` requires a bearer token.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(config, orders, obligations, blobs);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use core_kernel::Currency;
use domain_delivery::{BlobStore, DeliveryService, OrderStore, ProofUploader};
use domain_payment::{ObligationStore, PaymentDesk, Reconciler, SignatureVerifier};

use crate::config::ApiConfig;
use crate::middleware::{audit_middleware, auth_middleware};
use crate::handlers::{health, orders, payments, riders, settlements, uploads, webhooks};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub delivery: DeliveryService,
    pub reconciler: Reconciler,
    pub desk: PaymentDesk,
    pub uploader: ProofUploader,
    pub obligations: Arc<dyn ObligationStore>,
}

impl AppState {
    /// Wires the services over the given store adapters
    pub fn new(
        config: ApiConfig,
        orders: Arc<dyn OrderStore>,
        obligations: Arc<dyn ObligationStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let verifier = SignatureVerifier::new(config.webhook_secret.clone());
        Self {
            delivery: DeliveryService::new(orders),
            reconciler: Reconciler::new(Arc::clone(&obligations), verifier, Currency::PHP),
            desk: PaymentDesk::new(Arc::clone(&obligations), config.static_qr_image_url.clone()),
            uploader: ProofUploader::new(blobs),
            obligations,
            config,
        }
    }
}

/// Creates the main API router
///
/// # Arguments
///
/// * `state` - Services and configuration shared by every handler
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let mut public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route(
            "/webhooks/payrex",
            post(webhooks::receive_webhook).get(webhooks::webhook_status),
        );

    if state.config.expose_test_webhook {
        public_routes = public_routes.route("/webhooks/payrex/test", post(webhooks::test_webhook));
    }

    // Order routes
    let order_routes = Router::new()
        .route("/", get(orders::list_orders).post(orders::create_order))
        .route("/:id", get(orders::get_order))
        .route("/:id/claim", post(orders::claim_order))
        .route("/:id/pickup", post(orders::verify_pickup))
        .route("/:id/start-delivery", post(orders::start_delivery))
        .route("/:id/payments", get(orders::list_payments))
        .route("/:id/payment-confirmed", post(orders::confirm_payment))
        .route("/:id/complete", post(orders::complete_order))
        .route("/:id/cancel", post(orders::cancel_order));

    // Payment routes
    let payment_routes = Router::new()
        .route("/initiate", post(payments::initiate_payment))
        .route("/status", get(payments::payment_status));

    // Settlement routes
    let settlement_routes = Router::new()
        .route("/initiate", post(settlements::initiate_settlement))
        .route("/status", get(settlements::settlement_status));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/orders", order_routes)
        .nest("/payments", payment_routes)
        .nest("/settlements", settlement_routes)
        .route("/riders/:id/summary", get(riders::daily_summary))
        .route("/uploads/pod", post(uploads::upload_pod))
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    let mut router = Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes);

    // Locally stored proof photos
    if let Some(root) = &state.config.blob_root {
        let mount = state.config.blob_public_base_url.trim_end_matches('/');
        router = router.nest_service(mount, ServeDir::new(root));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
