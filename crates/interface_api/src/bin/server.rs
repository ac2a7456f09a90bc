//! COD Dispatch - API Server Binary
//!
//! This binary starts the HTTP API server: payment webhooks, the rider
//! delivery workflow and settlements.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin cod-api
//!
//! # Run with environment variables
//! API_PORT=8080 API_DATABASE_URL=postgres://... API_WEBHOOK_SECRET=whsec_... cargo run --bin cod-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_DATABASE_MAX_CONNECTIONS` - Pool size ceiling (default: 10)
//! * `API_DATABASE_MIN_CONNECTIONS` - Idle connections kept open (default: 2)
//! * `API_DATABASE_CONNECT_TIMEOUT_SECS` - Wait for a pooled connection (default: 30)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_LOG_LEVEL` - Log level or filter directive (default: info)
//! * `API_LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! * `API_WEBHOOK_SECRET` - Payment provider HMAC secret; unset disables signature checks
//! * `API_STATIC_QR_IMAGE_URL` - QR image shown to payers (default: /static-qrph.png)
//! * `API_BLOB_ROOT` - Directory for proof-of-delivery photos; unset stores them inline
//! * `API_BLOB_PUBLIC_BASE_URL` - Path prefix the photo directory is served under, e.g. /media (default: /media)
//! * `API_TIMEZONE` - Business-day timezone (default: Asia/Manila)
//! * `API_EXPOSE_TEST_WEBHOOK` - Mount the synthetic payment trigger (default: false)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use infra_db::{
    create_pool, run_migrations, DatabaseConfig, FsBlobStore, PostgresObligationStore,
    PostgresOrderStore,
};
use interface_api::config::{ApiConfig, LogFormat};
use interface_api::{create_router, AppState};

/// Main entry point for the API server.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - Database connection or migrations fail
/// - Server fails to bind to the configured address
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real deployments set the environment directly
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.log_level, config.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting COD dispatch API");

    if !config.signature_verification_enabled() {
        tracing::warn!("API_WEBHOOK_SECRET is not set, webhook signatures will NOT be verified");
    }
    if config.expose_test_webhook {
        tracing::warn!("test webhook endpoint is exposed, do not enable in production");
    }

    let db_config = DatabaseConfig::new(config.database_url.clone())
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .connect_timeout(Duration::from_secs(config.database_connect_timeout_secs));
    let pool = create_pool(db_config)
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool).await.context("failed to run migrations")?;

    let blobs = FsBlobStore::new(
        config.blob_root.as_ref().map(PathBuf::from),
        config.blob_public_base_url.clone(),
    );
    let state = AppState::new(
        config.clone(),
        Arc::new(PostgresOrderStore::new(pool.clone())),
        Arc::new(PostgresObligationStore::new(pool)),
        Arc::new(blobs),
    );
    let app = create_router(state);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// In-flight requests complete before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
