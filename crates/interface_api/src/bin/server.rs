//! Recharge Financing - API Server Binary
//!
//! Starts the HTTP API with the PostgreSQL adapters and the in-process
//! sandbox payment gateway.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin recharge-api
//!
//! # Run with environment variables
//! RECHARGE_PORT=8080 DATABASE_URL=postgres://... cargo run --bin recharge-api
//! ```
//!
//! # Environment Variables
//!
//! * `RECHARGE_HOST` - Server host (default: 0.0.0.0)
//! * `RECHARGE_PORT` - Server port (default: 8080)
//! * `RECHARGE_JWT_SECRET` - Secret that verifies bearer tokens (required in production)
//! * `RECHARGE_JWT_EXPIRATION_SECS` - Token lifetime for locally issued tokens (default: 3600)
//! * `RECHARGE_DATABASE_URL` or `DATABASE_URL` - PostgreSQL connection string
//! * `RECHARGE_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `RECHARGE_GATEWAY_TIMEOUT_MS` - Upper bound on each gateway call (default: 10000)
//! * `RECHARGE_REDIRECT_BASE_URL` - Public URL users return to after checkout

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_recharge::{PaymentOrchestrator, SandboxGateway};
use infra_db::{
    create_pool, run_migrations, DatabaseConfig, PostgresCatalogAdapter, PostgresIdentityAdapter,
    PostgresRechargeStore, PostgresSettingsAdapter,
};
use interface_api::{config::ApiConfig, create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config()?;

    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting recharge financing API server"
    );

    let pool = create_pool(DatabaseConfig::new(config.database_url.clone()))
        .await
        .context("connecting to database")?;
    run_migrations(&pool).await.context("running migrations")?;

    let orchestrator_config = config.orchestrator_config();
    let gateway = Arc::new(SandboxGateway::new(orchestrator_config.redirect_base_url.clone()));
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        Arc::new(PostgresIdentityAdapter::new(pool.clone())),
        Arc::new(PostgresCatalogAdapter::new(pool.clone())),
        Arc::new(PostgresSettingsAdapter::new(pool.clone())),
        gateway.clone(),
        Arc::new(PostgresRechargeStore::new(pool).with_currency(orchestrator_config.currency)),
        orchestrator_config,
    ));

    let state = AppState::new(orchestrator, config.clone()).with_sandbox(gateway);
    let app = create_router(state);

    let addr: SocketAddr = config.server_addr().parse().context("parsing server address")?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Loads configuration, taking `DATABASE_URL` when the prefixed variable is unset
fn load_config() -> anyhow::Result<ApiConfig> {
    let mut config = ApiConfig::from_env().context("loading configuration")?;
    if std::env::var("RECHARGE_DATABASE_URL").is_err() {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
    }
    Ok(config)
}

/// Initializes the tracing subscriber for structured logging
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
