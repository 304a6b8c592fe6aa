//! # Bookpay Payments API Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Payments API Server                              │
//! │                                                                         │
//! │  Storefront ───► HTTP (8080) ───► PaymentService ───► SQLite           │
//! │  Provider   ───► webhooks              │                                │
//! │                                        ▼                                │
//! │                               Paystack / Flutterwave                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Configuration comes from `bookpay.toml` (or `BOOKPAY_CONFIG`) and
//! `BOOKPAY_*` environment variables. Log level follows `RUST_LOG`.

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bookpay_api::{router, AppState};
use bookpay_db::{Database, DbConfig};
use bookpay_payments::{GatewayRegistry, PaymentService, PaymentsConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bookpay=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting Bookpay payments API...");

    // Load configuration
    let config = PaymentsConfig::load(None)?;
    info!(
        bind_addr = %config.server.bind_addr,
        database = %config.database.path.display(),
        "Configuration loaded"
    );

    // Open database (runs migrations)
    let db = Database::new(
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
    )
    .await?;
    info!("Database ready");

    let gateways = GatewayRegistry::from_config(&config.gateways)?;
    if gateways.is_empty() {
        warn!("No payment gateway is enabled; initialize requests will be rejected");
    }

    let payments = PaymentService::new(db.clone(), gateways, &config);
    let app = router(AppState::new(payments));

    let listener = TcpListener::bind(&config.server.bind_addr).await?;
    info!(addr = %config.server.bind_addr, "Payments API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(?e, "Failed to install Ctrl+C handler");
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
                error!(?e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
