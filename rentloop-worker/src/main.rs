//! # Rentloop Worker
//!
//! Runs the settlement sweep until ctrl-c.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/rentloop \
//! PROCESSOR_SECRET_KEY=sk_test_... \
//! cargo run -p rentloop-worker
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines.

use rentloop_shared::db::pool::{self, PoolSettings};
use rentloop_shared::payments::processor::StripeProcessor;
use rentloop_worker::{config::WorkerConfig, settlement::SettlementSweeper};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rentloop_worker=debug,rentloop_shared=debug".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Rentloop Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let db = pool::connect(&PoolSettings::from_url(
        config.database_url.clone(),
        config.database_max_connections,
    ))
    .await?;

    let processor = StripeProcessor::new(
        config.processor_api_base.clone(),
        config.processor_secret_key.clone(),
        config.processor_timeout,
    )?;

    let sweeper = SettlementSweeper::new(db.clone(), Arc::new(processor), config.sweep);
    let token = sweeper.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        token.cancel();
    });

    sweeper.run().await?;

    pool::shutdown(db).await;
    tracing::info!("Worker stopped");

    Ok(())
}
