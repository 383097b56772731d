//! # Rentloop API Server
//!
//! Serves the marketplace HTTP API: identity, catalog, rentals, payments,
//! processor webhooks and image uploads.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/rentloop \
//! JWT_SECRET=$(openssl rand -hex 32) \
//! PROCESSOR_SECRET_KEY=sk_test_... PROCESSOR_WEBHOOK_SECRET=whsec_... \
//! cargo run -p rentloop-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines.

use rentloop_api::{
    app::{build_router, AppState},
    config::Config,
};
use rentloop_shared::db::{
    migrations::run_migrations,
    pool::{self, PoolSettings},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rentloop_api=debug,rentloop_shared=debug,tower_http=debug".into());
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

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Rentloop API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let db = pool::connect(&PoolSettings::from_url(
        config.database.url.clone(),
        config.database.max_connections,
    ))
    .await?;
    run_migrations(&db).await?;

    let bind_address = config.bind_address();
    let state = AppState::from_config(db.clone(), config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool::shutdown(db).await;
    tracing::info!("Server stopped");

    Ok(())
}
