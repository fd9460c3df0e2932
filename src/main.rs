//! ==============================================================================
//! main.rs - sensor hub entry point
//! ==============================================================================
//!
//! boot order:
//!     1. .env + config file + environment overrides
//!     2. tracing (RUST_LOG, else logging.level from config)
//!     3. backing store (lazy; an unreachable store is not fatal)
//!     4. latest-value cache seeded from the store
//!     5. http server until SIGINT/SIGTERM
//!
//! ==============================================================================

use anyhow::{Context as _, Result};
use sensor_hub::{build_state, config::HubConfig, server, store};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // step 1: load configuration
    let mut config = HubConfig::load_or_default();
    config.apply_env(|key| std::env::var(key).ok());

    // step 2: logging
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::info!("sensor-hub starting up...");
    config.log_summary();

    // step 3 + 4: store and cache
    let store = store::open(&config.store);
    let state = build_state(&config, store).await;

    // step 5: serve
    let app = server::build_router(state, config.server.static_dir.as_deref());
    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("sensor-hub listening on http://{addr}");

    server::serve(listener, app).await
}
