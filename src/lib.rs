//! ==============================================================================
//! sensor-hub - ingestion and query service for environmental sensor readings
//! ==============================================================================
//!
//! a remote device posts readings (temperature, humidity, gas, pressure,
//! altitude); the hub persists them, keeps the newest one in memory and
//! serves it, plus 24h statistics, to a polling dashboard.
//!
//! ```text
//!     request -> server.rs -> handlers.rs -> auth.rs / ingest.rs
//!                                         -> store.rs (durable rows)
//!                                         -> cache.rs (latest reading)
//! ```
//!
//! ==============================================================================

pub mod auth;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod server;
pub mod store;

use std::sync::Arc;

use crate::auth::AuthGate;
use crate::cache::LatestCache;
use crate::config::HubConfig;
use crate::handlers::AppState;
use crate::ingest::IngestSchema;
use crate::store::Store;

/// wire the handler state from config and an already opened store
///
/// seeds the latest-value cache from the store; never fails.
pub async fn build_state(config: &HubConfig, store: Arc<dyn Store>) -> Arc<AppState> {
    let auth = AuthGate::new(config.auth.write_token.clone());
    if config.auth.require_write_auth && !auth.is_configured() {
        tracing::error!("write auth is required but no write token is configured, every sensor update will be rejected");
    }
    if !config.auth.require_write_auth {
        tracing::warn!("write auth disabled, sensor updates are accepted from anyone");
    }

    let schema = IngestSchema::new(&config.ingest.required_channels);
    tracing::info!(required = ?schema.required(), "ingest schema ready");

    let cache = Arc::new(LatestCache::seed(store.as_ref()).await);

    Arc::new(AppState {
        store,
        cache,
        auth,
        require_write_auth: config.auth.require_write_auth,
        schema,
    })
}
