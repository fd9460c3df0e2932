//! ==============================================================================
//! store.rs - narrow interface to the durable backing store
//! ==============================================================================
//!
//! purpose:
//!     the handlers only ever talk to `dyn Store`. the backend is picked once
//!     at startup from config:
//!
//! ```text
//!     - PostgresStore:     remote sql store (production)
//!     - MemoryStore:       in-process rows (local development, tests)
//!     - DisconnectedStore: no credentials configured; every call fails
//!     - TimeoutStore:      wraps the chosen backend, bounds every call
//! ```
//!
//! contract:
//!     - `append` is the only mutating call. it inserts exactly one row and
//!       returns the timestamp the store assigned to it. duplicate
//!       submissions become duplicate rows.
//!     - calls are never retried here; failures surface to the handler.
//!     - no call outlives `store.call_timeout_ms`.
//!     - the store never reads or writes the latest-value cache.
//!
//! ==============================================================================

mod memory;
mod postgres;
mod timeout;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use timeout::TimeoutStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::{StoreBackend, StoreConfig};
use crate::domain::{Aggregate, Reading};
use crate::error::StoreError;

/// trailing window served by /api/stats
pub const STATS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[async_trait]
pub trait Store: Send + Sync {
    /// persist one reading; returns the server-assigned observation time
    async fn append(&self, reading: &Reading) -> Result<DateTime<Utc>, StoreError>;

    /// newest persisted reading, or None for an empty store
    async fn latest(&self) -> Result<Option<Reading>, StoreError>;

    /// aggregate over rows observed within `[now - window, now]`
    async fn window_aggregate(&self, window: Duration) -> Result<Aggregate, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

/// pick the backend named in config
///
/// missing or unusable postgres credentials degrade to `DisconnectedStore`:
/// the service still boots and serves the cache, store-backed calls fail.
pub fn open(config: &StoreConfig) -> Arc<dyn Store> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store, readings are lost on restart");
            Arc::new(TimeoutStore::new(MemoryStore::new(), config.call_timeout()))
        }
        StoreBackend::Postgres => {
            let Some(url) = config.database_url.as_deref() else {
                tracing::warn!("no database url configured, store-backed endpoints will fail");
                return Arc::new(DisconnectedStore);
            };
            match PostgresStore::connect_lazy(
                url,
                config.auth_token.as_deref(),
                config.max_connections,
                config.call_timeout(),
            ) {
                Ok(store) => Arc::new(TimeoutStore::new(store, config.call_timeout())),
                Err(e) => {
                    tracing::error!(error = %e, "invalid database configuration, store-backed endpoints will fail");
                    Arc::new(DisconnectedStore)
                }
            }
        }
    }
}

/// stand-in used when no database url is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedStore;

#[async_trait]
impl Store for DisconnectedStore {
    async fn append(&self, _reading: &Reading) -> Result<DateTime<Utc>, StoreError> {
        Err(StoreError::NotConfigured)
    }

    async fn latest(&self) -> Result<Option<Reading>, StoreError> {
        Err(StoreError::NotConfigured)
    }

    async fn window_aggregate(&self, _window: Duration) -> Result<Aggregate, StoreError> {
        Err(StoreError::NotConfigured)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Err(StoreError::NotConfigured)
    }
}
