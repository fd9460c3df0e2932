//! ==============================================================================
//! cache.rs - latest-value cache
//! ==============================================================================
//!
//! a single slot holding the most recent durably persisted reading.
//!
//! ```text
//!     - seeded once at startup from the store's newest row
//!     - replaced whole after every successful append (last writer wins)
//!     - never ahead of the store: handlers only call `set` after `append`
//! ```
//!
//! the slot holds an `Arc<Reading>` so the write lock is only held for the
//! pointer swap and readers clone a pointer, not the record.
//!
//! ==============================================================================

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::Reading;
use crate::store::Store;

#[derive(Debug, Default)]
pub struct LatestCache {
    slot: RwLock<Arc<Reading>>,
}

impl LatestCache {
    /// empty cache holding the zero-value sentinel
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reading(reading: Reading) -> Self {
        Self {
            slot: RwLock::new(Arc::new(reading)),
        }
    }

    /// seed from the newest persisted row
    ///
    /// an empty or unreachable store is not fatal: the cache starts from the
    /// sentinel and the service keeps serving.
    pub async fn seed(store: &dyn Store) -> Self {
        match store.latest().await {
            Ok(Some(reading)) => {
                tracing::info!(observed_at = ?reading.observed_at, "latest reading seeded from store");
                Self::with_reading(reading)
            }
            Ok(None) => {
                tracing::info!("store holds no readings yet, starting from sentinel");
                Self::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to seed latest reading, starting from sentinel");
                Self::new()
            }
        }
    }

    pub async fn get(&self) -> Arc<Reading> {
        self.slot.read().await.clone()
    }

    pub async fn set(&self, reading: Reading) {
        let next = Arc::new(reading);
        *self.slot.write().await = next;
    }
}
