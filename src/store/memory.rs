use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{Aggregate, Reading};
use crate::error::StoreError;
use crate::store::Store;

/// rows kept in process memory, newest last
///
/// `fail_appends` lets tests simulate a store that rejects writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<Reading>>,
    fail_appends: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// insert a row with an explicit observation time (backfill, tests)
    pub async fn insert_at(&self, reading: Reading, at: DateTime<Utc>) {
        let mut rows = self.rows.write().await;
        rows.push(reading.observed(at));
        rows.sort_by_key(|r| r.observed_at);
    }

    pub async fn rows(&self) -> Vec<Reading> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn append(&self, reading: &Reading) -> Result<DateTime<Utc>, StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("append rejected".into()));
        }
        let mut rows = self.rows.write().await;
        // keep timestamps strictly increasing so "latest" is unambiguous
        let mut at = Utc::now();
        if let Some(last) = rows.last().and_then(|r| r.observed_at) {
            if at <= last {
                at = last + chrono::Duration::microseconds(1);
            }
        }
        rows.push(reading.clone().observed(at));
        Ok(at)
    }

    async fn latest(&self) -> Result<Option<Reading>, StoreError> {
        Ok(self.rows.read().await.last().cloned())
    }

    async fn window_aggregate(&self, window: Duration) -> Result<Aggregate, StoreError> {
        let window = chrono::Duration::from_std(window)
            .map_err(|e| StoreError::Backend(format!("invalid window: {e}")))?;
        let now = Utc::now();
        let since = now - window;

        let rows = self.rows.read().await;
        Ok(Aggregate::from_readings(rows.iter().filter(|r| {
            r.observed_at
                .map(|at| at >= since && at <= now)
                .unwrap_or(false)
        })))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.rows.read().await.len() as u64)
    }
}
