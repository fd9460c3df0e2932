use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Aggregate, Reading};
use crate::error::StoreError;
use crate::store::Store;

/// bounds every call on the wrapped store by `limit`
///
/// an expired call is dropped, not cancelled server-side; the caller sees
/// `StoreError::Timeout` and, for appends, leaves the cache alone.
#[derive(Debug)]
pub struct TimeoutStore<S> {
    inner: S,
    limit: Duration,
}

impl<S: Store> TimeoutStore<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

#[async_trait]
impl<S: Store> Store for TimeoutStore<S> {
    async fn append(&self, reading: &Reading) -> Result<DateTime<Utc>, StoreError> {
        bounded(self.limit, self.inner.append(reading)).await
    }

    async fn latest(&self) -> Result<Option<Reading>, StoreError> {
        bounded(self.limit, self.inner.latest()).await
    }

    async fn window_aggregate(&self, window: Duration) -> Result<Aggregate, StoreError> {
        bounded(self.limit, self.inner.window_aggregate(window)).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        bounded(self.limit, self.inner.count()).await
    }
}
