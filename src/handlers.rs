//! ==============================================================================
//! handlers.rs - ingest and query handlers
//! ==============================================================================
//!
//! ingest (POST /api/sensor-update):
//!     auth gate -> body limit -> schema validation -> store append -> cache replace.
//!     every rejection happens before the append, and the cache is only
//!     touched after the append succeeded, so it never runs ahead of what
//!     was durably persisted.
//!
//! queries:
//!     GET /api/latest  cache contents, never touches the store
//!     GET /api/stats   24h window aggregate, never touches the cache
//!
//! ==============================================================================

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::HeaderMap,
    response::Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::AuthGate;
use crate::cache::LatestCache;
use crate::domain::{Aggregate, Reading};
use crate::error::ApiError;
use crate::ingest::{IngestSchema, ValidationError};
use crate::store::{Store, STATS_WINDOW};

// ==============================================================================
// shared state
// ==============================================================================
// built once at startup and handed to every handler behind an Arc.
// the cache is the only mutable piece; the rest is read-only after boot.

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Arc<LatestCache>,
    pub auth: AuthGate,
    /// false only when the config explicitly opens the write endpoint
    pub require_write_auth: bool,
    pub schema: IngestSchema,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub data: Reading,
}

pub async fn sensor_update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    if state.require_write_auth {
        if let Err(e) = state.auth.check(&headers) {
            tracing::warn!(reason = %e, "sensor update rejected by auth gate");
            return Err(e.into());
        }
    }

    let body = body.map_err(|e| {
        tracing::warn!(status = %e.status(), "sensor update rejected: unreadable body");
        ApiError::from(e)
    })?;

    let reading = state.schema.parse(&body).map_err(|e| {
        match &e {
            ValidationError::InvalidFormat {
                channel: Some(channel),
            } => tracing::warn!(%channel, "sensor update rejected: invalid channel"),
            _ => tracing::warn!(error = %e, "sensor update rejected"),
        }
        ApiError::from(e)
    })?;

    let observed_at = state.store.append(&reading).await.map_err(|e| {
        tracing::error!(error = %e, "failed to persist sensor update, cache left untouched");
        ApiError::from(e)
    })?;

    let reading = reading.observed(observed_at);
    state.cache.set(reading.clone()).await;
    tracing::debug!(temp = reading.temp, humidity = reading.humidity, "sensor update accepted");

    Ok(Json(IngestResponse {
        success: true,
        data: reading,
    }))
}

pub async fn latest(State(state): State<Arc<AppState>>) -> Json<Reading> {
    let reading = state.cache.get().await;
    Json(reading.as_ref().clone())
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Aggregate>, ApiError> {
    let aggregate = state
        .store
        .window_aggregate(STATS_WINDOW)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to compute window aggregate");
            ApiError::from(e)
        })?;
    Ok(Json(aggregate))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
