//! ==============================================================================
//! error.rs - error taxonomy and its http mapping
//! ==============================================================================
//!
//! every failure a request can hit ends up as an `ApiError`, which renders
//! the stable `{"success": false, "error": ...}` body the dashboard expects.
//!
//! ```text
//!     BadRequest       -> 400  (payload syntax or shape)
//!     Unauthenticated  -> 401  (bearer credential missing or malformed)
//!     Forbidden        -> 403  (bearer credential mismatched)
//!     NotFound         -> 404
//!     MethodNotAllowed -> 405  (known path, wrong verb)
//!     PayloadTooLarge  -> 413  (body over the extractor limit)
//!     Configuration    -> 500  (server has no write secret; fails closed)
//!     Store            -> 503  (backing store unreachable / timed out / failed)
//! ```
//!
//! ==============================================================================

use std::time::Duration;

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::ingest::ValidationError;

/// failure of a backing store call
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store is not configured")]
    NotConfigured,

    #[error("backing store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("backing store failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Not Found")]
    NotFound,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Payload Too Large")]
    PayloadTooLarge,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn message(&self) -> String {
        match self {
            // driver errors can leak connection details; keep them in the logs
            ApiError::Store(StoreError::NotConfigured) => "Store not configured".into(),
            ApiError::Store(_) => "Store unavailable".into(),
            other => other.to_string(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotConfigured => ApiError::Configuration(err.to_string()),
            AuthError::Missing | AuthError::Malformed => ApiError::Unauthenticated(err.to_string()),
            AuthError::Mismatch => ApiError::Forbidden(err.to_string()),
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(err: BytesRejection) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "success": false, "error": self.message() }));
        (status, body).into_response()
    }
}
