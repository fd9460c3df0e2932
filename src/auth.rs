//! ==============================================================================
//! auth.rs - bearer credential gate for write requests
//! ==============================================================================
//!
//! purpose:
//!     decides whether a request may mutate state. the secret is handed in
//!     at construction from the config struct, never looked up from the
//!     process environment here.
//!
//! verdicts:
//!     - no secret configured        -> NotConfigured (fail closed)
//!     - header absent               -> Missing
//!     - header not "Bearer <token>" -> Malformed
//!     - token differs from secret   -> Mismatch
//!     - token equals secret         -> allowed
//!
//! hardening gaps: no rate limiting, no rotation, single shared secret.
//!
//! ==============================================================================

use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Server write token is not configured")]
    NotConfigured,

    #[error("Missing authorization header")]
    Missing,

    #[error("Invalid authorization header")]
    Malformed,

    #[error("Invalid token")]
    Mismatch,
}

#[derive(Clone)]
pub struct AuthGate {
    secret: Option<String>,
}

impl AuthGate {
    /// an empty secret counts as no secret
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let secret = self.secret.as_deref().ok_or(AuthError::NotConfigured)?;

        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::Missing)?;
        let value = value.to_str().map_err(|_| AuthError::Malformed)?;
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::Malformed)?;

        // ct_eq on slices of different lengths is false without leaking where
        // the first difference is
        if bool::from(token.as_bytes().ct_eq(secret.as_bytes())) {
            Ok(())
        } else {
            Err(AuthError::Mismatch)
        }
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("configured", &self.is_configured())
            .finish()
    }
}
