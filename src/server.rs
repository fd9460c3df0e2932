//! ==============================================================================
//! server.rs - http routing shell
//! ==============================================================================
//!
//! routes:
//!     POST /api/sensor-update   ingest (bearer auth unless disabled)
//!     GET  /api/latest          latest-value cache
//!     GET  /api/stats           24h window aggregate
//!     GET  /healthz             liveness
//!     OPTIONS *                 204, cors headers only
//!     wrong verb on a route     405 json body
//!     anything else             static dashboard dir if configured, else 404
//!
//! every response, errors included, carries the same permissive cors
//! headers. the device is not a browser, the dashboard may be served from
//! elsewhere.
//!
//! ==============================================================================

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::Request,
    handler::HandlerWithoutStateExt,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, AppState};

pub fn build_router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route(
            "/api/sensor-update",
            post(handlers::sensor_update).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/latest",
            get(handlers::latest).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/stats",
            get(handlers::stats).fallback(handlers::method_not_allowed),
        )
        .route(
            "/healthz",
            get(handlers::health).fallback(handlers::method_not_allowed),
        );

    let router = match static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .fallback(handlers::not_found.into_service()),
        ),
        None => router.fallback(handlers::not_found),
    };

    router
        .with_state(state)
        .layer(middleware::from_fn(preflight))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let request_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http",
                    %request_id,
                    method = %req.method(),
                    uri = %req.uri(),
                )
            }),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// answer every OPTIONS request before routing, preflight headers or not
async fn preflight(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    next.run(req).await
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(i), Ok(t)) => (i, t),
        _ => {
            tracing::error!("failed to install signal handlers, running until killed");
            std::future::pending::<()>().await;
            return;
        }
    };
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
