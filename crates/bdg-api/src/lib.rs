//! # bdg-api: Axum API Services for the Badge Trust Core
//!
//! HTTP surface over the key store, the credential signer and verifier, and
//! the StatusList2021 manager.
//!
//! ## API Surface
//!
//! | Prefix | Module | Auth |
//! |--------|--------|------|
//! | `/sign/*` | [`routes::signing`] | issuer |
//! | `/verify/*` | [`routes::verify`] | public |
//! | `/status/*` | [`routes::status`] | public reads, issuer writes |
//! | `/issuers/*/keys`, `/keys/*` | [`routes::keys`] | public reads, issuer writes |
//! | `/health/*`, `/metrics`, `/openapi.json` | here, [`openapi`] | public |
//!
//! Authentication is per handler: handlers that mutate issuer state take a
//! [`auth::CallerIdentity`], which rejects the request with `401` before the
//! handler body runs.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    let mut router = Router::new()
        .merge(routes::signing::router())
        .merge(routes::verify::router())
        .merge(routes::status::router())
        .merge(routes::keys::router())
        .merge(openapi::router())
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));
    if state.config.metrics_enabled {
        router = router.route("/metrics", get(prometheus_metrics));
    }

    router
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(axum::Extension(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 once both repositories answer, 503 otherwise.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.is_ready().await {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

/// GET /metrics: Prometheus text exposition.
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.gather_and_encode() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => AppError::Internal(e).into_response(),
    }
}
