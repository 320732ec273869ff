//! Routers and shared state
//!
//! # API Endpoints
//!
//! ## ANY /check
//!
//! Forward-auth hook for a reverse proxy. Returns `200 OK` when the request
//! is admitted and `429 Too Many Requests` with `Retry-After: 1` otherwise.
//! The proxy is expected to pass the original request headers through.
//!
//! ## GET /health
//!
//! Health check endpoint. Returns "OK" with 200 status.
//!
//! ## GET /metrics
//!
//! Counters in Prometheus text format.
//!
//! ## GET /tiers
//!
//! Configured tiers:
//!
//! ```json
//! [
//!   { "name": "free", "rate": 2.0, "burst": 5 },
//!   { "name": "pro", "rate": 20.0, "burst": 40 }
//! ]
//! ```

use crate::metrics::Metrics;
use crate::middleware::rate_limit;
use anyhow::Result;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum::routing::{any, get};
use axum::{Router, middleware};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tiergate::Governor;
use tokio::net::TcpListener;

/// State shared by the middleware and the service endpoints
#[derive(Clone)]
pub struct AppState {
    pub governor: Arc<Governor>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wrap a governor, with per-tier counters for its tier table
    pub fn new(governor: Governor) -> Self {
        let metrics = Metrics::for_tiers(governor.tiers());
        Self {
            governor: Arc::new(governor),
            metrics: Arc::new(metrics),
        }
    }
}

/// One entry of the `/tiers` response
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TierInfo {
    pub name: String,
    pub rate: f64,
    pub burst: u32,
}

/// Put every route of `upstream` behind the rate limiter
pub fn router(state: AppState, upstream: Router) -> Router {
    upstream.layer(middleware::from_fn_with_state(state, rate_limit))
}

/// The standalone forward-auth service
///
/// Only `/check` is rate limited.
pub fn forward_auth(state: AppState) -> Router {
    let check = router(
        state.clone(),
        Router::new().route("/check", any(|| async { StatusCode::OK })),
    );

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(handle_metrics))
        .route("/tiers", get(handle_tiers))
        .with_state(state)
        .merge(check)
}

/// Serve the forward-auth service until the future is dropped or the
/// process receives Ctrl-C
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = forward_auth(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(state.governor.registry()),
    )
}

async fn handle_tiers(State(state): State<AppState>) -> Json<Vec<TierInfo>> {
    let tiers = state
        .governor
        .tiers()
        .specs()
        .into_iter()
        .map(|spec| TierInfo {
            rate: spec.limits.rate(),
            burst: spec.limits.burst(),
            name: spec.name,
        })
        .collect();

    Json(tiers)
}
