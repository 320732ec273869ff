//! axum middleware enforcing tier limits
//!
//! # Usage
//!
//! ```no_run
//! use axum::{Router, routing::get};
//! use tiergate::{Governor, HeaderTier, TierTable};
//! use tiergate_server::{app::AppState, middleware::rate_limit};
//!
//! let state = AppState::new(Governor::header_tiered(
//!     HeaderTier::default(),
//!     TierTable::standard(),
//! ));
//!
//! let app: Router = Router::new()
//!     .route("/api", get(|| async { "hello" }))
//!     .layer(axum::middleware::from_fn_with_state(state, rate_limit));
//! ```

use crate::app::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tiergate::Decision;
use tracing::debug;

/// Forward admitted requests, answer denied ones with `429`
///
/// The connection address comes from the `ConnectInfo<SocketAddr>` extension
/// and is empty when the server was not started with connect info.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    let retry_after = {
        let decision = state
            .governor
            .check(request.headers(), &remote_addr, Instant::now());
        state.metrics.record_decision(&decision);

        match decision {
            Decision::Denied { key, retry_after } => {
                debug!(
                    key = %key,
                    policy = state.governor.policy().name(),
                    "Rate limit exceeded"
                );
                Some(retry_after)
            }
            _ => None,
        }
    };

    match retry_after {
        Some(retry_after) => too_many_requests(state.governor.rejection_message(), retry_after),
        None => next.run(request).await,
    }
}

/// `429 Too Many Requests` with a `Retry-After` header and a plain text body
pub fn too_many_requests(message: &'static str, retry_after: Duration) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.as_secs().to_string())],
        message,
    )
        .into_response()
}
