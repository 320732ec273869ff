//! # tiergate server
//!
//! HTTP integration for the [`tiergate`] admission engine: an axum
//! middleware that guards any router, and a standalone forward-auth service
//! for reverse proxies.
//!
//! ## Installation
//!
//! ```bash
//! cargo install tiergate-server
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! tiergate --help
//!
//! # Header tiers with the built-in table on port 8080
//! tiergate
//!
//! # Custom tiers and idle bucket eviction
//! tiergate --tier free=1/5 --tier pro=20/40 --idle-timeout 600
//!
//! # Meter a single basic-auth credential
//! tiergate --policy credential --username free --password free --rate 10 --burst 20
//! ```
//!
//! ## Configuration
//!
//! Configure via CLI arguments, environment variables or a TOML tier file
//! (CLI takes precedence over the environment, which takes precedence over
//! the file):
//!
//! ```bash
//! export TIERGATE_PORT=9090
//! export TIERGATE_TIERS=free=2/5,pro=20/40
//! tiergate
//!
//! # List all available environment variables
//! tiergate --list-env-vars
//! ```
//!
//! ## Reverse Proxy Integration
//!
//! Point the proxy's forward-auth hook at `/check` and pass the original
//! request headers along. A `200` lets the request through, a `429` carries
//! `Retry-After: 1` and a plain text message to relay to the client.
//!
//! ```text
//! client ──► reverse proxy ──► upstream
//!                 │
//!                 ▼
//!        tiergate GET /check
//!         200 / 429 + Retry-After
//! ```
//!
//! ## Embedding
//!
//! ```no_run
//! use axum::{Router, routing::get};
//! use tiergate::{CredentialGate, Governor, TierLimits};
//! use tiergate_server::app::{self, AppState};
//!
//! let governor = Governor::credential_gated(CredentialGate::default(), TierLimits::new(10.0, 20));
//! let upstream = Router::new().route("/", get(|| async { "hello" }));
//! let app = app::router(AppState::new(governor), upstream);
//! ```

pub mod app;
pub mod config;
pub mod metrics;
pub mod middleware;
