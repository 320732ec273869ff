//! # tiergate
//!
//! A tiered token-bucket admission engine for HTTP request chains.
//!
//! ## Overview
//!
//! Every request is classified into a *tier* (a named rate-limit class such as
//! `free`, `pro` or `enterprise`) and a *client identity* derived from its
//! origin headers. Each `(tier, client)` pair owns an independent token bucket:
//! - **Burst**: a fresh bucket admits up to `burst` requests back to back
//! - **Refill**: tokens come back at `rate` per second, fractions included
//! - **Immediate decisions**: nothing is queued, a denial is returned at once
//! - **Isolation**: exhausting one pair never affects another
//!
//! ## Quick Start
//!
//! ```
//! use tiergate::{Governor, HeaderTier, TierTable};
//! use std::time::Instant;
//!
//! let governor = Governor::header_tiered(HeaderTier::default(), TierTable::standard());
//!
//! let headers = [("X-User-Category", "pro"), ("X-Forwarded-For", "203.0.113.7")];
//! let decision = governor.check(&headers[..], "10.0.0.1:51234", Instant::now());
//!
//! if decision.is_allowed() {
//!     println!("forward the request");
//! } else {
//!     println!("429, retry after {:?}", decision.retry_after());
//! }
//! ```
//!
//! ## Classification Policies
//!
//! ### [`CredentialGate`]
//! Meters only requests carrying one known basic-auth credential (by default
//! `free:free`). Everything else passes through unmetered.
//!
//! ```
//! use tiergate::{CredentialGate, Governor, TierLimits};
//!
//! let governor = Governor::credential_gated(CredentialGate::default(), TierLimits::new(10.0, 20));
//! ```
//!
//! ### [`HeaderTier`]
//! Reads the tier name from a header (`X-User-Category` by default), falling
//! back to a default tier when the header is missing or blank. Unknown tiers
//! are not enforced.
//!
//! ```
//! use tiergate::{Governor, HeaderTier, TierLimits, TierTable};
//!
//! let tiers = TierTable::new()
//!     .with_tier("free", TierLimits::new(1.0, 1))
//!     .with_tier("pro", TierLimits::new(10.0, 10));
//! let governor = Governor::header_tiered(HeaderTier::new("X-Plan", "free"), tiers);
//! ```
//!
//! ## Idle Bucket Eviction
//!
//! Buckets are kept for the lifetime of the registry unless an idle timeout is
//! configured. With one, buckets that have been idle long enough to refill
//! completely are dropped during a periodic sweep:
//!
//! ```
//! use tiergate::LimiterRegistry;
//! use std::time::Duration;
//!
//! let registry = LimiterRegistry::builder()
//!     .capacity(100_000)
//!     .idle_timeout(Duration::from_secs(600))
//!     .sweep_interval(Duration::from_secs(60))
//!     .build();
//! ```
//!
//! ## Thread Safety
//!
//! [`Governor`] and [`LimiterRegistry`] are `Send + Sync`. A single mutex
//! guards every bucket, so share the governor behind an `Arc`:
//!
//! ```
//! use std::sync::Arc;
//! use tiergate::{Governor, HeaderTier, TierTable};
//!
//! let governor = Arc::new(Governor::header_tiered(HeaderTier::default(), TierTable::standard()));
//! ```
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for faster hashing
//! - `http`: Implement [`HeaderSource`] for `http::HeaderMap`

pub mod core;

pub use core::{
    Admission, BucketKey, CredentialGate, Decision, Governor, HeaderSource, HeaderTier,
    LimiterRegistry, LimiterRegistryBuilder, Policy, RETRY_AFTER, TierError, TierLimits, TierSpec,
    TierTable, client_identity,
};
