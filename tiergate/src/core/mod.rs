//! Core components of the tiergate admission engine
//!
//! This module contains the fundamental building blocks:
//! - [`tier`]: Tier limits and the immutable tier table
//! - [`classify`]: Request classification and client identification
//! - [`registry`]: The token-bucket registry shared by all requests
//! - [`governor`]: The engine tying a policy, a tier table and a registry together

mod bucket;
pub mod classify;
pub mod governor;
mod key;
pub mod registry;
pub mod tier;

pub use classify::{CredentialGate, HeaderSource, HeaderTier, Policy, client_identity};
pub use governor::{Decision, Governor, RETRY_AFTER};
pub use key::BucketKey;
pub use registry::{Admission, LimiterRegistry, LimiterRegistryBuilder};
pub use tier::{TierLimits, TierSpec, TierTable};

use std::error::Error;
use std::fmt;

/// Errors raised while building tier configuration
///
/// The admission path itself never fails; these only come out of parsing
/// tier definitions such as `pro=20/40`.
///
/// # Example
///
/// ```
/// use tiergate::{TierError, TierSpec};
///
/// match "pro=fast/40".parse::<TierSpec>() {
///     Err(TierError::InvalidRate(value)) => println!("bad rate: {value}"),
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierError {
    /// The definition is not of the form `name=rate/burst`
    InvalidTierSpec(String),
    /// The rate is not a non-negative number
    InvalidRate(String),
    /// The burst is not a non-negative integer
    InvalidBurst(String),
}

impl fmt::Display for TierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierError::InvalidTierSpec(spec) => {
                write!(f, "invalid tier definition {spec:?}, expected name=rate/burst")
            }
            TierError::InvalidRate(rate) => write!(f, "invalid tier rate: {rate}"),
            TierError::InvalidBurst(burst) => write!(f, "invalid tier burst: {burst}"),
        }
    }
}

impl Error for TierError {}
