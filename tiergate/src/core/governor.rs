//! The admission engine
//!
//! [`Governor`] runs the whole per-request flow: classify the request with a
//! [`Policy`], look the tier up in the [`TierTable`], and check the bucket for
//! the resulting key in the [`LimiterRegistry`].

use super::classify::HeaderSource;
use super::{
    BucketKey, CredentialGate, HeaderTier, LimiterRegistry, Policy, TierLimits, TierTable,
};
use std::time::{Duration, Instant};

/// Delay suggested to denied clients
///
/// Fixed at one second rather than derived from the refill rate.
pub const RETRY_AFTER: Duration = Duration::from_secs(1);

/// Result of checking one request
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<'a> {
    /// The policy did not meter the request
    Unmetered,
    /// The request's tier has no limits
    Unconfigured {
        /// Tier the request was classified into
        tier: &'a str,
    },
    /// A token was spent and the request may proceed
    Allowed {
        /// Bucket the token came from
        key: BucketKey<'a>,
        /// Tokens left in the bucket
        remaining: f64,
    },
    /// The bucket is empty
    Denied {
        /// Bucket that ran dry
        key: BucketKey<'a>,
        /// Suggested wait before retrying
        retry_after: Duration,
    },
}

impl Decision<'_> {
    /// Whether the request should be forwarded
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Denied { .. })
    }

    /// Suggested retry delay, only for denials
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Denied { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Tier the request was classified into, if it was metered
    pub fn tier(&self) -> Option<&str> {
        match self {
            Decision::Unmetered => None,
            Decision::Unconfigured { tier } => Some(*tier),
            Decision::Allowed { key, .. } | Decision::Denied { key, .. } => Some(key.tier),
        }
    }
}

/// Tiered token-bucket admission engine
///
/// # Example
///
/// ```
/// use tiergate::{CredentialGate, Governor, TierLimits};
/// use std::time::Instant;
///
/// let governor = Governor::credential_gated(CredentialGate::default(), TierLimits::new(1.0, 1));
/// let free = [("Authorization", "Basic ZnJlZTpmcmVl"), ("X-Real-Ip", "192.0.2.8")];
/// let now = Instant::now();
///
/// assert!(governor.check(&free[..], "10.0.0.1:3000", now).is_allowed());
/// assert!(!governor.check(&free[..], "10.0.0.1:3000", now).is_allowed());
///
/// // Requests without the free credential are never limited
/// let paid = [("Authorization", "Bearer token")];
/// assert!(governor.check(&paid[..], "10.0.0.1:3000", now).is_allowed());
/// ```
pub struct Governor {
    policy: Policy,
    tiers: TierTable,
    registry: LimiterRegistry,
}

impl Governor {
    /// Create a governor with a registry that never evicts
    pub fn new(policy: impl Into<Policy>, tiers: TierTable) -> Self {
        Self::with_registry(policy, tiers, LimiterRegistry::new())
    }

    /// Create a governor around an existing registry
    pub fn with_registry(
        policy: impl Into<Policy>,
        tiers: TierTable,
        registry: LimiterRegistry,
    ) -> Self {
        Governor {
            policy: policy.into(),
            tiers,
            registry,
        }
    }

    /// Meter only requests carrying the gate's credential, all in one tier
    pub fn credential_gated(gate: CredentialGate, limits: TierLimits) -> Self {
        let tiers = TierTable::single(gate.tier(), limits);
        Self::new(gate, tiers)
    }

    /// Meter every request in the tier named by a header
    pub fn header_tiered(selector: HeaderTier, tiers: TierTable) -> Self {
        Self::new(selector, tiers)
    }

    /// Decide whether a request may proceed
    ///
    /// `remote_addr` is the raw `host:port` of the connection and is only
    /// used when no proxy header names the client.
    pub fn check<'a, H: HeaderSource + ?Sized>(
        &'a self,
        headers: &'a H,
        remote_addr: &'a str,
        now: Instant,
    ) -> Decision<'a> {
        let Some(key) = self.policy.classify(headers, remote_addr) else {
            return Decision::Unmetered;
        };

        let limits = self.tiers.limits_for(key.tier);
        if limits.is_unconfigured() {
            return Decision::Unconfigured { tier: key.tier };
        }

        let admission = self.registry.check(key, limits, now);
        if admission.allowed {
            Decision::Allowed {
                key,
                remaining: admission.remaining,
            }
        } else {
            Decision::Denied {
                key,
                retry_after: RETRY_AFTER,
            }
        }
    }

    /// Body of the 429 response
    pub fn rejection_message(&self) -> &'static str {
        self.policy.rejection_message()
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn registry(&self) -> &LimiterRegistry {
        &self.registry
    }
}
