//! Tier limits and the tier table
//!
//! A tier is a named rate-limit class. Its [`TierLimits`] say how fast tokens
//! come back (`rate`, per second) and how many can pile up (`burst`). The
//! [`TierTable`] maps names to limits and never changes once built.

use super::TierError;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

/// Rate and burst of a single tier
///
/// A tier with both `rate == 0` and `burst == 0` is *unconfigured*: requests
/// in it are never limited.
///
/// # Example
///
/// ```
/// use tiergate::TierLimits;
///
/// // Two tokens per second, up to five at once
/// let limits = TierLimits::new(2.0, 5);
/// assert_eq!(limits.burst(), 5);
/// assert!(!limits.is_unconfigured());
///
/// assert!(TierLimits::UNCONFIGURED.is_unconfigured());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierLimits {
    rate: f64,
    burst: u32,
}

impl TierLimits {
    /// Limits that disable enforcement
    pub const UNCONFIGURED: TierLimits = TierLimits {
        rate: 0.0,
        burst: 0,
    };

    /// Creates limits from a refill rate (tokens per second) and a burst capacity
    ///
    /// Negative or NaN rates are treated as zero.
    pub fn new(rate: f64, burst: u32) -> Self {
        let rate = if rate.is_nan() || rate < 0.0 { 0.0 } else { rate };
        TierLimits { rate, burst }
    }

    /// Tokens added per second
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum number of tokens a bucket can hold
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Whether these limits switch enforcement off
    pub fn is_unconfigured(&self) -> bool {
        self.rate == 0.0 && self.burst == 0
    }
}

impl fmt::Display for TierLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.rate, self.burst)
    }
}

/// A named tier definition, parsed from `name=rate/burst`
///
/// # Example
///
/// ```
/// use tiergate::TierSpec;
///
/// let spec: TierSpec = "pro=20/40".parse().unwrap();
/// assert_eq!(spec.name, "pro");
/// assert_eq!(spec.limits.rate(), 20.0);
/// assert_eq!(spec.limits.burst(), 40);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TierSpec {
    /// Tier name as matched against the classifier's output
    pub name: String,
    /// Limits applied to every client in the tier
    pub limits: TierLimits,
}

impl FromStr for TierSpec {
    type Err = TierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TierError::InvalidTierSpec(s.to_string());

        let (name, limits) = s.split_once('=').ok_or_else(invalid)?;
        let (rate, burst) = limits.split_once('/').ok_or_else(invalid)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(invalid());
        }

        let rate = rate.trim();
        let parsed_rate = rate
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite() && *r >= 0.0)
            .ok_or_else(|| TierError::InvalidRate(rate.to_string()))?;

        let burst = burst.trim();
        let parsed_burst = burst
            .parse::<u32>()
            .map_err(|_| TierError::InvalidBurst(burst.to_string()))?;

        Ok(TierSpec {
            name: name.to_string(),
            limits: TierLimits::new(parsed_rate, parsed_burst),
        })
    }
}

impl fmt::Display for TierSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.limits)
    }
}

/// Immutable mapping from tier name to [`TierLimits`]
///
/// Names that are not in the table resolve to [`TierLimits::UNCONFIGURED`].
///
/// # Example
///
/// ```
/// use tiergate::{TierLimits, TierTable};
///
/// let tiers = TierTable::standard();
/// assert_eq!(tiers.limits_for("pro"), TierLimits::new(20.0, 40));
/// assert!(tiers.limits_for("platinum").is_unconfigured());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TierTable {
    tiers: HashMap<String, TierLimits>,
}

impl TierTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock table: `free=2/5`, `pro=20/40`, `enterprise=100/200`
    pub fn standard() -> Self {
        TierTable::new()
            .with_tier("free", TierLimits::new(2.0, 5))
            .with_tier("pro", TierLimits::new(20.0, 40))
            .with_tier("enterprise", TierLimits::new(100.0, 200))
    }

    /// A table holding exactly one tier
    pub fn single(name: impl Into<String>, limits: TierLimits) -> Self {
        TierTable::new().with_tier(name, limits)
    }

    /// Add (or replace) a tier
    pub fn with_tier(mut self, name: impl Into<String>, limits: TierLimits) -> Self {
        self.tiers.insert(name.into(), limits);
        self
    }

    /// Limits for a tier, if the table defines it
    pub fn get(&self, name: &str) -> Option<TierLimits> {
        self.tiers.get(name).copied()
    }

    /// Limits for a tier, unconfigured when the table does not define it
    pub fn limits_for(&self, name: &str) -> TierLimits {
        self.get(name).unwrap_or(TierLimits::UNCONFIGURED)
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// All tiers, sorted by name
    pub fn specs(&self) -> Vec<TierSpec> {
        let mut specs: Vec<TierSpec> = self
            .tiers
            .iter()
            .map(|(name, limits)| TierSpec {
                name: name.clone(),
                limits: *limits,
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }
}

impl FromIterator<TierSpec> for TierTable {
    fn from_iter<I: IntoIterator<Item = TierSpec>>(iter: I) -> Self {
        iter.into_iter()
            .fold(TierTable::new(), |table, spec| table.with_tier(spec.name, spec.limits))
    }
}
