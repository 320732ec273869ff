//! Token-bucket registry
//!
//! This module provides [`LimiterRegistry`], the owner of every bucket. A
//! single mutex covers both the lookup/insert of a bucket and the
//! refill-check-consume on it, so concurrent requests for the same key can
//! never spend the same token twice.

use super::bucket::Bucket;
use super::{BucketKey, TierLimits};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

// Configuration constants
const DEFAULT_CAPACITY: usize = 1000;
const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Outcome of a single admission check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Tokens left in the bucket after this check
    pub remaining: f64,
}

/// Owner of all token buckets, keyed by `(tier, client)`
///
/// # Example
///
/// ```
/// use tiergate::{BucketKey, LimiterRegistry, TierLimits};
/// use std::time::Instant;
///
/// let registry = LimiterRegistry::new();
/// let limits = TierLimits::new(1.0, 2);
/// let key = BucketKey::new("free", "198.51.100.4");
/// let now = Instant::now();
///
/// assert!(registry.check(key, limits, now).allowed);
/// assert!(registry.check(key, limits, now).allowed);
/// assert!(!registry.check(key, limits, now).allowed);
/// ```
pub struct LimiterRegistry {
    state: Mutex<Buckets>,
}

/// Builder for configuring a [`LimiterRegistry`]
///
/// # Example
///
/// ```
/// use tiergate::LimiterRegistry;
/// use std::time::Duration;
///
/// let registry = LimiterRegistry::builder()
///     .capacity(50_000)
///     .idle_timeout(Duration::from_secs(300))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct LimiterRegistryBuilder {
    capacity: usize,
    idle_timeout: Option<Duration>,
    sweep_interval: Duration,
}

struct Buckets {
    // tier -> client -> bucket
    tiers: HashMap<String, HashMap<String, Bucket>>,
    capacity: usize,
    idle_timeout: Option<Duration>,
    sweep_interval: Duration,
    next_sweep: Option<Instant>,
    evicted_total: u64,
}

impl LimiterRegistry {
    /// Create a registry that keeps buckets forever
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new builder for configuring a registry
    pub fn builder() -> LimiterRegistryBuilder {
        LimiterRegistryBuilder::default()
    }

    /// Check and consume one token for `key`
    ///
    /// The first request for a key opens its bucket at `burst - 1` tokens and
    /// is admitted. Later requests refill the bucket for the time elapsed
    /// since the previous one (capped at `burst`) and are admitted only if a
    /// whole token is available.
    pub fn check(&self, key: BucketKey<'_>, limits: TierLimits, now: Instant) -> Admission {
        let mut state = self.state.lock();
        state.maybe_sweep(now);
        state.admit(key, limits, now)
    }

    /// Number of live buckets across all tiers
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict idle buckets right away
    ///
    /// Returns the number of buckets removed. Always `0` when no idle
    /// timeout is configured.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut state = self.state.lock();
        match state.idle_timeout {
            Some(idle_timeout) => state.sweep_idle(now, idle_timeout),
            None => 0,
        }
    }

    /// Buckets evicted since the registry was created
    pub fn evicted_total(&self) -> u64 {
        self.state.lock().evicted_total
    }

    /// Configured idle timeout, if eviction is enabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.state.lock().idle_timeout
    }

    /// Tokens currently held by `key`, without refilling
    #[cfg(test)]
    pub(crate) fn tokens(&self, key: BucketKey<'_>) -> Option<f64> {
        let state = self.state.lock();
        state
            .tiers
            .get(key.tier)
            .and_then(|clients| clients.get(key.client))
            .map(Bucket::tokens)
    }
}

impl Default for LimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Buckets {
    fn admit(&mut self, key: BucketKey<'_>, limits: TierLimits, now: Instant) -> Admission {
        match self.tiers.get_mut(key.tier) {
            Some(clients) => admit_client(clients, key.client, limits, now),
            None => {
                let mut clients = HashMap::with_capacity(
                    (self.capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize,
                );
                let admission = admit_client(&mut clients, key.client, limits, now);
                self.tiers.insert(key.tier.to_string(), clients);
                admission
            }
        }
    }

    fn len(&self) -> usize {
        self.tiers.values().map(|clients| clients.len()).sum()
    }

    fn maybe_sweep(&mut self, now: Instant) {
        let Some(idle_timeout) = self.idle_timeout else {
            return;
        };

        match self.next_sweep {
            Some(at) if now < at => {}
            Some(_) => {
                self.sweep_idle(now, idle_timeout);
                self.next_sweep = Some(now + self.sweep_interval);
            }
            None => self.next_sweep = Some(now + self.sweep_interval),
        }
    }

    fn sweep_idle(&mut self, now: Instant, idle_timeout: Duration) -> usize {
        let mut evicted = 0;
        self.tiers.retain(|_, clients| {
            let before = clients.len();
            clients.retain(|_, bucket| !bucket.is_idle(now, idle_timeout));
            evicted += before - clients.len();
            !clients.is_empty()
        });
        self.evicted_total += evicted as u64;
        evicted
    }
}

fn admit_client(
    clients: &mut HashMap<String, Bucket>,
    client: &str,
    limits: TierLimits,
    now: Instant,
) -> Admission {
    match clients.get_mut(client) {
        Some(bucket) => {
            let allowed = bucket.try_take(limits, now);
            Admission {
                allowed,
                remaining: bucket.tokens(),
            }
        }
        None => {
            let bucket = Bucket::open(limits, now);
            let remaining = bucket.tokens();
            clients.insert(client.to_string(), bucket);
            Admission {
                allowed: true,
                remaining,
            }
        }
    }
}

impl Default for LimiterRegistryBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            idle_timeout: None,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl LimiterRegistryBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expected number of clients per tier
    ///
    /// Each tier's map is allocated 30% larger to reduce rehashing.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Enable eviction of buckets idle for at least `timeout`
    ///
    /// A bucket is only evicted once its refill would also have filled it
    /// back to `burst`, so eviction never changes an admission outcome.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the interval between idle sweeps (default 60 seconds)
    ///
    /// Sweeps run lazily during [`LimiterRegistry::check`]. Has no effect
    /// without an idle timeout.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Build the registry with the configured settings
    pub fn build(self) -> LimiterRegistry {
        LimiterRegistry {
            state: Mutex::new(Buckets {
                tiers: HashMap::new(),
                capacity: self.capacity,
                idle_timeout: self.idle_timeout,
                sweep_interval: self.sweep_interval,
                next_sweep: None,
                evicted_total: 0,
            }),
        }
    }
}
