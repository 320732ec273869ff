//! Simple metrics collection for observability
//!
//! Lightweight counters built on atomics. The per-tier counters are created
//! up front from the tier table, so recording a decision never allocates or
//! takes a lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tiergate::{Decision, LimiterRegistry, TierTable};

/// Allow/deny counters for one configured tier
#[derive(Default)]
pub struct TierCounters {
    pub allowed: AtomicU64,
    pub denied: AtomicU64,
}

/// Core metrics collected by the server
pub struct Metrics {
    /// Server start time
    start_time: Instant,

    /// Total requests checked
    pub total_requests: AtomicU64,

    /// Decisions
    pub requests_allowed: AtomicU64,
    pub requests_denied: AtomicU64,
    pub requests_unmetered: AtomicU64,
    pub requests_unconfigured: AtomicU64,

    /// Decisions by tier, keyed by tier name
    tiers: BTreeMap<String, TierCounters>,
}

impl Metrics {
    /// Create a metrics instance without per-tier counters
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            requests_allowed: AtomicU64::new(0),
            requests_denied: AtomicU64::new(0),
            requests_unmetered: AtomicU64::new(0),
            requests_unconfigured: AtomicU64::new(0),
            tiers: BTreeMap::new(),
        }
    }

    /// Create a metrics instance with counters for every tier in the table
    pub fn for_tiers(tiers: &TierTable) -> Self {
        let mut metrics = Self::new();
        metrics.tiers = tiers
            .specs()
            .into_iter()
            .map(|spec| (spec.name, TierCounters::default()))
            .collect();
        metrics
    }

    /// Record the outcome of one check
    pub fn record_decision(&self, decision: &Decision<'_>) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        match decision {
            Decision::Unmetered => {
                self.requests_unmetered.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Unconfigured { .. } => {
                self.requests_unconfigured.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Allowed { key, .. } => {
                self.requests_allowed.fetch_add(1, Ordering::Relaxed);
                if let Some(counters) = self.tiers.get(key.tier) {
                    counters.allowed.fetch_add(1, Ordering::Relaxed);
                }
            }
            Decision::Denied { key, .. } => {
                self.requests_denied.fetch_add(1, Ordering::Relaxed);
                if let Some(counters) = self.tiers.get(key.tier) {
                    counters.denied.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Counters for one tier, if it was configured
    pub fn tier(&self, name: &str) -> Option<&TierCounters> {
        self.tiers.get(name)
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    ///
    /// Bucket gauges are read from `registry` at call time.
    pub fn export_prometheus(&self, registry: &LimiterRegistry) -> String {
        let mut output = String::with_capacity(1500 + self.tiers.len() * 120);

        output.push_str("# HELP tiergate_uptime_seconds Time since server start in seconds\n");
        output.push_str("# TYPE tiergate_uptime_seconds gauge\n");
        output.push_str(&format!(
            "tiergate_uptime_seconds {}\n\n",
            self.uptime_seconds()
        ));

        output.push_str("# HELP tiergate_requests_total Total number of requests checked\n");
        output.push_str("# TYPE tiergate_requests_total counter\n");
        output.push_str(&format!(
            "tiergate_requests_total {}\n\n",
            self.total_requests.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP tiergate_requests_allowed Total metered requests allowed\n");
        output.push_str("# TYPE tiergate_requests_allowed counter\n");
        output.push_str(&format!(
            "tiergate_requests_allowed {}\n\n",
            self.requests_allowed.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP tiergate_requests_denied Total requests denied\n");
        output.push_str("# TYPE tiergate_requests_denied counter\n");
        output.push_str(&format!(
            "tiergate_requests_denied {}\n\n",
            self.requests_denied.load(Ordering::Relaxed)
        ));

        output.push_str(
            "# HELP tiergate_requests_unmetered Total requests the policy did not meter\n",
        );
        output.push_str("# TYPE tiergate_requests_unmetered counter\n");
        output.push_str(&format!(
            "tiergate_requests_unmetered {}\n\n",
            self.requests_unmetered.load(Ordering::Relaxed)
        ));

        output.push_str(
            "# HELP tiergate_requests_unconfigured Total requests in tiers without limits\n",
        );
        output.push_str("# TYPE tiergate_requests_unconfigured counter\n");
        output.push_str(&format!(
            "tiergate_requests_unconfigured {}\n\n",
            self.requests_unconfigured.load(Ordering::Relaxed)
        ));

        if !self.tiers.is_empty() {
            output.push_str("# HELP tiergate_tier_requests_allowed Requests allowed by tier\n");
            output.push_str("# TYPE tiergate_tier_requests_allowed counter\n");
            for (name, counters) in &self.tiers {
                output.push_str(&format!(
                    "tiergate_tier_requests_allowed{{tier=\"{}\"}} {}\n",
                    name,
                    counters.allowed.load(Ordering::Relaxed)
                ));
            }
            output.push('\n');

            output.push_str("# HELP tiergate_tier_requests_denied Requests denied by tier\n");
            output.push_str("# TYPE tiergate_tier_requests_denied counter\n");
            for (name, counters) in &self.tiers {
                output.push_str(&format!(
                    "tiergate_tier_requests_denied{{tier=\"{}\"}} {}\n",
                    name,
                    counters.denied.load(Ordering::Relaxed)
                ));
            }
            output.push('\n');
        }

        // Registry state
        output.push_str("# HELP tiergate_active_buckets Number of live token buckets\n");
        output.push_str("# TYPE tiergate_active_buckets gauge\n");
        output.push_str(&format!("tiergate_active_buckets {}\n\n", registry.len()));

        output.push_str("# HELP tiergate_bucket_evictions Total number of idle buckets evicted\n");
        output.push_str("# TYPE tiergate_bucket_evictions counter\n");
        output.push_str(&format!(
            "tiergate_bucket_evictions {}\n",
            registry.evicted_total()
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
