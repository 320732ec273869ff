//! Token-bucket arithmetic for a single key

use super::TierLimits;
use std::time::{Duration, Instant};

/// Per-key bucket state
///
/// `tokens` stays within `0..=burst`. Fractions are kept between calls so
/// that sub-second gaps between requests still earn their share of a token.
#[derive(Debug, Clone)]
pub(crate) struct Bucket {
    tokens: f64,
    last_refill: Instant,
    limits: TierLimits,
}

impl Bucket {
    /// Open a bucket for a key seen for the first time
    ///
    /// The request that opens the bucket is always admitted and charged
    /// straight away, so the bucket starts at `burst - 1`. A zero-capacity
    /// tier still admits this first request and starts empty.
    pub(crate) fn open(limits: TierLimits, now: Instant) -> Self {
        let tokens = (f64::from(limits.burst()) - 1.0).max(0.0);

        Bucket {
            tokens,
            last_refill: now,
            limits,
        }
    }

    /// Refill for the time elapsed since the last refill, then take one token if possible
    pub(crate) fn try_take(&mut self, limits: TierLimits, now: Instant) -> bool {
        self.limits = limits;
        self.refill(now);

        if self.tokens < 1.0 {
            return false;
        }

        self.tokens -= 1.0;
        true
    }

    fn refill(&mut self, now: Instant) {
        let burst = f64::from(self.limits.burst());
        // A `now` older than the last refill earns nothing and never moves the clock back
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let earned = if elapsed > 0.0 {
            elapsed * self.limits.rate()
        } else {
            0.0
        };

        self.tokens = (self.tokens + earned).min(burst);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    /// Whether the bucket has sat untouched for `idle_timeout` and would be full by `now`
    ///
    /// Dropping such a bucket is invisible to clients: a re-opened bucket
    /// admits and lands on `burst - 1`, exactly like a full one. Zero-capacity
    /// buckets are never idle, since re-opening one would admit again.
    pub(crate) fn is_idle(&self, now: Instant, idle_timeout: Duration) -> bool {
        if self.limits.burst() == 0 {
            return false;
        }

        let idle = now.saturating_duration_since(self.last_refill);
        if idle.is_zero() || idle < idle_timeout {
            return false;
        }

        let burst = f64::from(self.limits.burst());
        self.tokens + idle.as_secs_f64() * self.limits.rate() >= burst
    }

    pub(crate) fn tokens(&self) -> f64 {
        self.tokens
    }

    #[cfg(test)]
    pub(crate) fn last_refill(&self) -> Instant {
        self.last_refill
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_charges_first_request() {
        let now = Instant::now();
        let bucket = Bucket::open(TierLimits::new(1.0, 5), now);
        assert_eq!(bucket.tokens(), 4.0);
        assert_eq!(bucket.last_refill(), now);
    }

    #[test]
    fn test_zero_capacity_admits_only_the_opening_request() {
        let limits = TierLimits::new(5.0, 0);
        let now = Instant::now();
        let mut bucket = Bucket::open(limits, now);
        assert_eq!(bucket.tokens(), 0.0);

        // Refill is clamped to a capacity of zero
        assert!(!bucket.try_take(limits, now));
        assert!(!bucket.try_take(limits, now + Duration::from_secs(60)));
        assert_eq!(bucket.tokens(), 0.0);
    }

    #[test]
    fn test_fractional_tokens_accumulate() {
        let limits = TierLimits::new(1.0, 1);
        let now = Instant::now();
        let mut bucket = Bucket::open(limits, now);

        // Half a token is not enough
        assert!(!bucket.try_take(limits, now + Duration::from_millis(500)));
        assert!((bucket.tokens() - 0.5).abs() < 1e-9);

        // The other half arrives later and the saved fraction is not lost
        assert!(bucket.try_take(limits, now + Duration::from_millis(1000)));
        assert!(bucket.tokens().abs() < 1e-9);
    }

    #[test]
    fn test_exactly_one_token_admits() {
        let limits = TierLimits::new(4.0, 2);
        let now = Instant::now();
        let mut bucket = Bucket::open(limits, now);
        assert!(bucket.try_take(limits, now));
        assert_eq!(bucket.tokens(), 0.0);

        // 250ms at 4/s is exactly one token
        assert!(bucket.try_take(limits, now + Duration::from_millis(250)));
    }

    #[test]
    fn test_refill_is_clamped_to_burst() {
        let limits = TierLimits::new(100.0, 3);
        let now = Instant::now();
        let mut bucket = Bucket::open(limits, now);

        assert!(bucket.try_take(limits, now + Duration::from_secs(3600)));
        assert_eq!(bucket.tokens(), 2.0);
    }

    #[test]
    fn test_clock_never_moves_back() {
        let limits = TierLimits::new(1.0, 2);
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        let mut bucket = Bucket::open(limits, later);

        assert!(bucket.try_take(limits, now));
        assert_eq!(bucket.last_refill(), later);
        assert!(!bucket.try_take(limits, now));
        assert_eq!(bucket.tokens(), 0.0);
    }

    #[test]
    fn test_infinite_rate_refills_to_burst() {
        let limits = TierLimits::new(f64::INFINITY, 2);
        let now = Instant::now();
        let mut bucket = Bucket::open(limits, now);
        assert!(bucket.try_take(limits, now));
        assert!(!bucket.try_take(limits, now));
        assert!(bucket.try_take(limits, now + Duration::from_nanos(1)));
        assert_eq!(bucket.tokens(), 1.0);
    }

    #[test]
    fn test_idle_requires_timeout_and_full_refill() {
        let limits = TierLimits::new(1.0, 10);
        let now = Instant::now();
        let bucket = Bucket::open(limits, now);

        // Full after one second, but the timeout has not passed yet
        assert!(!bucket.is_idle(now + Duration::from_secs(5), Duration::from_secs(10)));
        assert!(bucket.is_idle(now + Duration::from_secs(10), Duration::from_secs(10)));

        // Slow refill keeps the bucket even after the timeout
        let slow = TierLimits::new(0.01, 10);
        let mut bucket = Bucket::open(slow, now);
        for _ in 0..9 {
            assert!(bucket.try_take(slow, now));
        }
        assert!(!bucket.is_idle(now + Duration::from_secs(60), Duration::from_secs(30)));
        assert!(bucket.is_idle(now + Duration::from_secs(2000), Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_capacity_bucket_is_never_idle() {
        let limits = TierLimits::new(5.0, 0);
        let now = Instant::now();
        let bucket = Bucket::open(limits, now);
        assert!(!bucket.is_idle(now + Duration::from_secs(86_400), Duration::from_secs(1)));
    }
}
