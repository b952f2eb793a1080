//! Per-channel token-bucket rate limiting.
//!
//! Every channel carries minute/hour/day quotas plus a burst counter.
//! Admission requires a token in each of the three quota buckets; a grant
//! consumes one token from each. Refill is continuous (fractional tokens)
//! against wall time, capped at bucket capacity. The burst counter tracks
//! the size of the current send burst and does not gate admission.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Per-channel delivery quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    /// Maximum sends per minute.
    pub per_minute: u32,
    /// Maximum sends per hour.
    pub per_hour: u32,
    /// Maximum sends per day.
    pub per_day: u32,
    /// Short-term burst allowance.
    pub burst: u32,
}

impl RateLimits {
    /// Default quotas for chat-webhook channels.
    #[must_use]
    pub fn chat_webhook() -> Self {
        Self {
            per_minute: 60,
            per_hour: 3600,
            per_day: 86_400,
            burst: 10,
        }
    }

    /// Default quotas for generic webhook channels.
    #[must_use]
    pub fn webhook() -> Self {
        Self::chat_webhook()
    }

    /// Default quotas for email channels.
    #[must_use]
    pub fn email() -> Self {
        Self {
            per_minute: 10,
            per_hour: 300,
            per_day: 2000,
            burst: 3,
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::webhook()
    }
}

/// Outcome of a rate-limit acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A token was consumed from all three quota buckets; the send may
    /// proceed.
    Granted,
    /// At least one quota bucket is empty.
    Denied {
        /// Time until all three buckets hold a token again.
        retry_after: Duration,
    },
}

impl Admission {
    /// Whether the send was admitted.
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// One continuously refilling token bucket.
#[derive(Debug)]
struct Bucket {
    capacity: f64,
    /// Tokens regained per second.
    rate: f64,
    tokens: f64,
}

impl Bucket {
    fn new(capacity: u32, window: Duration) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            rate: capacity / window.as_secs_f64(),
            tokens: capacity,
        }
    }

    fn refill(&mut self, elapsed: Duration) {
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.rate).min(self.capacity);
    }

    fn has_token(&self) -> bool {
        self.tokens >= 1.0
    }

    /// Time until this bucket holds at least one token.
    ///
    /// Rounded up by a millisecond so a caller sleeping exactly this long
    /// cannot land short of the token due to float rounding.
    fn time_to_token(&self) -> Duration {
        if self.has_token() {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate + 0.001)
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    buckets: [Bucket; 3],
    last_refill: DateTime<Utc>,
    /// Grants inside the current minute window.
    burst: u32,
    burst_window_start: DateTime<Utc>,
}

/// Thread-safe token-bucket limiter for one channel.
///
/// [`acquire`](Self::acquire) never blocks or sleeps; on denial it reports
/// how long the caller should wait before trying again.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    limits: RateLimits,
    state: Mutex<LimiterState>,
}

impl TokenBucketLimiter {
    /// Create a limiter with full buckets as of `now`.
    #[must_use]
    pub fn new(limits: RateLimits, now: DateTime<Utc>) -> Self {
        let buckets = [
            Bucket::new(limits.per_minute, Duration::from_secs(60)),
            Bucket::new(limits.per_hour, Duration::from_secs(3600)),
            Bucket::new(limits.per_day, Duration::from_secs(86_400)),
        ];
        Self {
            limits,
            state: Mutex::new(LimiterState {
                buckets,
                last_refill: now,
                burst: 0,
                burst_window_start: now,
            }),
        }
    }

    /// The quotas this limiter enforces.
    #[must_use]
    pub fn limits(&self) -> RateLimits {
        self.limits
    }

    /// Attempt to consume one send's worth of tokens.
    ///
    /// A send is permitted only if all three quota buckets hold a token;
    /// a grant decrements all three. On denial, `retry_after` is the
    /// minimum time to the next admissible instant, i.e. until the most
    /// depleted bucket recovers a token.
    pub fn acquire(&self, now: DateTime<Utc>) -> Admission {
        let mut state = self.state.lock();

        let elapsed = (now - state.last_refill)
            .to_std()
            .unwrap_or(Duration::ZERO);
        for bucket in &mut state.buckets {
            bucket.refill(elapsed);
        }
        state.last_refill = now;

        if state.buckets.iter().all(Bucket::has_token) {
            for bucket in &mut state.buckets {
                bucket.tokens -= 1.0;
            }
            if now - state.burst_window_start >= chrono::Duration::seconds(60) {
                state.burst = 0;
                state.burst_window_start = now;
            }
            state.burst += 1;
            Admission::Granted
        } else {
            let retry_after = state
                .buckets
                .iter()
                .map(Bucket::time_to_token)
                .max()
                .unwrap_or(Duration::ZERO);
            Admission::Denied { retry_after }
        }
    }

    /// Size of the current send burst (grants within the current minute
    /// window). Informational; admission is decided by the quota buckets.
    #[must_use]
    pub fn current_burst(&self) -> u32 {
        self.state.lock().burst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(per_minute: u32, burst: u32) -> RateLimits {
        RateLimits {
            per_minute,
            per_hour: 3600,
            per_day: 86_400,
            burst,
        }
    }

    #[test]
    fn defaults() {
        let chat = RateLimits::chat_webhook();
        assert_eq!(chat.per_minute, 60);
        assert_eq!(chat.burst, 10);
        let email = RateLimits::email();
        assert_eq!(email.per_minute, 10);
        assert_eq!(email.per_day, 2000);
        assert_eq!(email.burst, 3);
    }

    #[test]
    fn quota_admits_then_denies() {
        let now = Utc::now();
        let limiter = TokenBucketLimiter::new(limits(2, 10), now);

        assert!(limiter.acquire(now).is_granted());
        assert!(limiter.acquire(now).is_granted());

        // The burst allowance of 10 does not override the minute quota.
        match limiter.acquire(now) {
            Admission::Denied { retry_after } => {
                assert!(retry_after > Duration::ZERO);
            }
            Admission::Granted => panic!("third acquire should be denied"),
        }
    }

    #[test]
    fn burst_counter_does_not_gate() {
        let now = Utc::now();
        let limiter = TokenBucketLimiter::new(limits(10, 2), now);

        // Five rapid grants exceed the burst figure; only the three quota
        // buckets decide admission.
        for _ in 0..5 {
            assert!(limiter.acquire(now).is_granted());
        }
        assert_eq!(limiter.current_burst(), 5);
    }

    #[test]
    fn burst_counter_resets_each_minute_window() {
        let now = Utc::now();
        let limiter = TokenBucketLimiter::new(limits(10, 2), now);

        assert!(limiter.acquire(now).is_granted());
        assert!(limiter.acquire(now).is_granted());
        assert_eq!(limiter.current_burst(), 2);

        let later = now + chrono::Duration::seconds(61);
        assert!(limiter.acquire(later).is_granted());
        assert_eq!(limiter.current_burst(), 1);
    }

    #[test]
    fn refill_restores_admission() {
        let now = Utc::now();
        let limiter = TokenBucketLimiter::new(limits(2, 2), now);

        assert!(limiter.acquire(now).is_granted());
        assert!(limiter.acquire(now).is_granted());
        assert!(!limiter.acquire(now).is_granted());

        // After a full minute the minute bucket has regained capacity.
        let later = now + chrono::Duration::seconds(60);
        assert!(limiter.acquire(later).is_granted());
    }

    #[test]
    fn retry_after_covers_slowest_bucket() {
        let now = Utc::now();
        let limiter = TokenBucketLimiter::new(limits(2, 2), now);
        limiter.acquire(now);
        limiter.acquire(now);

        let Admission::Denied { retry_after } = limiter.acquire(now) else {
            panic!("expected denial");
        };
        // Minute bucket: rate 2/60 tokens per second, so one token in ~30s.
        assert!(retry_after >= Duration::from_secs(29));
        assert!(retry_after <= Duration::from_secs(31));

        // Acquiring at exactly the reported instant succeeds.
        let at = now + chrono::Duration::from_std(retry_after).unwrap();
        assert!(limiter.acquire(at).is_granted());
    }

    #[test]
    fn fractional_refill_is_continuous() {
        let now = Utc::now();
        let limiter = TokenBucketLimiter::new(limits(2, 2), now);

        assert!(limiter.acquire(now).is_granted());
        assert!(limiter.acquire(now).is_granted());
        assert!(!limiter.acquire(now).is_granted());

        // Half a minute refills one fractional token; admission resumes
        // before the window fully elapses.
        let later = now + chrono::Duration::seconds(31);
        assert!(limiter.acquire(later).is_granted());
    }

    #[test]
    fn tokens_cap_at_capacity() {
        let now = Utc::now();
        let limiter = TokenBucketLimiter::new(limits(2, 2), now);

        // A long idle period must not bank more than the per-minute quota.
        let later = now + chrono::Duration::hours(1);
        assert!(limiter.acquire(later).is_granted());
        assert!(limiter.acquire(later).is_granted());
        assert!(!limiter.acquire(later).is_granted());
    }
}
