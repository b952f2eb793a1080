use std::time::Duration;

/// Exponential backoff with deterministic jitter for delivery retries.
///
/// The delay for attempt `n` is `base * 2^n`, adjusted by a jitter factor
/// cycling through `[0.75, 1.25]` so concurrent retries spread out without
/// a random number generator, and clamped to `max`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on any computed delay.
    pub max: Duration,
    /// Whether the jitter factor is applied.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Create a policy with the given base delay, capped at 30x the base.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: base * 30,
            jitter: true,
        }
    }

    /// Compute the delay for the given zero-based retry attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let raw = self.base.as_secs_f64() * 2f64.powi(i32::try_from(exponent).unwrap_or(16));

        let adjusted = if self.jitter {
            // Five-step deterministic cycle over [0.75, 1.25].
            let step = f64::from(attempt % 5) / 4.0;
            raw * (0.75 + 0.5 * step)
        } else {
            raw
        };

        Duration::from_secs_f64(adjusted.min(self.max.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
