use std::time::Duration;

/// Configuration for the [`EventProcessor`](crate::EventProcessor).
///
/// All values can be overridden; `Default` yields the documented defaults.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Maximum number of events retained in history.
    pub max_event_history: usize,
    /// Entries older than this are removed by the retention sweep.
    pub event_retention: Duration,
    /// Window within which events with a matching key tuple are duplicates.
    pub deduplication_window: Duration,
    /// Whether aggregatable event types are batched.
    pub aggregation_enabled: bool,
    /// Time window for aggregation batches.
    pub aggregation_window: Duration,
    /// Minimum batch size; smaller batches are discarded at window flush.
    pub min_events_for_batch: usize,
    /// Maximum batch size; reaching it flushes immediately.
    pub max_events_per_batch: usize,
    /// Maximum number of events processed concurrently.
    pub max_concurrent_events: usize,
    /// Per-send deadline for channel deliveries.
    pub event_timeout: Duration,
    /// Number of retries after the first delivery attempt.
    pub retry_attempts: u32,
    /// Initial delay for the exponential retry backoff.
    pub retry_delay: Duration,
    /// Whether per-channel token buckets are enforced.
    pub enable_rate_limiting: bool,
    /// Processor-wide hourly delivery budget hint, recorded in stats.
    pub rate_limit_per_hour: u32,
    /// Depth of the bounded publish queue.
    pub queue_depth: usize,
    /// How often the retention/aggregation sweep runs.
    pub sweep_interval: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_event_history: 1000,
            event_retention: Duration::from_secs(24 * 3600),
            deduplication_window: Duration::from_secs(5 * 60),
            aggregation_enabled: true,
            aggregation_window: Duration::from_secs(10 * 60),
            min_events_for_batch: 3,
            max_events_per_batch: 50,
            max_concurrent_events: 10,
            event_timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(60),
            enable_rate_limiting: true,
            rate_limit_per_hour: 100,
            queue_depth: 100,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ProcessorConfig::default();
        assert_eq!(cfg.max_event_history, 1000);
        assert_eq!(cfg.event_retention, Duration::from_secs(86_400));
        assert_eq!(cfg.deduplication_window, Duration::from_secs(300));
        assert!(cfg.aggregation_enabled);
        assert_eq!(cfg.aggregation_window, Duration::from_secs(600));
        assert_eq!(cfg.min_events_for_batch, 3);
        assert_eq!(cfg.max_events_per_batch, 50);
        assert_eq!(cfg.max_concurrent_events, 10);
        assert_eq!(cfg.event_timeout, Duration::from_secs(30));
        assert_eq!(cfg.retry_attempts, 3);
        assert_eq!(cfg.retry_delay, Duration::from_secs(60));
        assert!(cfg.enable_rate_limiting);
        assert_eq!(cfg.rate_limit_per_hour, 100);
        assert_eq!(cfg.queue_depth, 100);
    }
}
