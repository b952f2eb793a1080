use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use covgate_channel::{ChannelRegistry, DynChannel, RateLimits, TokenBucketLimiter};
use covgate_core::{Clock, EventType, SystemClock};

use crate::aggregator::{Aggregator, AggregatorConfig, AggregatorSet, FlushFn};
use crate::config::ProcessorConfig;
use crate::dedup::Deduplicator;
use crate::filter::Filter;
use crate::history::EventHistory;
use crate::processor::{EventProcessor, Inner};
use crate::retry::RetryPolicy;
use crate::stats::ProcessorMetrics;
use crate::subscriber::Subscriber;

/// Fluent builder for constructing an [`EventProcessor`].
///
/// Everything has a default: an empty channel set, no filters, no
/// subscribers, the documented default configuration, and the system
/// clock. Channels, filters, and subscribers can also be registered after
/// construction.
pub struct ProcessorBuilder {
    config: ProcessorConfig,
    clock: Arc<dyn Clock>,
    channels: Vec<Arc<dyn DynChannel>>,
    filters: Vec<Arc<dyn Filter>>,
    subscribers: Vec<Arc<dyn Subscriber>>,
    aggregator_configs: Vec<AggregatorConfig>,
}

impl ProcessorBuilder {
    /// Create a builder with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            clock: Arc::new(SystemClock),
            channels: Vec::new(),
            filters: Vec::new(),
            subscribers: Vec::new(),
            aggregator_configs: Vec::new(),
        }
    }

    /// Override the processor configuration.
    #[must_use]
    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject a clock. Defaults to the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a delivery channel.
    #[must_use]
    pub fn channel(mut self, channel: Arc<dyn DynChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Register a filter; filters run in registration order.
    #[must_use]
    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Register a subscriber.
    #[must_use]
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Replace the default aggregators with a custom configuration.
    ///
    /// Without this, one aggregator per aggregatable event type
    /// (`threshold`, `regression`) is installed using the configured
    /// window and batch bounds.
    #[must_use]
    pub fn aggregator(mut self, config: AggregatorConfig) -> Self {
        self.aggregator_configs.push(config);
        self
    }

    /// Consume the builder and start the processor's background tasks.
    #[must_use]
    pub fn build(self) -> EventProcessor {
        let now = self.clock.now();

        let mut registry = ChannelRegistry::new();
        for channel in self.channels {
            registry.register(channel, now);
        }

        let history = Arc::new(EventHistory::new(self.config.max_event_history));
        let dedup = Deduplicator::new(Arc::clone(&history), self.config.deduplication_window);

        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_depth);
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();

        // Aggregators hand synthesized events back through this callback;
        // they never hold a reference to the processor itself.
        let flush_fn: FlushFn = Arc::new(move |event| {
            let _ = flush_tx.send(event);
        });

        let aggregators = AggregatorSet::new();
        let configs = if self.aggregator_configs.is_empty() {
            vec![
                AggregatorConfig::for_event_type(
                    EventType::Threshold,
                    self.config.aggregation_window,
                    self.config.min_events_for_batch,
                    self.config.max_events_per_batch,
                ),
                AggregatorConfig::for_event_type(
                    EventType::Regression,
                    self.config.aggregation_window,
                    self.config.min_events_for_batch,
                    self.config.max_events_per_batch,
                ),
            ]
        } else {
            self.aggregator_configs
        };
        for config in configs {
            aggregators.insert(Arc::new(Aggregator::new(config, Arc::clone(&flush_fn))));
        }

        let retry_policy = RetryPolicy::new(self.config.retry_delay);

        // Processor-wide hourly budget. Only the hour bucket binds; the
        // minute and day capacities are sized so they never do.
        let hourly = self.config.rate_limit_per_hour;
        let hourly_limiter = TokenBucketLimiter::new(
            RateLimits {
                per_minute: hourly,
                per_hour: hourly,
                per_day: hourly.saturating_mul(24),
                burst: hourly,
            },
            now,
        );

        let inner = Arc::new(Inner {
            config: self.config,
            clock: self.clock,
            registry: RwLock::new(registry),
            filters: RwLock::new(self.filters),
            subscribers: RwLock::new(self.subscribers),
            history,
            dedup,
            aggregators,
            metrics: ProcessorMetrics::default(),
            retry_policy,
            hourly_limiter,
            queue_tx,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        });

        EventProcessor::from_inner(inner, queue_rx, flush_rx)
    }
}

impl Default for ProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_with_defaults() {
        let processor = ProcessorBuilder::new().build();
        assert!(processor.history().is_empty());
        let stats = processor.stats();
        assert_eq!(stats.published, 0);
        processor.stop().await;
    }

    #[tokio::test]
    async fn publish_after_stop_fails() {
        let processor = ProcessorBuilder::new().build();
        processor.stop().await;

        let event = covgate_core::CoverageEvent::new(EventType::Generic, "org/repo");
        let err = processor.publish(event).unwrap_err();
        assert!(matches!(err, crate::error::PublishError::Stopped));
    }
}
