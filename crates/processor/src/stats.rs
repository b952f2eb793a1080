//! Processor counters.
//!
//! Counters are lock-free `AtomicU64`s bumped from hot paths; snapshots
//! are taken with relaxed loads since exact cross-counter consistency is
//! not required.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

/// Per-channel delivery counters.
#[derive(Debug, Default)]
pub struct ChannelCounters {
    sent: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    rate_limited: AtomicU64,
}

impl ChannelCounters {
    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of one channel's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    /// Successful deliveries.
    pub sent: u64,
    /// Deliveries that exhausted their retry budget.
    pub failed: u64,
    /// Retry attempts made.
    pub retried: u64,
    /// Rate-limit denials observed.
    pub rate_limited: u64,
}

/// Shared counters for the whole processor.
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    published: AtomicU64,
    filtered: AtomicU64,
    duplicates: AtomicU64,
    queue_full: AtomicU64,
    processed: AtomicU64,
    aggregated: AtomicU64,
    build_errors: AtomicU64,
    subscriber_errors: AtomicU64,
    channels: RwLock<HashMap<String, Arc<ChannelCounters>>>,
}

impl ProcessorMetrics {
    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queue_full(&self) {
        self.queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_aggregated(&self) {
        self.aggregated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_build_error(&self) {
        self.build_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_subscriber_error(&self) {
        self.subscriber_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters for a channel, created on first use.
    pub(crate) fn channel(&self, name: &str) -> Arc<ChannelCounters> {
        if let Some(counters) = self.channels.read().get(name) {
            return Arc::clone(counters);
        }
        let mut channels = self.channels.write();
        Arc::clone(
            channels
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(ChannelCounters::default())),
        )
    }

    /// Take a point-in-time snapshot of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let channels = self
            .channels
            .read()
            .iter()
            .map(|(name, counters)| (name.clone(), counters.snapshot()))
            .collect();
        StatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            aggregated: self.aggregated.load(Ordering::Relaxed),
            build_errors: self.build_errors.load(Ordering::Relaxed),
            subscriber_errors: self.subscriber_errors.load(Ordering::Relaxed),
            channels,
        }
    }
}

/// Point-in-time view of all processor counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    /// Events accepted by `publish`.
    pub published: u64,
    /// Events rejected by filters.
    pub filtered: u64,
    /// Events rejected as duplicates.
    pub duplicates: u64,
    /// Publishes rejected because the queue was full.
    pub queue_full: u64,
    /// Events that completed the worker pipeline.
    pub processed: u64,
    /// Events handed to an aggregator.
    pub aggregated: u64,
    /// Notification build failures.
    pub build_errors: u64,
    /// Subscriber callbacks that returned an error or panicked.
    pub subscriber_errors: u64,
    /// Per-channel delivery counters.
    pub channels: HashMap<String, ChannelStats>,
}
