//! Time/size-windowed grouping of related events.
//!
//! Aggregators collapse bursts of matching events into a single
//! synthesized event. They reference the rest of the pipeline only through
//! a flush callback, so they can be tested in isolation and never hold a
//! back-pointer to the processor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use covgate_core::{CoverageBody, CoverageEvent, EventType};

/// Callback invoked with each synthesized event.
pub type FlushFn = Arc<dyn Fn(CoverageEvent) + Send + Sync>;

/// How the synthesized event summarizes its constituents' coverage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunc {
    /// Sum of `coverage.current` values.
    Sum,
    /// Mean of `coverage.current` values.
    Avg,
    /// Number of constituents.
    Count,
    /// Minimum `coverage.current`.
    Min,
    /// Maximum `coverage.current`.
    Max,
    /// The most recent `coverage.current`.
    #[default]
    Latest,
}

impl AggregateFunc {
    fn apply(self, values: &[f64]) -> f64 {
        match self {
            Self::Sum => values.iter().sum(),
            #[allow(clippy::cast_precision_loss)]
            Self::Avg => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
            #[allow(clippy::cast_precision_loss)]
            Self::Count => values.len() as f64,
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Latest => values.last().copied().unwrap_or(0.0),
        }
    }
}

/// Configuration for one aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Aggregator name, used in logs.
    pub name: String,
    /// The event type this aggregator collects.
    pub event_type: EventType,
    /// Window after which a batch is flushed.
    pub window: Duration,
    /// Batches smaller than this at window flush are discarded.
    pub min_events: usize,
    /// Reaching this size flushes immediately.
    pub max_events: usize,
    /// Field selectors forming the group key.
    pub group_by: Vec<String>,
    /// Summary function recorded on the synthesized event.
    pub func: AggregateFunc,
}

impl AggregatorConfig {
    /// The default aggregator for an event type: grouped by repository and
    /// branch, summarizing with `latest`.
    #[must_use]
    pub fn for_event_type(
        event_type: EventType,
        window: Duration,
        min_events: usize,
        max_events: usize,
    ) -> Self {
        Self {
            name: format!("{}-aggregator", event_type.as_str()),
            event_type,
            window,
            min_events,
            max_events,
            group_by: vec!["repository".to_owned(), "branch".to_owned()],
            func: AggregateFunc::Latest,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    events: Vec<CoverageEvent>,
    last_flush: DateTime<Utc>,
}

/// Collects matching events and synthesizes one event per flushed batch.
pub struct Aggregator {
    config: AggregatorConfig,
    buckets: Mutex<HashMap<String, Bucket>>,
    flush_fn: FlushFn,
}

impl Aggregator {
    /// Create an aggregator delivering synthesized events to `flush_fn`.
    #[must_use]
    pub fn new(config: AggregatorConfig, flush_fn: FlushFn) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
            flush_fn,
        }
    }

    /// The aggregator's configuration.
    #[must_use]
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Whether this aggregator collects the given event.
    #[must_use]
    pub fn matches(&self, event: &CoverageEvent) -> bool {
        event.event_type == self.config.event_type
    }

    /// Append an event to its group, flushing if the batch is full.
    ///
    /// The flush callback runs after the bucket lock is released.
    pub fn offer(&self, event: CoverageEvent, now: DateTime<Utc>) {
        let key = group_key(&event, &self.config.group_by);

        let synthesized = {
            let mut buckets = self.buckets.lock();
            let bucket = buckets.entry(key).or_insert_with(|| Bucket {
                events: Vec::new(),
                last_flush: now,
            });
            bucket.events.push(event);
            if bucket.events.len() >= self.config.max_events {
                let events = std::mem::take(&mut bucket.events);
                bucket.last_flush = now;
                Some(self.synthesize(&events))
            } else {
                None
            }
        };

        if let Some(event) = synthesized {
            debug!(aggregator = %self.config.name, "size-triggered flush");
            (self.flush_fn)(event);
        }
    }

    /// Flush every group whose window has elapsed.
    ///
    /// Groups below `min_events` are discarded and their window reset.
    /// Candidates are collected under the lock; callbacks run outside it.
    pub fn flush_due(&self, now: DateTime<Utc>) {
        let window = chrono::Duration::from_std(self.config.window)
            .unwrap_or_else(|_| chrono::Duration::zero());

        let mut synthesized = Vec::new();
        {
            let mut buckets = self.buckets.lock();
            buckets.retain(|_, bucket| {
                if now - bucket.last_flush < window {
                    return true;
                }
                let events = std::mem::take(&mut bucket.events);
                if events.len() >= self.config.min_events {
                    synthesized.push(self.synthesize(&events));
                } else if !events.is_empty() {
                    debug!(
                        aggregator = %self.config.name,
                        discarded = events.len(),
                        "window flush below batch minimum"
                    );
                }
                // The bucket is empty either way; drop it to bound the map.
                // The next offer recreates it with a fresh window.
                false
            });
        }

        for event in synthesized {
            debug!(aggregator = %self.config.name, "window-triggered flush");
            (self.flush_fn)(event);
        }
    }

    /// Build one event representing a flushed batch.
    fn synthesize(&self, events: &[CoverageEvent]) -> CoverageEvent {
        let first = events.first().expect("flush batches are never empty");
        let latest = events.last().expect("flush batches are never empty");

        let first_current = first.coverage.as_ref().map_or(0.0, |c| c.current);
        let latest_current = latest.coverage.as_ref().map_or(0.0, |c| c.current);
        let values: Vec<f64> = events
            .iter()
            .filter_map(|e| e.coverage.as_ref().map(|c| c.current))
            .collect();

        let coverage = CoverageBody {
            current: latest_current,
            previous: first_current,
            change: latest_current - first_current,
            ..latest.coverage.clone().unwrap_or_default()
        };

        let mut synthesized = latest.clone().with_coverage(coverage);
        synthesized.id = format!("{}_aggregated", latest.id);
        synthesized.attempts = 0;
        synthesized.last_error = None;
        synthesized.processed_at = None;
        synthesized
            .event_data
            .insert("aggregated_count".to_owned(), serde_json::json!(events.len()));
        synthesized.event_data.insert(
            "aggregated_value".to_owned(),
            serde_json::json!(self.config.func.apply(&values)),
        );
        synthesized
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("config", &self.config)
            .field("flush_fn", &"<FlushFn>")
            .finish_non_exhaustive()
    }
}

/// The set of aggregators owned by a processor.
#[derive(Debug, Default)]
pub struct AggregatorSet {
    aggregators: RwLock<Vec<Arc<Aggregator>>>,
}

impl AggregatorSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an aggregator.
    pub fn insert(&self, aggregator: Arc<Aggregator>) {
        self.aggregators.write().push(aggregator);
    }

    /// Route an event to the first matching aggregator.
    ///
    /// Returns the event back when no aggregator claimed it, so the caller
    /// can continue processing it directly.
    pub fn route(&self, event: CoverageEvent, now: DateTime<Utc>) -> Option<CoverageEvent> {
        let target = self
            .aggregators
            .read()
            .iter()
            .find(|a| a.matches(&event))
            .cloned();
        match target {
            Some(aggregator) => {
                aggregator.offer(event, now);
                None
            }
            None => Some(event),
        }
    }

    /// Flush every aggregator whose window has elapsed.
    ///
    /// The set lock is released before any flush callback runs.
    pub fn flush_due(&self, now: DateTime<Utc>) {
        let snapshot: Vec<Arc<Aggregator>> = self.aggregators.read().iter().cloned().collect();
        for aggregator in snapshot {
            aggregator.flush_due(now);
        }
    }
}

/// Compute a group key from the configured field selectors.
fn group_key(event: &CoverageEvent, group_by: &[String]) -> String {
    let mut parts = Vec::with_capacity(group_by.len());
    for field in group_by {
        let value = match field.as_str() {
            "repository" => event.repository.clone(),
            "branch" => event.branch.clone(),
            "commit_sha" => event.commit_sha.clone().unwrap_or_default(),
            "pr_number" => event.pr_number.map(|n| n.to_string()).unwrap_or_default(),
            "source" => event.source.clone(),
            "severity" => event.severity.as_str().to_owned(),
            _ => String::new(),
        };
        parts.push(value);
    }
    parts.join(":")
}
