//! The event processor: accept, filter, deduplicate, aggregate, fan out.

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use covgate_channel::{Admission, ChannelEntry, ChannelRegistry, DynChannel, TokenBucketLimiter};
use covgate_core::{Clock, CoverageEvent, EventType, Notification, content_id};

use crate::aggregator::AggregatorSet;
use crate::config::ProcessorConfig;
use crate::dedup::Deduplicator;
use crate::error::PublishError;
use crate::filter::Filter;
use crate::history::EventHistory;
use crate::notify::build_notification;
use crate::retry::RetryPolicy;
use crate::stats::{ProcessorMetrics, StatsSnapshot};
use crate::subscriber::Subscriber;

/// The central pipeline: accepts events via `publish`, applies filters and
/// deduplication synchronously, then hands accepted events to a bounded
/// queue drained by a dispatcher backed by a worker pool.
///
/// Per event the worker pipeline is: resolve target channels; hand
/// aggregatable events to their aggregator; build the notification; notify
/// subscribers; fan out to each channel with rate limiting, per-send
/// deadlines, and retry; finally record the event in history.
///
/// Dropping the processor cancels its background tasks; call
/// [`stop`](Self::stop) for a graceful drain.
pub struct EventProcessor {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) config: ProcessorConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) registry: RwLock<ChannelRegistry>,
    pub(crate) filters: RwLock<Vec<Arc<dyn Filter>>>,
    pub(crate) subscribers: RwLock<Vec<Arc<dyn Subscriber>>>,
    pub(crate) history: Arc<EventHistory>,
    pub(crate) dedup: Deduplicator,
    pub(crate) aggregators: AggregatorSet,
    pub(crate) metrics: ProcessorMetrics,
    pub(crate) retry_policy: RetryPolicy,
    /// Processor-wide hourly budget applied on top of per-channel quotas.
    pub(crate) hourly_limiter: TokenBucketLimiter,
    pub(crate) queue_tx: mpsc::Sender<CoverageEvent>,
    pub(crate) cancel: CancellationToken,
    pub(crate) tracker: TaskTracker,
}

impl EventProcessor {
    /// Start building a processor.
    #[must_use]
    pub fn builder() -> crate::builder::ProcessorBuilder {
        crate::builder::ProcessorBuilder::new()
    }

    pub(crate) fn from_inner(
        inner: Arc<Inner>,
        queue_rx: mpsc::Receiver<CoverageEvent>,
        flush_rx: mpsc::UnboundedReceiver<CoverageEvent>,
    ) -> Self {
        let processor = Self { inner };
        processor.spawn_dispatcher(queue_rx, flush_rx);
        processor.spawn_sweeper();
        processor
    }

    /// Validate, filter, deduplicate, and enqueue an event.
    ///
    /// Never blocks: a full queue yields [`PublishError::QueueFull`]. The
    /// processor assigns the timestamp and a content-derived id when the
    /// publisher left them empty.
    #[instrument(skip(self, event), fields(repository = %event.repository))]
    pub fn publish(&self, mut event: CoverageEvent) -> Result<(), PublishError> {
        self.accept(&mut event)?;
        match self.inner.queue_tx.try_send(event) {
            Ok(()) => {
                self.inner.metrics.record_published();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.inner.metrics.record_queue_full();
                Err(PublishError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PublishError::Stopped),
        }
    }

    /// Like [`publish`](Self::publish), but waits for queue space.
    ///
    /// The wait is abandoned when `cancel` fires or the processor stops.
    pub async fn publish_blocking(
        &self,
        mut event: CoverageEvent,
        cancel: &CancellationToken,
    ) -> Result<(), PublishError> {
        self.accept(&mut event)?;
        tokio::select! {
            () = cancel.cancelled() => Err(PublishError::Cancelled),
            () = self.inner.cancel.cancelled() => Err(PublishError::Stopped),
            result = self.inner.queue_tx.send(event) => match result {
                Ok(()) => {
                    self.inner.metrics.record_published();
                    Ok(())
                }
                Err(_) => Err(PublishError::Stopped),
            },
        }
    }

    /// Shared acceptance path: validation, id assignment, filters, dedup.
    fn accept(&self, event: &mut CoverageEvent) -> Result<(), PublishError> {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return Err(PublishError::Stopped);
        }

        event.validate()?;

        let now = inner.clock.now();
        if event.timestamp.is_none() {
            event.timestamp = Some(now);
        }
        if event.id.is_empty() {
            event.id = content_id(event);
        }

        // Filters run on a snapshot so registration cannot block publishes.
        // A panicking filter is treated as a pass so one broken predicate
        // cannot black-hole the pipeline.
        let filters: Vec<Arc<dyn Filter>> = inner.filters.read().clone();
        for filter in filters {
            let passed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                filter.should_process(event)
            }))
            .unwrap_or_else(|_| {
                warn!(filter = %filter.name(), "filter panicked; treating as pass");
                true
            });
            if !passed {
                inner.metrics.record_filtered();
                return Err(PublishError::Filtered {
                    filter: filter.name().to_owned(),
                });
            }
        }

        if let Err(err) = inner.dedup.check(event, now) {
            inner.metrics.record_duplicate();
            return Err(err);
        }
        Ok(())
    }

    /// Register a channel. Its rate limiter starts full as of now.
    pub fn register_channel(&self, channel: Arc<dyn DynChannel>) {
        let now = self.inner.clock.now();
        self.inner.registry.write().register(channel, now);
    }

    /// Register a filter; filters run in registration order.
    pub fn register_filter(&self, filter: Arc<dyn Filter>) {
        self.inner.filters.write().push(filter);
    }

    /// Subscribe to every accepted event.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.inner.subscribers.write().push(subscriber);
    }

    /// A copy of the processed-event history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<CoverageEvent> {
        self.inner.history.snapshot()
    }

    /// Point-in-time counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Stop accepting work, cancel in-flight sends, and wait for tasks to
    /// finish.
    pub async fn stop(&self) {
        info!("stopping event processor");
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    fn spawn_dispatcher(
        &self,
        mut queue_rx: mpsc::Receiver<CoverageEvent>,
        mut flush_rx: mpsc::UnboundedReceiver<CoverageEvent>,
    ) {
        let inner = Arc::clone(&self.inner);
        let semaphore = Arc::new(Semaphore::new(inner.config.max_concurrent_events));

        self.inner.tracker.spawn(async move {
            loop {
                let event = tokio::select! {
                    () = inner.cancel.cancelled() => break,
                    maybe = queue_rx.recv() => match maybe {
                        Some(event) => event,
                        None => break,
                    },
                    maybe = flush_rx.recv() => match maybe {
                        Some(event) => event,
                        None => continue,
                    },
                };

                let permit = tokio::select! {
                    () = inner.cancel.cancelled() => break,
                    permit = Arc::clone(&semaphore).acquire_owned() => {
                        permit.expect("worker semaphore is never closed")
                    }
                };

                inner
                    .tracker
                    .spawn(process_event(Arc::clone(&inner), event, permit));
            }
            debug!("dispatcher stopped");
        });
    }

    fn spawn_sweeper(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.sweep_interval);
            loop {
                tokio::select! {
                    () = inner.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = inner.clock.now();
                        inner.history.sweep(now, inner.config.event_retention);
                        inner.aggregators.flush_due(now);
                    }
                }
            }
            debug!("sweeper stopped");
        });
    }
}

impl Drop for EventProcessor {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

/// Whether events of this type are batched by default.
fn is_aggregatable(event_type: EventType) -> bool {
    matches!(event_type, EventType::Threshold | EventType::Regression)
}

/// Resolve the target channel set for an event.
///
/// An empty `target_channels` means every registered channel; exclusions
/// are subtracted afterwards. Unknown names are dropped silently.
fn resolve_targets(inner: &Inner, event: &CoverageEvent) -> Vec<ChannelEntry> {
    let registry = inner.registry.read();
    let names: Vec<String> = if event.target_channels.is_empty() {
        registry.names()
    } else {
        event.target_channels.clone()
    };
    names
        .into_iter()
        .filter(|name| !event.exclude_channels.contains(name))
        .filter_map(|name| registry.get(&name))
        .collect()
}

/// The worker pipeline for one event.
async fn process_event(inner: Arc<Inner>, mut event: CoverageEvent, _permit: OwnedSemaphorePermit) {
    let now = inner.clock.now();

    let targets = resolve_targets(&inner, &event);

    if inner.config.aggregation_enabled
        && is_aggregatable(event.event_type)
        && !event.is_aggregated()
    {
        // The aggregator owns the event until a flush re-enters the
        // pipeline with the synthesized one. Unclaimed events come back
        // and continue through the pipeline directly.
        match inner.aggregators.route(event, now) {
            None => {
                inner.metrics.record_aggregated();
                return;
            }
            Some(returned) => event = returned,
        }
    }

    let channel_names: Vec<String> = targets
        .iter()
        .map(|entry| entry.channel.name().to_owned())
        .collect();

    let notification = match build_notification(&event, channel_names, now) {
        Ok(notification) => Arc::new(notification),
        Err(err) => {
            warn!(event_id = %event.id, error = %err, "failed to build notification");
            inner.metrics.record_build_error();
            event.last_error = Some(err.to_string());
            event.processed_at = Some(inner.clock.now());
            inner.history.record(event);
            return;
        }
    };

    notify_subscribers(&inner, &event).await;

    let mut send_tasks = Vec::with_capacity(targets.len());
    for entry in targets {
        let inner_task = Arc::clone(&inner);
        let notification_task = Arc::clone(&notification);
        send_tasks.push(tokio::spawn(send_with_retry(
            inner_task,
            entry,
            notification_task,
        )));
    }

    let mut attempts_total: u32 = 0;
    let mut last_error: Option<String> = None;
    for joined in join_all(send_tasks).await {
        match joined {
            Ok((attempts, Ok(()))) => attempts_total += attempts,
            Ok((attempts, Err(message))) => {
                attempts_total += attempts;
                last_error = Some(message);
            }
            Err(join_err) => {
                // A panicking channel must not take the event down with it.
                warn!(event_id = %event.id, error = %join_err, "channel send panicked");
                last_error = Some(format!("channel panicked: {join_err}"));
            }
        }
    }

    event.attempts = attempts_total;
    event.last_error = last_error;
    event.processed_at = Some(inner.clock.now());
    inner.history.record(event);
    inner.metrics.record_processed();
}

/// Notify every subscriber in parallel on an owned event copy.
///
/// The subscriber list is snapshotted under the read lock; callbacks run
/// in their own tasks so a panic or error in one cannot affect another.
async fn notify_subscribers(inner: &Arc<Inner>, event: &CoverageEvent) {
    let subscribers: Vec<Arc<dyn Subscriber>> = inner.subscribers.read().clone();
    if subscribers.is_empty() {
        return;
    }

    let mut tasks = Vec::with_capacity(subscribers.len());
    for subscriber in subscribers {
        let event_copy = event.clone();
        tasks.push(tokio::spawn(async move {
            let name = subscriber.name().to_owned();
            (name, subscriber.on_event(event_copy).await)
        }));
    }

    for joined in join_all(tasks).await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((name, Err(err))) => {
                warn!(subscriber = %name, error = %err, "subscriber returned error");
                inner.metrics.record_subscriber_error();
            }
            Err(join_err) => {
                warn!(error = %join_err, "subscriber panicked");
                inner.metrics.record_subscriber_error();
            }
        }
    }
}

/// Deliver one notification through one channel, honoring the rate limiter
/// and retry budget.
///
/// Returns the number of attempts made and the final outcome. Rate-limit
/// denials consume retry budget but sleep for the limiter's `retry_after`
/// rather than the backoff delay.
async fn send_with_retry(
    inner: Arc<Inner>,
    entry: ChannelEntry,
    notification: Arc<Notification>,
) -> (u32, Result<(), String>) {
    let channel_name = entry.channel.name().to_owned();
    let counters = inner.metrics.channel(&channel_name);
    let mut attempt: u32 = 0;

    loop {
        if inner.config.enable_rate_limiting {
            // The processor-wide hourly budget gates first, then the
            // channel's own buckets.
            let admission = match inner.hourly_limiter.acquire(inner.clock.now()) {
                Admission::Granted => entry.limiter.acquire(inner.clock.now()),
                denied @ Admission::Denied { .. } => denied,
            };
            match admission {
                Admission::Granted => {}
                Admission::Denied { retry_after } => {
                    counters.record_rate_limited();
                    if attempt >= inner.config.retry_attempts {
                        counters.record_failed();
                        return (
                            attempt + 1,
                            Err(format!("rate_limited: channel '{channel_name}'")),
                        );
                    }
                    attempt += 1;
                    counters.record_retry();
                    debug!(
                        channel = %channel_name,
                        retry_after_ms = %retry_after.as_millis(),
                        "rate limited; scheduling retry"
                    );
                    tokio::select! {
                        () = inner.cancel.cancelled() => {
                            return (attempt, Err("cancelled".to_owned()));
                        }
                        () = tokio::time::sleep(retry_after) => {}
                    }
                    continue;
                }
            }
        }

        let send_result = tokio::select! {
            () = inner.cancel.cancelled() => {
                return (attempt + 1, Err("cancelled".to_owned()));
            }
            result = tokio::time::timeout(
                inner.config.event_timeout,
                entry.channel.send(&notification),
            ) => result,
        };

        let error = match send_result {
            Ok(Ok(delivery)) => {
                counters.record_sent();
                debug!(
                    channel = %channel_name,
                    delivery_id = %delivery.delivery_id,
                    "notification delivered"
                );
                return (attempt + 1, Ok(()));
            }
            Ok(Err(err)) => err,
            Err(_elapsed) => covgate_channel::ChannelError::Timeout(inner.config.event_timeout),
        };

        if error.is_retryable() && attempt < inner.config.retry_attempts {
            let delay = inner.retry_policy.delay_for(attempt);
            attempt += 1;
            counters.record_retry();
            warn!(
                channel = %channel_name,
                attempt,
                error = %error,
                delay_ms = %delay.as_millis(),
                "transient delivery error; will retry"
            );
            tokio::select! {
                () = inner.cancel.cancelled() => {
                    return (attempt, Err("cancelled".to_owned()));
                }
                () = tokio::time::sleep(delay) => {}
            }
        } else {
            counters.record_failed();
            warn!(
                channel = %channel_name,
                attempt,
                error = %error,
                retryable = error.is_retryable(),
                "delivery failed"
            );
            return (attempt + 1, Err(format!("{}: {error}", error.code())));
        }
    }
}
