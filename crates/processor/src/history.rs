//! Bounded ring of processed events.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use covgate_core::CoverageEvent;

/// FIFO ring of processed events, bounded by capacity with head eviction
/// and periodic retention sweeps.
///
/// Readers take the shared lock; the dedup scan walks the newest entries
/// first and stops at the window cutoff. Writers hold the exclusive lock
/// only for the insertion or sweep itself.
#[derive(Debug)]
pub struct EventHistory {
    entries: RwLock<VecDeque<CoverageEvent>>,
    capacity: usize,
}

impl EventHistory {
    /// Create a history bounded to `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Append an event, evicting from the head when over capacity.
    pub fn record(&self, event: CoverageEvent) {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// A copy of the retained events, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CoverageEvent> {
        self.entries.read().iter().cloned().collect()
    }

    /// Scan the newest entries whose timestamps are at or after `cutoff`,
    /// returning the id of the first entry matching the predicate.
    ///
    /// The scan walks backwards and stops at the first entry older than the
    /// cutoff, so lookups touch only the recent segment.
    pub fn find_recent<F>(&self, cutoff: DateTime<Utc>, predicate: F) -> Option<String>
    where
        F: Fn(&CoverageEvent) -> bool,
    {
        let entries = self.entries.read();
        for event in entries.iter().rev() {
            if event.timestamp.is_some_and(|ts| ts < cutoff) {
                break;
            }
            if predicate(event) {
                return Some(event.id.clone());
            }
        }
        None
    }

    /// Remove entries older than `retention` relative to `now`.
    ///
    /// Returns the number of evicted entries.
    pub fn sweep(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let cutoff = now
            - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::zero());
        let mut entries = self.entries.write();
        let before = entries.len();
        while let Some(front) = entries.front() {
            if front.timestamp.is_some_and(|ts| ts < cutoff) {
                entries.pop_front();
            } else {
                break;
            }
        }
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "history sweep evicted entries");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use covgate_core::EventType;

    use super::*;

    fn event(id: &str, ts: DateTime<Utc>) -> CoverageEvent {
        CoverageEvent::new(EventType::Threshold, "org/repo")
            .with_id(id)
            .with_timestamp(ts)
    }

    #[test]
    fn bounded_eviction_from_head() {
        let history = EventHistory::new(3);
        let now = Utc::now();
        for i in 0..5 {
            history.record(event(&format!("evt-{i}"), now));
        }
        assert_eq!(history.len(), 3);
        let snapshot = history.snapshot();
        assert_eq!(snapshot[0].id, "evt-2");
        assert_eq!(snapshot[2].id, "evt-4");
    }

    #[test]
    fn snapshot_is_a_copy() {
        let history = EventHistory::new(10);
        history.record(event("evt-1", Utc::now()));
        let mut snapshot = history.snapshot();
        snapshot.clear();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn find_recent_respects_cutoff() {
        let history = EventHistory::new(10);
        let now = Utc::now();
        history.record(event("old", now - chrono::Duration::minutes(10)));
        history.record(event("new", now));

        let cutoff = now - chrono::Duration::minutes(5);
        assert_eq!(
            history.find_recent(cutoff, |e| e.repository == "org/repo"),
            Some("new".to_owned())
        );
        assert_eq!(history.find_recent(cutoff, |e| e.id == "old"), None);
    }

    #[test]
    fn sweep_removes_expired() {
        let history = EventHistory::new(10);
        let now = Utc::now();
        history.record(event("stale", now - chrono::Duration::hours(25)));
        history.record(event("fresh", now));

        let evicted = history.sweep(now, Duration::from_secs(24 * 3600));
        assert_eq!(evicted, 1);
        assert_eq!(history.len(), 1);
        assert_eq!(history.snapshot()[0].id, "fresh");
    }

    #[test]
    fn sweep_keeps_everything_within_retention() {
        let history = EventHistory::new(10);
        let now = Utc::now();
        history.record(event("a", now - chrono::Duration::minutes(1)));
        history.record(event("b", now));
        assert_eq!(history.sweep(now, Duration::from_secs(3600)), 0);
        assert_eq!(history.len(), 2);
    }
}
