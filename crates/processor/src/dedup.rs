//! Equivalence check against recent history.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use covgate_core::{CoverageEvent, compute_fingerprint};

use crate::error::PublishError;
use crate::history::EventHistory;

/// Rejects events that repeat a recently accepted event's key tuple.
///
/// Two events are duplicates when they share
/// `(type, repository, branch, commit_sha, pr_number)` and their timestamps
/// lie within the deduplication window.
#[derive(Debug)]
pub struct Deduplicator {
    history: Arc<EventHistory>,
    window: Duration,
}

impl Deduplicator {
    /// Create a deduplicator over the given history.
    #[must_use]
    pub fn new(history: Arc<EventHistory>, window: Duration) -> Self {
        Self { history, window }
    }

    /// Check an event against recent history.
    ///
    /// Returns [`PublishError::Duplicate`] carrying the id of the original
    /// event when an equivalent one was accepted within the window.
    pub fn check(&self, event: &CoverageEvent, now: DateTime<Utc>) -> Result<(), PublishError> {
        let fingerprint = compute_fingerprint(event);
        let cutoff = now
            - chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::zero());

        if let Some(original_id) = self
            .history
            .find_recent(cutoff, |candidate| {
                compute_fingerprint(candidate) == fingerprint
            })
        {
            return Err(PublishError::Duplicate { original_id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use covgate_core::EventType;

    use super::*;

    fn event(ts: DateTime<Utc>) -> CoverageEvent {
        CoverageEvent::new(EventType::Threshold, "org/x")
            .with_id("evt-1")
            .with_branch("main")
            .with_commit_sha("abc")
            .with_timestamp(ts)
    }

    fn dedup() -> (Arc<EventHistory>, Deduplicator) {
        let history = Arc::new(EventHistory::new(100));
        let dedup = Deduplicator::new(Arc::clone(&history), Duration::from_secs(300));
        (history, dedup)
    }

    #[test]
    fn first_event_is_not_duplicate() {
        let (_history, dedup) = dedup();
        let now = Utc::now();
        assert!(dedup.check(&event(now), now).is_ok());
    }

    #[test]
    fn repeat_within_window_is_duplicate() {
        let (history, dedup) = dedup();
        let now = Utc::now();
        history.record(event(now));

        let later = now + chrono::Duration::seconds(60);
        let err = dedup.check(&event(later), later).unwrap_err();
        match err {
            PublishError::Duplicate { original_id } => assert_eq!(original_id, "evt-1"),
            other => panic!("expected duplicate, got {other}"),
        }
    }

    #[test]
    fn repeat_outside_window_is_accepted() {
        let (history, dedup) = dedup();
        let now = Utc::now();
        history.record(event(now));

        let later = now + chrono::Duration::seconds(301);
        assert!(dedup.check(&event(later), later).is_ok());
    }

    #[test]
    fn different_key_tuple_is_accepted() {
        let (history, dedup) = dedup();
        let now = Utc::now();
        history.record(event(now));

        let other = CoverageEvent::new(EventType::Threshold, "org/x")
            .with_branch("develop")
            .with_commit_sha("abc")
            .with_timestamp(now);
        assert!(dedup.check(&other, now).is_ok());
    }
}
