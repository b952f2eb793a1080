//! Content-derived identity for events.

use sha2::{Digest, Sha256};

use crate::event::CoverageEvent;

/// Compute the deduplication fingerprint of an event.
///
/// Two events are considered equivalent when they share
/// `(event_type, repository, branch, commit_sha, pr_number)`. The
/// fingerprint is the hex-encoded SHA-256 of those fields.
#[must_use]
pub fn compute_fingerprint(event: &CoverageEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.event_type.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(event.repository.as_bytes());
    hasher.update(b":");
    hasher.update(event.branch.as_bytes());
    hasher.update(b":");
    hasher.update(event.commit_sha.as_deref().unwrap_or("").as_bytes());
    hasher.update(b":");
    if let Some(pr) = event.pr_number {
        hasher.update(pr.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Derive a stable event id from the fingerprint and timestamp.
///
/// Used by the processor when a publisher did not supply an id. Including
/// the timestamp keeps ids of repeated-but-distinct events distinct while
/// staying deterministic for the same observation.
#[must_use]
pub fn content_id(event: &CoverageEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(compute_fingerprint(event).as_bytes());
    if let Some(ts) = event.timestamp {
        hasher.update(ts.timestamp_micros().to_le_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", event.event_type.as_str(), &digest[..16])
}
