use async_trait::async_trait;

use covgate_core::CoverageEvent;

/// Error type subscribers may return; logged and otherwise ignored.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every accepted event, best-effort and unordered.
///
/// Subscribers are isolated from each other and from delivery: an error or
/// panic in one subscriber never blocks another subscriber or a channel
/// send. Callbacks run outside all processor locks on an owned copy of the
/// event.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Called once per accepted event.
    async fn on_event(&self, event: CoverageEvent) -> Result<(), SubscriberError>;
}
