use async_trait::async_trait;
use chrono::{DateTime, Utc};
use covgate_core::Notification;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChannelError;
use crate::ratelimit::RateLimits;

/// The transport family a channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Chat-service incoming webhook with attachment blocks.
    ChatWebhook,
    /// Generic JSON webhook.
    Webhook,
    /// SMTP email.
    Email,
}

impl ChannelKind {
    /// Stable string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatWebhook => "chat_webhook",
            Self::Webhook => "webhook",
            Self::Email => "email",
        }
    }
}

/// Record of one successful delivery attempt.
///
/// A fresh `delivery_id` is assigned per attempt, so retried sends remain
/// distinguishable on the receiving side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    /// Unique id of this delivery attempt.
    pub delivery_id: String,
    /// Name of the channel that performed the delivery.
    pub channel: String,
    /// When the delivery completed.
    pub delivered_at: DateTime<Utc>,
    /// Transport-specific detail (response body, message id, ...).
    pub detail: serde_json::Value,
}

impl Delivery {
    /// Create a delivery record with a fresh attempt id.
    #[must_use]
    pub fn new(channel: impl Into<String>, detail: serde_json::Value) -> Self {
        Self {
            delivery_id: Uuid::new_v4().to_string(),
            channel: channel.into(),
            delivered_at: Utc::now(),
            detail,
        }
    }
}

/// Strongly-typed channel trait with native `async fn`.
///
/// This trait is **not** object-safe because it uses native `async fn`
/// methods. For dynamic dispatch use [`DynChannel`] -- every `Channel`
/// automatically implements `DynChannel` via a blanket implementation.
pub trait Channel: Send + Sync {
    /// Returns the unique name of this channel instance.
    fn name(&self) -> &str;

    /// The transport family of this channel.
    fn kind(&self) -> ChannelKind;

    /// Deliver one notification.
    ///
    /// The notification is borrowed for the duration of the send; channels
    /// must not retain it. Implementations must be idempotent under retry
    /// and assign a new delivery id per attempt.
    fn send(
        &self,
        notification: &Notification,
    ) -> impl std::future::Future<Output = Result<Delivery, ChannelError>> + Send;

    /// Verify the channel configuration without sending anything.
    fn validate(&self) -> Result<(), ChannelError>;

    /// Whether this channel can render structured (rich) content.
    fn supports_rich(&self) -> bool {
        false
    }

    /// The delivery quotas for this channel.
    fn rate_limits(&self) -> RateLimits {
        RateLimits::default()
    }
}

/// Object-safe channel trait for use behind `Arc<dyn DynChannel>`.
///
/// You generally should not implement this trait directly -- implement
/// [`Channel`] and rely on the blanket implementation.
#[async_trait]
pub trait DynChannel: Send + Sync {
    /// Returns the unique name of this channel instance.
    fn name(&self) -> &str;

    /// The transport family of this channel.
    fn kind(&self) -> ChannelKind;

    /// Deliver one notification.
    async fn send(&self, notification: &Notification) -> Result<Delivery, ChannelError>;

    /// Verify the channel configuration without sending anything.
    fn validate(&self) -> Result<(), ChannelError>;

    /// Whether this channel can render structured (rich) content.
    fn supports_rich(&self) -> bool {
        false
    }

    /// The delivery quotas for this channel.
    fn rate_limits(&self) -> RateLimits {
        RateLimits::default()
    }
}

#[async_trait]
impl<T: Channel + Sync> DynChannel for T {
    fn name(&self) -> &str {
        Channel::name(self)
    }

    fn kind(&self) -> ChannelKind {
        Channel::kind(self)
    }

    async fn send(&self, notification: &Notification) -> Result<Delivery, ChannelError> {
        Channel::send(self, notification).await
    }

    fn validate(&self) -> Result<(), ChannelError> {
        Channel::validate(self)
    }

    fn supports_rich(&self) -> bool {
        Channel::supports_rich(self)
    }

    fn rate_limits(&self) -> RateLimits {
        Channel::rate_limits(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use covgate_core::{EventType, Priority, Severity};

    use super::*;

    fn notification() -> Notification {
        Notification {
            id: "evt-1".into(),
            timestamp: Utc::now(),
            event_type: EventType::Threshold,
            severity: Severity::Warning,
            priority: Priority::Normal,
            subject: "Coverage Below Threshold: 68.0%".into(),
            message: "coverage fell below the configured threshold".into(),
            repository: "org/repo".into(),
            branch: "main".into(),
            commit_sha: None,
            pr_number: None,
            author: None,
            coverage: None,
            trend: None,
            links: vec![],
            channels: vec!["mock".into()],
        }
    }

    struct MockChannel {
        channel_name: String,
        should_fail: bool,
    }

    impl Channel for MockChannel {
        fn name(&self) -> &str {
            &self.channel_name
        }

        fn kind(&self) -> ChannelKind {
            ChannelKind::Webhook
        }

        async fn send(&self, notification: &Notification) -> Result<Delivery, ChannelError> {
            if self.should_fail {
                return Err(ChannelError::Transient("mock failure".into()));
            }
            Ok(Delivery::new(
                &self.channel_name,
                serde_json::json!({"id": notification.id}),
            ))
        }

        fn validate(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn channel_send_success() {
        let channel = MockChannel {
            channel_name: "mock".into(),
            should_fail: false,
        };
        let delivery = Channel::send(&channel, &notification()).await.unwrap();
        assert_eq!(delivery.channel, "mock");
        assert_eq!(delivery.detail["id"], "evt-1");
    }

    #[tokio::test]
    async fn blanket_dyn_channel_impl() {
        let channel: Arc<dyn DynChannel> = Arc::new(MockChannel {
            channel_name: "dyn-mock".into(),
            should_fail: false,
        });
        assert_eq!(channel.name(), "dyn-mock");
        assert_eq!(channel.kind(), ChannelKind::Webhook);
        channel.validate().unwrap();
        let delivery = channel.send(&notification()).await.unwrap();
        assert!(!delivery.delivery_id.is_empty());
    }

    #[tokio::test]
    async fn delivery_ids_differ_per_attempt() {
        let channel = MockChannel {
            channel_name: "mock".into(),
            should_fail: false,
        };
        let n = notification();
        let a = Channel::send(&channel, &n).await.unwrap();
        let b = Channel::send(&channel, &n).await.unwrap();
        assert_ne!(a.delivery_id, b.delivery_id);
    }

    #[tokio::test]
    async fn failing_channel_surfaces_error() {
        let channel = MockChannel {
            channel_name: "mock".into(),
            should_fail: true,
        };
        let err = Channel::send(&channel, &notification()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
