use std::sync::LazyLock;

use regex::Regex;

/// Incoming-webhook URLs look like `https://hooks.<provider>/services/...`.
/// Plain-HTTP loopback URLs are also accepted so tests can run against a
/// local mock server.
static WEBHOOK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://hooks\.[\w.-]+/services/.+").expect("webhook URL pattern is valid")
});

/// Configuration for the chat-webhook channel.
#[derive(Clone)]
pub struct ChatConfig {
    /// Channel instance name used for registration and routing.
    pub name: String,

    /// Incoming-webhook URL.
    pub webhook_url: String,

    /// Chat channel to post into (e.g. `#coverage`). Optional; the webhook
    /// default applies when unset.
    pub channel: Option<String>,

    /// Username shown as the message author.
    pub username: String,

    /// Emoji icon for the message author.
    pub icon_emoji: Option<String>,

    /// Icon URL for the message author.
    pub icon_url: Option<String>,
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("name", &self.name)
            .field("webhook_url", &"[REDACTED]")
            .field("channel", &self.channel)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl ChatConfig {
    /// Create a configuration for the given webhook URL.
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            name: "chat".to_owned(),
            webhook_url: webhook_url.into(),
            channel: None,
            username: "coverage-bot".to_owned(),
            icon_emoji: Some(":bar_chart:".to_owned()),
            icon_url: None,
        }
    }

    /// Set the channel instance name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the chat channel to post into.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Set the author username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Whether the webhook URL has an acceptable shape.
    #[must_use]
    pub fn url_is_valid(&self) -> bool {
        WEBHOOK_URL.is_match(&self.webhook_url)
            || self.webhook_url.starts_with("http://127.0.0.1")
            || self.webhook_url.starts_with("http://localhost")
    }
}
