use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the generic webhook channel.
#[derive(Clone)]
pub struct WebhookConfig {
    /// Channel instance name used for registration and routing.
    pub name: String,

    /// Endpoint URL the notification JSON is posted to.
    pub url: String,

    /// Static headers applied to every request.
    pub headers: HashMap<String, String>,

    /// Optional bearer token.
    pub bearer_token: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("headers", &self.headers.keys())
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl WebhookConfig {
    /// Create a configuration for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            name: "webhook".to_owned(),
            url: url.into(),
            headers: HashMap::new(),
            bearer_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the channel instance name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a static header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set a bearer token.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
