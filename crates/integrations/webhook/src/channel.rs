use reqwest::Client;
use tracing::{debug, instrument, warn};

use covgate_channel::{Channel, ChannelError, ChannelKind, Delivery, RateLimits};
use covgate_core::Notification;

use crate::config::WebhookConfig;

/// Generic webhook channel posting the full notification as JSON.
///
/// Any 2xx response is success; 429 and 408 are retryable, other 4xx
/// responses are permanent, everything else is transient.
pub struct WebhookChannel {
    config: WebhookConfig,
    client: Client,
}

impl WebhookChannel {
    /// Create a channel with a default HTTP client using the configured
    /// timeout.
    pub fn new(config: WebhookConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build HTTP client");
        Self { config, client }
    }

    /// Create a channel with a custom HTTP client.
    pub fn with_client(config: WebhookConfig, client: Client) -> Self {
        Self { config, client }
    }
}

impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    #[instrument(skip(self, notification), fields(channel = %self.config.name, event_id = %notification.id))]
    async fn send(&self, notification: &Notification) -> Result<Delivery, ChannelError> {
        debug!(url = %self.config.url, "dispatching webhook");

        let mut request = self.client.post(&self.config.url).json(notification);
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }
        if let Some(ref token) = self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("webhook request timed out");
            }
            ChannelError::Transient(e.to_string())
        })?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            let body: serde_json::Value = response
                .json()
                .await
                .unwrap_or(serde_json::Value::Null);
            return Ok(Delivery::new(
                &self.config.name,
                serde_json::json!({"status": status, "body": body}),
            ));
        }

        let body = response.text().await.unwrap_or_default();
        Err(ChannelError::from_status(status, body))
    }

    fn validate(&self) -> Result<(), ChannelError> {
        if self.config.url.is_empty() {
            return Err(ChannelError::Configuration("webhook URL is empty".into()));
        }
        if !self.config.url.starts_with("http://") && !self.config.url.starts_with("https://") {
            return Err(ChannelError::Configuration(format!(
                "webhook URL must be http(s), got '{}'",
                self.config.url
            )));
        }
        Ok(())
    }

    fn rate_limits(&self) -> RateLimits {
        RateLimits::webhook()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use covgate_core::{EventType, Priority, Severity};

    use super::*;

    struct MockEndpoint {
        listener: tokio::net::TcpListener,
        base_url: String,
    }

    impl MockEndpoint {
        async fn start() -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind mock server");
            let port = listener.local_addr().unwrap().port();
            let base_url = format!("http://127.0.0.1:{port}");
            Self { listener, base_url }
        }

        async fn respond_once(self, status_code: u16, body: &str) -> Vec<u8> {
            let body = body.to_owned();
            let (mut stream, _) = self.listener.accept().await.unwrap();

            use tokio::io::{AsyncReadExt, AsyncWriteExt};

            let mut buf = vec![0u8; 16384];
            let n = stream.read(&mut buf).await.unwrap();
            buf.truncate(n);

            let response = format!(
                "HTTP/1.1 {status_code} OK\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();

            buf
        }
    }

    fn notification() -> Notification {
        Notification {
            id: "evt-1".into(),
            timestamp: Utc::now(),
            event_type: EventType::Improvement,
            severity: Severity::Info,
            priority: Priority::Normal,
            subject: "Coverage Improvement: 75.0% → 80.0%".into(),
            message: "details".into(),
            repository: "org/repo".into(),
            branch: "main".into(),
            commit_sha: None,
            pr_number: None,
            author: None,
            coverage: None,
            trend: None,
            links: vec![],
            channels: vec!["webhook".into()],
        }
    }

    #[test]
    fn channel_identity() {
        let channel = WebhookChannel::new(WebhookConfig::new("http://localhost:1/hook"));
        assert_eq!(Channel::name(&channel), "webhook");
        assert_eq!(Channel::kind(&channel), ChannelKind::Webhook);
        assert!(!Channel::supports_rich(&channel));
    }

    #[test]
    fn validate_url_shape() {
        assert!(
            Channel::validate(&WebhookChannel::new(WebhookConfig::new(
                "https://example.com/hook"
            )))
            .is_ok()
        );
        assert!(
            Channel::validate(&WebhookChannel::new(WebhookConfig::new(""))).is_err()
        );
        assert!(
            Channel::validate(&WebhookChannel::new(WebhookConfig::new("ftp://x"))).is_err()
        );
    }

    #[tokio::test]
    async fn send_posts_notification_json() {
        let server = MockEndpoint::start().await;
        let config = WebhookConfig::new(&server.base_url)
            .with_header("X-Team", "platform")
            .with_bearer_token("tok-123");
        let channel = WebhookChannel::new(config);

        let server_handle =
            tokio::spawn(async move { server.respond_once(200, r#"{"received":true}"#).await });

        let delivery = Channel::send(&channel, &notification()).await.unwrap();
        let request = server_handle.await.unwrap();
        let request_str = String::from_utf8_lossy(&request);

        assert_eq!(delivery.detail["status"], 200);
        assert_eq!(delivery.detail["body"]["received"], true);
        assert!(request_str.contains(r#""repository":"org/repo""#));
        assert!(request_str.to_lowercase().contains("x-team: platform"));
        assert!(request_str.contains("Bearer tok-123"));
    }

    #[tokio::test]
    async fn send_maps_status_classes() {
        for (status, retryable) in [(429u16, true), (500, true), (404, false), (408, true)] {
            let server = MockEndpoint::start().await;
            let channel = WebhookChannel::new(WebhookConfig::new(&server.base_url));
            let server_handle =
                tokio::spawn(async move { server.respond_once(status, "{}").await });

            let err = Channel::send(&channel, &notification()).await.unwrap_err();
            server_handle.await.unwrap();
            assert_eq!(
                err.is_retryable(),
                retryable,
                "status {status} retryability mismatch"
            );
        }
    }

    #[tokio::test]
    async fn non_json_success_body_is_tolerated() {
        let server = MockEndpoint::start().await;
        let channel = WebhookChannel::new(WebhookConfig::new(&server.base_url));
        let server_handle = tokio::spawn(async move { server.respond_once(204, "").await });

        let delivery = Channel::send(&channel, &notification()).await.unwrap();
        server_handle.await.unwrap();
        assert_eq!(delivery.detail["status"], 204);
    }
}
