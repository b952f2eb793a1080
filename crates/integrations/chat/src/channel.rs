use reqwest::Client;
use tracing::{debug, instrument, warn};

use covgate_channel::{Channel, ChannelError, ChannelKind, Delivery, RateLimits};
use covgate_core::Notification;

use crate::config::ChatConfig;
use crate::types::{ChatMessage, build_attachment};

/// Chat-webhook channel posting rich attachment messages.
pub struct ChatChannel {
    config: ChatConfig,
    client: Client,
}

impl ChatChannel {
    /// Create a channel with a default HTTP client.
    pub fn new(config: ChatConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self { config, client }
    }

    /// Create a channel with a custom HTTP client, e.g. to share a
    /// connection pool.
    pub fn with_client(config: ChatConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn build_message(&self, notification: &Notification) -> ChatMessage {
        ChatMessage {
            channel: self.config.channel.clone(),
            username: self.config.username.clone(),
            icon_emoji: self.config.icon_emoji.clone(),
            icon_url: self.config.icon_url.clone(),
            text: notification.subject.clone(),
            attachments: vec![build_attachment(notification)],
        }
    }
}

impl Channel for ChatChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::ChatWebhook
    }

    #[instrument(skip(self, notification), fields(channel = %self.config.name, event_id = %notification.id))]
    async fn send(&self, notification: &Notification) -> Result<Delivery, ChannelError> {
        let message = self.build_message(notification);

        debug!(url_channel = ?self.config.channel, "posting chat webhook");

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!("chat webhook timed out");
                }
                ChannelError::Transient(e.to_string())
            })?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(Delivery::new(
                &self.config.name,
                serde_json::json!({"status": status}),
            ));
        }

        let body = response.text().await.unwrap_or_default();
        Err(ChannelError::from_status(status, body))
    }

    fn validate(&self) -> Result<(), ChannelError> {
        if self.config.webhook_url.is_empty() {
            return Err(ChannelError::Configuration("webhook URL is empty".into()));
        }
        if !self.config.url_is_valid() {
            return Err(ChannelError::Configuration(format!(
                "webhook URL must match hooks.<provider>/services/..., got '{}'",
                self.config.webhook_url
            )));
        }
        Ok(())
    }

    fn supports_rich(&self) -> bool {
        true
    }

    fn rate_limits(&self) -> RateLimits {
        RateLimits::chat_webhook()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use covgate_core::{EventType, Priority, Severity};

    use super::*;

    /// A minimal mock HTTP server built on tokio that returns canned
    /// responses.
    struct MockHookServer {
        listener: tokio::net::TcpListener,
        base_url: String,
    }

    impl MockHookServer {
        async fn start() -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind mock server");
            let port = listener.local_addr().unwrap().port();
            let base_url = format!("http://127.0.0.1:{port}");
            Self { listener, base_url }
        }

        /// Accept one connection, respond with the given status code, and
        /// return the raw request bytes.
        async fn respond_once(self, status_code: u16, body: &str) -> Vec<u8> {
            let body = body.to_owned();
            let (mut stream, _) = self.listener.accept().await.unwrap();

            use tokio::io::{AsyncReadExt, AsyncWriteExt};

            let mut buf = vec![0u8; 16384];
            let n = stream.read(&mut buf).await.unwrap();
            buf.truncate(n);

            let response = format!(
                "HTTP/1.1 {status_code} OK\r\n\
                 Content-Type: text/plain\r\n\
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
            event_type: EventType::Threshold,
            severity: Severity::Warning,
            priority: Priority::Normal,
            subject: "Coverage Below Threshold: 68.0%".into(),
            message: "details".into(),
            repository: "org/repo".into(),
            branch: "main".into(),
            commit_sha: None,
            pr_number: None,
            author: None,
            coverage: None,
            trend: None,
            links: vec![],
            channels: vec!["chat".into()],
        }
    }

    #[test]
    fn channel_identity() {
        let channel = ChatChannel::new(ChatConfig::new("http://localhost:1/hook"));
        assert_eq!(Channel::name(&channel), "chat");
        assert_eq!(Channel::kind(&channel), ChannelKind::ChatWebhook);
        assert!(Channel::supports_rich(&channel));
        assert_eq!(Channel::rate_limits(&channel), RateLimits::chat_webhook());
    }

    #[test]
    fn validate_rejects_bad_url() {
        let channel = ChatChannel::new(ChatConfig::new("https://example.com/hook"));
        let err = Channel::validate(&channel).unwrap_err();
        assert!(matches!(err, ChannelError::Configuration(_)));

        let empty = ChatChannel::new(ChatConfig::new(""));
        assert!(Channel::validate(&empty).is_err());
    }

    #[test]
    fn validate_accepts_service_url() {
        let channel =
            ChatChannel::new(ChatConfig::new("https://hooks.chat.example/services/T0/B0/x"));
        assert!(Channel::validate(&channel).is_ok());
    }

    #[tokio::test]
    async fn send_success_posts_attachments() {
        let server = MockHookServer::start().await;
        let config = ChatConfig::new(&server.base_url).with_channel("#coverage");
        let channel = ChatChannel::new(config);

        let server_handle = tokio::spawn(async move { server.respond_once(200, "ok").await });

        let delivery = Channel::send(&channel, &notification()).await.unwrap();
        let request = server_handle.await.unwrap();
        let request_str = String::from_utf8_lossy(&request);

        assert_eq!(delivery.channel, "chat");
        assert!(request_str.contains(r##""channel":"#coverage""##));
        assert!(request_str.contains(r#""attachments""#));
        assert!(request_str.contains("Coverage Below Threshold"));
    }

    #[tokio::test]
    async fn send_rate_limited_is_retryable() {
        let server = MockHookServer::start().await;
        let channel = ChatChannel::new(ChatConfig::new(&server.base_url));

        let server_handle =
            tokio::spawn(async move { server.respond_once(429, "rate limited").await });

        let err = Channel::send(&channel, &notification()).await.unwrap_err();
        server_handle.await.unwrap();

        assert!(matches!(err, ChannelError::RateLimited));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn send_client_error_is_permanent() {
        let server = MockHookServer::start().await;
        let channel = ChatChannel::new(ChatConfig::new(&server.base_url));

        let server_handle =
            tokio::spawn(async move { server.respond_once(404, "no such hook").await });

        let err = Channel::send(&channel, &notification()).await.unwrap_err();
        server_handle.await.unwrap();

        assert!(matches!(err, ChannelError::Permanent(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn send_server_error_is_transient() {
        let server = MockHookServer::start().await;
        let channel = ChatChannel::new(ChatConfig::new(&server.base_url));

        let server_handle = tokio::spawn(async move { server.respond_once(500, "boom").await });

        let err = Channel::send(&channel, &notification()).await.unwrap_err();
        server_handle.await.unwrap();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn delivery_ids_are_fresh_per_attempt() {
        let server = MockHookServer::start().await;
        let channel = ChatChannel::new(ChatConfig::new(&server.base_url));
        let server_handle = tokio::spawn(async move { server.respond_once(200, "ok").await });
        let first = Channel::send(&channel, &notification()).await.unwrap();
        server_handle.await.unwrap();

        let server = MockHookServer::start().await;
        let channel = ChatChannel::new(ChatConfig::new(&server.base_url));
        let server_handle = tokio::spawn(async move { server.respond_once(200, "ok").await });
        let second = Channel::send(&channel, &notification()).await.unwrap();
        server_handle.await.unwrap();

        assert_ne!(first.delivery_id, second.delivery_id);
    }
}
