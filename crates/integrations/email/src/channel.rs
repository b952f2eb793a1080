use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, error, instrument};

use covgate_channel::{Channel, ChannelError, ChannelKind, Delivery, RateLimits};
use covgate_core::Notification;

use crate::config::{EmailConfig, TlsMode};
use crate::message::build_message;

/// SMTP email channel.
pub struct EmailChannel {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for EmailChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailChannel")
            .field("config", &self.config)
            .field("transport", &"<AsyncSmtpTransport>")
            .finish()
    }
}

impl EmailChannel {
    /// Create a channel, building the SMTP transport from the
    /// configuration.
    pub fn new(config: EmailConfig) -> Result<Self, ChannelError> {
        let transport = build_transport(&config)?;
        Ok(Self { config, transport })
    }

    /// Create a channel with a pre-built transport (for testing).
    pub fn with_transport(
        config: EmailConfig,
        transport: AsyncSmtpTransport<Tokio1Executor>,
    ) -> Self {
        Self { config, transport }
    }
}

impl Channel for EmailChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    #[instrument(skip(self, notification), fields(channel = %self.config.name, event_id = %notification.id))]
    async fn send(&self, notification: &Notification) -> Result<Delivery, ChannelError> {
        let message = build_message(&self.config, notification)?;

        debug!(
            to = ?self.config.to_addresses,
            subject = %notification.subject,
            "sending email via SMTP"
        );
        self.transport.send(message).await.map_err(|e| {
            error!(error = %e, "SMTP send failed");
            map_smtp_error(&e)
        })?;

        Ok(Delivery::new(
            &self.config.name,
            serde_json::json!({"recipients": self.config.to_addresses.len()}),
        ))
    }

    fn validate(&self) -> Result<(), ChannelError> {
        if self.config.smtp_host.is_empty() {
            return Err(ChannelError::Configuration("SMTP host is empty".into()));
        }
        self.config
            .from_address
            .parse::<lettre::message::Mailbox>()
            .map_err(|e| ChannelError::Configuration(format!("invalid from address: {e}")))?;
        if self.config.to_addresses.is_empty() {
            return Err(ChannelError::Configuration(
                "no recipient addresses configured".into(),
            ));
        }
        for to in &self.config.to_addresses {
            to.parse::<lettre::message::Mailbox>().map_err(|e| {
                ChannelError::Configuration(format!("invalid recipient '{to}': {e}"))
            })?;
        }
        Ok(())
    }

    fn rate_limits(&self) -> RateLimits {
        RateLimits::email()
    }
}

/// Build the async SMTP transport for the configured TLS mode.
fn build_transport(
    config: &EmailConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, ChannelError> {
    let builder = match config.tls_mode() {
        TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| ChannelError::Configuration(format!("SMTP relay error: {e}")))?,
        TlsMode::StartTls => {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| ChannelError::Configuration(format!("SMTP TLS relay error: {e}")))?
        }
        TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host),
    };

    let builder = builder.port(config.smtp_port);

    let builder = if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        builder.credentials(Credentials::new(user.clone(), pass.clone()))
    } else {
        builder
    };

    Ok(builder.build())
}

/// Map a lettre SMTP error onto the channel error taxonomy.
fn map_smtp_error(error: &lettre::transport::smtp::Error) -> ChannelError {
    let message = error.to_string();
    if error.is_permanent() {
        ChannelError::Permanent(format!("permanent SMTP error: {message}"))
    } else {
        ChannelError::Transient(format!("SMTP error: {message}"))
    }
}
