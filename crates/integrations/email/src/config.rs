use serde::{Deserialize, Serialize};

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    /// Plain connection. Only for local relays and tests.
    None,
    /// Upgrade the connection with STARTTLS.
    StartTls,
    /// TLS from the first byte (SMTPS).
    Implicit,
}

/// Configuration for the SMTP email channel.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Channel instance name used for registration and routing.
    pub name: String,

    /// SMTP server hostname.
    pub smtp_host: String,

    /// SMTP server port. 587 (STARTTLS submission) by default.
    pub smtp_port: u16,

    /// Optional SMTP username.
    pub username: Option<String>,

    /// Optional SMTP password.
    pub password: Option<String>,

    /// Whether the connection is secured. The mode follows the port: 465
    /// uses implicit TLS, everything else STARTTLS.
    pub tls: bool,

    /// The `From` address of outgoing mail.
    pub from_address: String,

    /// Recipient addresses.
    pub to_addresses: Vec<String>,

    /// Whether to attach an HTML alternative part.
    pub html: bool,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("name", &self.name)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("tls", &self.tls)
            .field("from_address", &self.from_address)
            .field("to_addresses", &self.to_addresses)
            .field("html", &self.html)
            .finish()
    }
}

impl EmailConfig {
    /// Create a configuration for the given relay and sender.
    pub fn new(smtp_host: impl Into<String>, from_address: impl Into<String>) -> Self {
        Self {
            name: "email".to_owned(),
            smtp_host: smtp_host.into(),
            smtp_port: 587,
            username: None,
            password: None,
            tls: true,
            from_address: from_address.into(),
            to_addresses: Vec::new(),
            html: true,
        }
    }

    /// Set the channel instance name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the SMTP port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.smtp_port = port;
        self
    }

    /// Set SMTP credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Disable TLS. Only for local relays and tests.
    #[must_use]
    pub fn without_tls(mut self) -> Self {
        self.tls = false;
        self
    }

    /// Add a recipient.
    #[must_use]
    pub fn with_recipient(mut self, address: impl Into<String>) -> Self {
        self.to_addresses.push(address.into());
        self
    }

    /// The TLS mode implied by the configuration.
    ///
    /// Port 465 means TLS from the first byte; any other secured port uses
    /// STARTTLS. lettre enforces a TLS 1.2 minimum for both.
    #[must_use]
    pub fn tls_mode(&self) -> TlsMode {
        if !self.tls {
            TlsMode::None
        } else if self.smtp_port == 465 {
            TlsMode::Implicit
        } else {
            TlsMode::StartTls
        }
    }
}
