//! RFC-5322 message assembly.

use lettre::Message;
use lettre::message::header::{Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart, SinglePart};

use covgate_channel::ChannelError;
use covgate_core::{Notification, Priority};

use crate::config::EmailConfig;

/// `X-Mailer` header identifying the sending software.
#[derive(Debug, Clone)]
pub(crate) struct XMailer(pub String);

impl Header for XMailer {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Mailer")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_owned()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// `X-Priority` header (1 = highest, 5 = lowest).
#[derive(Debug, Clone)]
pub(crate) struct XPriority(pub String);

impl Header for XPriority {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Priority")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_owned()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// Numeric mail priority for a notification priority.
#[must_use]
pub fn x_priority(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "1",
        Priority::High => "2",
        Priority::Normal => "3",
        Priority::Low => "4",
    }
}

/// Minimal HTML alternative for rich mail clients.
#[must_use]
pub fn html_body(notification: &Notification) -> String {
    let mut html = String::new();
    html.push_str("<html><body>");
    html.push_str(&format!("<h2>{}</h2>", escape(&notification.subject)));
    html.push_str(&format!(
        "<pre style=\"font-family:monospace\">{}</pre>",
        escape(&notification.message)
    ));
    if !notification.links.is_empty() {
        html.push_str("<p>");
        for link in &notification.links {
            html.push_str(&format!(
                "<a href=\"{}\">{}</a> ",
                escape(&link.url),
                escape(&link.label)
            ));
        }
        html.push_str("</p>");
    }
    html.push_str("</body></html>");
    html
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Assemble the outgoing message for a notification.
pub fn build_message(
    config: &EmailConfig,
    notification: &Notification,
) -> Result<Message, ChannelError> {
    let from: Mailbox = config
        .from_address
        .parse()
        .map_err(|e| ChannelError::Configuration(format!("invalid from address: {e}")))?;

    if config.to_addresses.is_empty() {
        return Err(ChannelError::Configuration(
            "no recipient addresses configured".into(),
        ));
    }

    let mut builder = Message::builder()
        .from(from)
        .subject(&notification.subject)
        .header(XMailer("covgate".to_owned()))
        .header(XPriority(x_priority(notification.priority).to_owned()));

    for to in &config.to_addresses {
        let mailbox: Mailbox = to
            .parse()
            .map_err(|e| ChannelError::Configuration(format!("invalid recipient '{to}': {e}")))?;
        builder = builder.to(mailbox);
    }

    let message = if config.html {
        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(lettre::message::header::ContentType::TEXT_PLAIN)
                            .body(notification.message.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(lettre::message::header::ContentType::TEXT_HTML)
                            .body(html_body(notification)),
                    ),
            )
            .map_err(|e| ChannelError::Permanent(format!("failed to build email: {e}")))?
    } else {
        builder
            .body(notification.message.clone())
            .map_err(|e| ChannelError::Permanent(format!("failed to build email: {e}")))?
    };

    Ok(message)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use covgate_core::{EventType, Link, LinkKind, Severity};

    use super::*;

    fn notification() -> Notification {
        Notification {
            id: "evt-1".into(),
            timestamp: Utc::now(),
            event_type: EventType::Threshold,
            severity: Severity::Warning,
            priority: Priority::High,
            subject: "Coverage Below Threshold: 68.0%".into(),
            message: "Repository: org/repo\nBranch: main".into(),
            repository: "org/repo".into(),
            branch: "main".into(),
            commit_sha: None,
            pr_number: None,
            author: None,
            coverage: None,
            trend: None,
            links: vec![Link::new(
                LinkKind::Repo,
                "repository",
                "https://github.com/org/repo",
            )],
            channels: vec!["email".into()],
        }
    }

    fn config() -> EmailConfig {
        EmailConfig::new("localhost", "bot@example.com").with_recipient("team@example.com")
    }

    #[test]
    fn priority_mapping() {
        assert_eq!(x_priority(Priority::Urgent), "1");
        assert_eq!(x_priority(Priority::High), "2");
        assert_eq!(x_priority(Priority::Normal), "3");
        assert_eq!(x_priority(Priority::Low), "4");
    }

    #[test]
    fn builds_multipart_message() {
        let message = build_message(&config(), &notification()).unwrap();
        let rendered = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(rendered.contains("Subject: Coverage Below Threshold"));
        assert!(rendered.contains("X-Mailer: covgate"));
        assert!(rendered.contains("X-Priority: 2"));
        assert!(rendered.contains("multipart/alternative"));
        assert!(rendered.contains("text/html"));
    }

    #[test]
    fn builds_plaintext_message() {
        let mut config = config();
        config.html = false;
        let message = build_message(&config, &notification()).unwrap();
        let rendered = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(!rendered.contains("multipart/alternative"));
        assert!(rendered.contains("Repository: org/repo"));
    }

    #[test]
    fn invalid_from_is_configuration_error() {
        let mut config = config();
        config.from_address = "not-an-address".into();
        let err = build_message(&config, &notification()).unwrap_err();
        assert!(matches!(err, ChannelError::Configuration(_)));
    }

    #[test]
    fn missing_recipients_is_configuration_error() {
        let config = EmailConfig::new("localhost", "bot@example.com");
        let err = build_message(&config, &notification()).unwrap_err();
        assert!(matches!(err, ChannelError::Configuration(_)));
    }

    #[test]
    fn html_escapes_markup() {
        let mut n = notification();
        n.subject = "a <b> & c".into();
        let html = html_body(&n);
        assert!(html.contains("a &lt;b&gt; &amp; c"));
    }

    #[test]
    fn multiple_recipients_accepted() {
        let config = config().with_recipient("second@example.com");
        let message = build_message(&config, &notification()).unwrap();
        let rendered = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(rendered.contains("team@example.com"));
        assert!(rendered.contains("second@example.com"));
    }
}
