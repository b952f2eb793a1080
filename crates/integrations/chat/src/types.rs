use serde::Serialize;

use covgate_core::{Notification, Severity};

/// Request body posted to the incoming webhook.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Target channel override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Author username.
    pub username: String,

    /// Author emoji icon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,

    /// Author icon URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,

    /// Plain-text fallback.
    pub text: String,

    /// Rich attachment blocks.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// One rich attachment block.
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    /// Sidebar color keyed to severity.
    pub color: String,

    /// Attachment title.
    pub title: String,

    /// Attachment body text.
    pub text: String,

    /// Short labelled fields rendered in columns.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,

    /// Footer line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,

    /// Unix timestamp shown next to the footer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,

    /// Author name line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    /// Author icon URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_icon: Option<String>,
}

/// A labelled field inside an attachment.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentField {
    /// Field label.
    pub title: String,

    /// Field value.
    pub value: String,

    /// Whether the field is narrow enough to share a row.
    pub short: bool,
}

/// Sidebar color for a severity.
#[must_use]
pub fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "#36a64f",
        Severity::Warning => "#daa038",
        Severity::Critical => "#cc0000",
        Severity::Emergency => "#7a0000",
    }
}

/// Build the rich attachment for a notification.
#[must_use]
pub fn build_attachment(notification: &Notification) -> Attachment {
    let mut fields = vec![
        AttachmentField {
            title: "Repository".to_owned(),
            value: notification.repository.clone(),
            short: true,
        },
        AttachmentField {
            title: "Branch".to_owned(),
            value: notification.branch.clone(),
            short: true,
        },
    ];

    if let Some(pr) = notification.pr_number {
        fields.push(AttachmentField {
            title: "Pull Request".to_owned(),
            value: format!("#{pr}"),
            short: true,
        });
    }
    if let Some(ref coverage) = notification.coverage {
        fields.push(AttachmentField {
            title: "Coverage".to_owned(),
            value: format!("{:.2}% ({:+.2})", coverage.current, coverage.change),
            short: true,
        });
    }
    if let Some(ref trend) = notification.trend {
        fields.push(AttachmentField {
            title: "Trend".to_owned(),
            value: trend.direction.label().to_owned(),
            short: true,
        });
    }
    if let Some(ref sha) = notification.commit_sha {
        fields.push(AttachmentField {
            title: "Commit".to_owned(),
            value: sha.clone(),
            short: true,
        });
    }

    Attachment {
        color: severity_color(notification.severity).to_owned(),
        title: notification.subject.clone(),
        text: notification.message.clone(),
        fields,
        footer: Some("covgate".to_owned()),
        ts: Some(notification.timestamp.timestamp()),
        author_name: notification.author.clone(),
        author_icon: None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use covgate_core::{CoverageBody, EventType, Priority};

    use super::*;

    fn notification() -> Notification {
        Notification {
            id: "evt-1".into(),
            timestamp: Utc::now(),
            event_type: EventType::Regression,
            severity: Severity::Critical,
            priority: Priority::High,
            subject: "Coverage Regression: 80.0% → 75.0%".into(),
            message: "details".into(),
            repository: "org/repo".into(),
            branch: "main".into(),
            commit_sha: Some("abc123".into()),
            pr_number: Some(42),
            author: Some("dev".into()),
            coverage: Some(CoverageBody {
                current: 75.0,
                previous: 80.0,
                change: -5.0,
                ..CoverageBody::default()
            }),
            trend: None,
            links: vec![],
            channels: vec![],
        }
    }

    #[test]
    fn colors_by_severity() {
        assert_eq!(severity_color(Severity::Info), "#36a64f");
        assert_eq!(severity_color(Severity::Warning), "#daa038");
        assert_eq!(severity_color(Severity::Critical), "#cc0000");
        assert_eq!(severity_color(Severity::Emergency), "#7a0000");
    }

    #[test]
    fn attachment_carries_fields() {
        let attachment = build_attachment(&notification());
        assert_eq!(attachment.color, "#cc0000");
        assert_eq!(attachment.title, "Coverage Regression: 80.0% → 75.0%");

        let titles: Vec<&str> = attachment.fields.iter().map(|f| f.title.as_str()).collect();
        assert!(titles.contains(&"Repository"));
        assert!(titles.contains(&"Branch"));
        assert!(titles.contains(&"Pull Request"));
        assert!(titles.contains(&"Coverage"));
        assert!(titles.contains(&"Commit"));
        assert_eq!(attachment.author_name.as_deref(), Some("dev"));
    }

    #[test]
    fn message_serializes_without_empty_fields() {
        let message = ChatMessage {
            channel: None,
            username: "covbot".into(),
            icon_emoji: None,
            icon_url: None,
            text: "hello".into(),
            attachments: vec![],
        };
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("channel").is_none());
        assert!(json.get("attachments").is_none());
        assert_eq!(json["username"], "covbot");
    }
}
