//! The delivery-facing rendering of an event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coverage::{CoverageBody, TrendInfo};
use crate::event::{EventType, Priority, Severity};

/// What a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// The commit the event concerns.
    Commit,
    /// The repository itself.
    Repo,
    /// The pull request the event concerns.
    PullRequest,
    /// An externally hosted coverage report.
    Report,
}

/// A typed hyperlink attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// What the link points at.
    pub kind: LinkKind,
    /// Display label.
    pub label: String,
    /// Absolute URL.
    pub url: String,
}

impl Link {
    /// Create a link.
    #[must_use]
    pub fn new(kind: LinkKind, label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Materialize the links for an event's identifiers.
///
/// The `repository` value is used literally as `owner/name`; it is never
/// re-parsed. Unknown repository shapes still produce the repo link.
#[must_use]
pub fn build_links(
    repository: &str,
    commit_sha: Option<&str>,
    pr_number: Option<u64>,
) -> Vec<Link> {
    let mut links = vec![Link::new(
        LinkKind::Repo,
        "repository",
        format!("https://github.com/{repository}"),
    )];
    if let Some(sha) = commit_sha {
        links.push(Link::new(
            LinkKind::Commit,
            "commit",
            format!("https://github.com/{repository}/commit/{sha}"),
        ));
    }
    if let Some(pr) = pr_number {
        links.push(Link::new(
            LinkKind::PullRequest,
            "pull request",
            format!("https://github.com/{repository}/pull/{pr}"),
        ));
    }
    links
}

/// A notification produced from an accepted event, ready for channel
/// delivery.
///
/// Channels borrow a notification for the duration of one send and must
/// not retain it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Identifier, equal to the originating event's id.
    pub id: String,

    /// When the notification was built.
    pub timestamp: DateTime<Utc>,

    /// The originating event's type.
    pub event_type: EventType,

    /// Severity carried over verbatim from the event.
    pub severity: Severity,

    /// Priority carried over verbatim from the event.
    pub priority: Priority,

    /// Short, single-line subject.
    pub subject: String,

    /// Longer body text.
    pub message: String,

    /// Repository in `owner/name` form.
    pub repository: String,

    /// Branch the event concerns.
    pub branch: String,

    /// Commit the event concerns, when known.
    #[serde(default)]
    pub commit_sha: Option<String>,

    /// Pull request number, when known.
    #[serde(default)]
    pub pr_number: Option<u64>,

    /// Author of the change, when known.
    #[serde(default)]
    pub author: Option<String>,

    /// Coverage measurements, when the event carried them.
    #[serde(default)]
    pub coverage: Option<CoverageBody>,

    /// Trend information, when the event carried it.
    #[serde(default)]
    pub trend: Option<TrendInfo>,

    /// Typed hyperlinks.
    #[serde(default)]
    pub links: Vec<Link>,

    /// Resolved destination channel names.
    #[serde(default)]
    pub channels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_link_always_present() {
        let links = build_links("org/repo", None, None);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, LinkKind::Repo);
        assert_eq!(links[0].url, "https://github.com/org/repo");
    }

    #[test]
    fn commit_and_pr_links() {
        let links = build_links("org/repo", Some("abc123"), Some(7));
        assert_eq!(links.len(), 3);
        assert!(
            links
                .iter()
                .any(|l| l.kind == LinkKind::Commit
                    && l.url == "https://github.com/org/repo/commit/abc123")
        );
        assert!(
            links
                .iter()
                .any(|l| l.kind == LinkKind::PullRequest
                    && l.url == "https://github.com/org/repo/pull/7")
        );
    }

    #[test]
    fn repository_used_literally() {
        // An unusual repository value is not re-parsed; it is substituted as-is.
        let links = build_links("not-a-slash-name", None, None);
        assert_eq!(links[0].url, "https://github.com/not-a-slash-name");
    }

    #[test]
    fn link_kind_serde() {
        let json = serde_json::to_string(&LinkKind::PullRequest).unwrap();
        assert_eq!(json, r#""pull_request""#);
    }
}
