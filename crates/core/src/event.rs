use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coverage::CoverageBody;
use crate::error::EventError;

/// The kind of coverage event flowing through the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Coverage crossed a configured threshold.
    Threshold,
    /// Coverage dropped relative to the previous measurement.
    Regression,
    /// Coverage rose relative to the previous measurement.
    Improvement,
    /// A round-number coverage milestone was reached.
    Milestone,
    /// Trend analysis produced an alert.
    Trend,
    /// A forecast predicts a notable coverage value.
    Prediction,
    /// A quality gate run completed.
    Quality,
    /// Anything that does not fit the other kinds.
    #[default]
    Generic,
}

impl EventType {
    /// Stable string form used in dedup keys and templates.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Regression => "regression",
            Self::Improvement => "improvement",
            Self::Milestone => "milestone",
            Self::Trend => "trend",
            Self::Prediction => "prediction",
            Self::Quality => "quality",
            Self::Generic => "generic",
        }
    }
}

/// Delivery priority of an event.
///
/// Ordered so that filters can compare: `Low < Normal < High < Urgent`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Deliver whenever convenient.
    Low,
    /// Regular delivery.
    #[default]
    Normal,
    /// Deliver promptly.
    High,
    /// Deliver immediately.
    Urgent,
}

impl Priority {
    /// Stable string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

/// Severity of the condition the event reports.
///
/// Ordered: `Info < Warning < Critical < Emergency`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    #[default]
    Info,
    /// Something worth looking at.
    Warning,
    /// Something is wrong.
    Critical,
    /// Something is badly wrong.
    Emergency,
}

impl Severity {
    /// Stable string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Emergency => "emergency",
        }
    }
}

/// The canonical unit of work in the pipeline.
///
/// Producers construct an event with the builder methods and hand it to the
/// processor via `publish`. After acceptance the event is immutable except
/// for the processor-owned fields `attempts`, `last_error`, and
/// `processed_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageEvent {
    /// Stable identifier. Content-derived by the processor when empty.
    #[serde(default)]
    pub id: String,

    /// The kind of event.
    pub event_type: EventType,

    /// When the underlying condition was observed. Assigned by the
    /// processor when unset.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Free-form origin tag (e.g. `ci`, `pr-analyzer`).
    #[serde(default)]
    pub source: String,

    /// Repository in `owner/name` form. Used literally for link building.
    pub repository: String,

    /// Branch the event concerns.
    #[serde(default)]
    pub branch: String,

    /// Commit the event concerns, when known.
    #[serde(default)]
    pub commit_sha: Option<String>,

    /// Pull request number, when the event concerns one.
    #[serde(default)]
    pub pr_number: Option<u64>,

    /// Author of the change, when known.
    #[serde(default)]
    pub author: Option<String>,

    /// Delivery priority.
    #[serde(default)]
    pub priority: Priority,

    /// Severity of the reported condition.
    #[serde(default)]
    pub severity: Severity,

    /// Coverage measurements, when the event carries them.
    #[serde(default)]
    pub coverage: Option<CoverageBody>,

    /// Channels to deliver to. Empty means all registered channels.
    #[serde(default)]
    pub target_channels: Vec<String>,

    /// Channels subtracted from the target set.
    #[serde(default)]
    pub exclude_channels: Vec<String>,

    /// Free-form tags for filtering.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Arbitrary structured payload (e.g. `aggregated_count`).
    #[serde(default)]
    pub event_data: HashMap<String, serde_json::Value>,

    /// Number of delivery attempts made. Processor-owned.
    #[serde(default)]
    pub attempts: u32,

    /// Last delivery error, if the final state was not clean. Processor-owned.
    #[serde(default)]
    pub last_error: Option<String>,

    /// When the processor finished handling the event. Processor-owned.
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

impl CoverageEvent {
    /// Create an event of the given type for a repository.
    #[must_use]
    pub fn new(event_type: EventType, repository: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            event_type,
            timestamp: None,
            source: String::new(),
            repository: repository.into(),
            branch: String::new(),
            commit_sha: None,
            pr_number: None,
            author: None,
            priority: Priority::default(),
            severity: Severity::default(),
            coverage: None,
            target_channels: Vec::new(),
            exclude_channels: Vec::new(),
            tags: Vec::new(),
            event_data: HashMap::new(),
            attempts: 0,
            last_error: None,
            processed_at: None,
        }
    }

    /// Set an explicit id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the observation timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Set the origin tag.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Set the commit SHA.
    #[must_use]
    pub fn with_commit_sha(mut self, sha: impl Into<String>) -> Self {
        self.commit_sha = Some(sha.into());
        self
    }

    /// Set the pull request number.
    #[must_use]
    pub fn with_pr_number(mut self, pr: u64) -> Self {
        self.pr_number = Some(pr);
        self
    }

    /// Set the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach coverage measurements.
    #[must_use]
    pub fn with_coverage(mut self, coverage: CoverageBody) -> Self {
        self.coverage = Some(coverage);
        self
    }

    /// Restrict delivery to the named channels.
    #[must_use]
    pub fn with_target_channels(mut self, channels: Vec<String>) -> Self {
        self.target_channels = channels;
        self
    }

    /// Exclude the named channels from delivery.
    #[must_use]
    pub fn with_exclude_channels(mut self, channels: Vec<String>) -> Self {
        self.exclude_channels = channels;
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Attach a structured payload entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.event_data.insert(key.into(), value);
        self
    }

    /// Validate the minimum fields and normalize numeric ranges.
    ///
    /// Percentage fields are saturated rather than rejected so that upstream
    /// rounding noise does not fail publication.
    pub fn validate(&mut self) -> Result<(), EventError> {
        if self.repository.is_empty() {
            return Err(EventError::MissingField("repository"));
        }
        if let Some(ref mut coverage) = self.coverage {
            coverage.normalize();
            if let Some(ref mut trend) = coverage.trend {
                trend.normalize();
            }
        }
        Ok(())
    }

    /// Whether this event was synthesized by an aggregator flush.
    #[must_use]
    pub fn is_aggregated(&self) -> bool {
        self.event_data.contains_key("aggregated_count")
    }
}
