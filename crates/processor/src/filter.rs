//! Event filtering.
//!
//! Filters are predicates evaluated in registration order; an event is
//! accepted only if every filter passes, and the first deny is final.

use serde::{Deserialize, Serialize};
use tracing::warn;

use covgate_core::CoverageEvent;

/// A predicate over events.
pub trait Filter: Send + Sync {
    /// Name used in rejection errors and logs.
    fn name(&self) -> &str;

    /// Returns `true` when the event should continue through the pipeline.
    fn should_process(&self, event: &CoverageEvent) -> bool;
}

/// A code-defined filter wrapping a closure.
pub struct FnFilter {
    filter_name: String,
    predicate: Box<dyn Fn(&CoverageEvent) -> bool + Send + Sync>,
}

impl FnFilter {
    /// Wrap a closure as a filter.
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&CoverageEvent) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            filter_name: name.into(),
            predicate: Box::new(predicate),
        }
    }
}

impl Filter for FnFilter {
    fn name(&self) -> &str {
        &self.filter_name
    }

    fn should_process(&self, event: &CoverageEvent) -> bool {
        (self.predicate)(event)
    }
}

/// Event attribute a configured rule examines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    /// The event type.
    Type,
    /// The event severity (ordered).
    Severity,
    /// The event priority (ordered).
    Priority,
    /// The repository.
    Repository,
    /// The branch.
    Branch,
    /// The author.
    Author,
    /// `coverage.current`.
    CoverageCurrent,
    /// `coverage.change`.
    CoverageChange,
    /// Any of the event's tags.
    Tag,
}

/// Comparison applied between the field and the rule value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCondition {
    /// Field equals the value.
    Equals,
    /// Field differs from the value.
    NotEquals,
    /// Field is numerically (or by rank) greater than the value.
    GreaterThan,
    /// Field is numerically (or by rank) less than the value.
    LessThan,
    /// Field contains the value as a substring (or tag set membership).
    Contains,
    /// Field starts with the value.
    StartsWith,
    /// Field ends with the value.
    EndsWith,
    /// Field is one of the listed values.
    InList,
    /// Field is none of the listed values.
    NotInList,
    /// Field lies within `[value[0], value[1]]`.
    Between,
}

/// Whether a matching rule admits or rejects the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterAction {
    /// Matching events pass; non-matching events are rejected.
    Allow,
    /// Matching events are rejected.
    Deny,
}

/// A configuration-defined filter rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFilter {
    /// Name used in rejection errors and logs.
    pub name: String,
    /// The event attribute to examine.
    pub field: FilterField,
    /// The comparison to apply.
    pub condition: FilterCondition,
    /// The comparison operand. Lists for `InList`/`NotInList`, a two-element
    /// array for `Between`, a string or number otherwise.
    pub value: serde_json::Value,
    /// Whether a match admits or rejects.
    pub action: FilterAction,
}

impl RuleFilter {
    /// Create a rule filter.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        field: FilterField,
        condition: FilterCondition,
        value: serde_json::Value,
        action: FilterAction,
    ) -> Self {
        Self {
            name: name.into(),
            field,
            condition,
            value,
            action,
        }
    }

    /// Evaluate whether the rule's condition matches the event.
    fn matches(&self, event: &CoverageEvent) -> bool {
        match self.field {
            FilterField::Type => self.match_str(event.event_type.as_str()),
            FilterField::Severity => self.match_ranked(event.severity as u8, severity_rank(&self.value)),
            FilterField::Priority => self.match_ranked(event.priority as u8, priority_rank(&self.value)),
            FilterField::Repository => self.match_str(&event.repository),
            FilterField::Branch => self.match_str(&event.branch),
            FilterField::Author => event
                .author
                .as_deref()
                .is_some_and(|author| self.match_str(author)),
            FilterField::CoverageCurrent => event
                .coverage
                .as_ref()
                .is_some_and(|c| self.match_num(c.current)),
            FilterField::CoverageChange => event
                .coverage
                .as_ref()
                .is_some_and(|c| self.match_num(c.change)),
            FilterField::Tag => self.match_tags(&event.tags),
        }
    }

    fn match_str(&self, field: &str) -> bool {
        let value = self.value.as_str().unwrap_or_default();
        match self.condition {
            FilterCondition::Equals => field == value,
            FilterCondition::NotEquals => field != value,
            FilterCondition::Contains => field.contains(value),
            FilterCondition::StartsWith => field.starts_with(value),
            FilterCondition::EndsWith => field.ends_with(value),
            FilterCondition::InList => self.list().iter().any(|v| v == field),
            FilterCondition::NotInList => !self.list().iter().any(|v| v == field),
            // Numeric comparisons make no sense for plain strings.
            FilterCondition::GreaterThan | FilterCondition::LessThan | FilterCondition::Between => {
                warn!(filter = %self.name, "numeric condition applied to string field");
                false
            }
        }
    }

    fn match_num(&self, field: f64) -> bool {
        match self.condition {
            FilterCondition::Equals => self
                .value
                .as_f64()
                .is_some_and(|v| covgate_core::pct_eq(field, v)),
            FilterCondition::NotEquals => self
                .value
                .as_f64()
                .is_some_and(|v| !covgate_core::pct_eq(field, v)),
            FilterCondition::GreaterThan => self.value.as_f64().is_some_and(|v| field > v),
            FilterCondition::LessThan => self.value.as_f64().is_some_and(|v| field < v),
            FilterCondition::Between => match self.value.as_array() {
                Some(bounds) if bounds.len() == 2 => {
                    let lo = bounds[0].as_f64().unwrap_or(f64::NEG_INFINITY);
                    let hi = bounds[1].as_f64().unwrap_or(f64::INFINITY);
                    field >= lo && field <= hi
                }
                _ => false,
            },
            FilterCondition::InList => self
                .list_f64()
                .iter()
                .any(|v| covgate_core::pct_eq(field, *v)),
            FilterCondition::NotInList => !self
                .list_f64()
                .iter()
                .any(|v| covgate_core::pct_eq(field, *v)),
            FilterCondition::Contains | FilterCondition::StartsWith | FilterCondition::EndsWith => {
                warn!(filter = %self.name, "string condition applied to numeric field");
                false
            }
        }
    }

    /// Ranked comparison for severity and priority.
    fn match_ranked(&self, field_rank: u8, value_rank: Option<u8>) -> bool {
        let Some(value_rank) = value_rank else {
            return false;
        };
        match self.condition {
            FilterCondition::Equals => field_rank == value_rank,
            FilterCondition::NotEquals => field_rank != value_rank,
            FilterCondition::GreaterThan => field_rank > value_rank,
            FilterCondition::LessThan => field_rank < value_rank,
            _ => {
                warn!(filter = %self.name, "unsupported condition for ranked field");
                false
            }
        }
    }

    fn match_tags(&self, tags: &[String]) -> bool {
        match self.condition {
            FilterCondition::Equals | FilterCondition::Contains => {
                let value = self.value.as_str().unwrap_or_default();
                tags.iter().any(|t| t == value)
            }
            FilterCondition::NotEquals => {
                let value = self.value.as_str().unwrap_or_default();
                !tags.iter().any(|t| t == value)
            }
            FilterCondition::InList => {
                let list = self.list();
                tags.iter().any(|t| list.contains(t))
            }
            FilterCondition::NotInList => {
                let list = self.list();
                !tags.iter().any(|t| list.contains(t))
            }
            _ => {
                warn!(filter = %self.name, "unsupported condition for tag field");
                false
            }
        }
    }

    fn list(&self) -> Vec<String> {
        self.value
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn list_f64(&self) -> Vec<f64> {
        self.value
            .as_array()
            .map(|values| values.iter().filter_map(serde_json::Value::as_f64).collect())
            .unwrap_or_default()
    }
}

impl Filter for RuleFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_process(&self, event: &CoverageEvent) -> bool {
        let matched = self.matches(event);
        match self.action {
            FilterAction::Allow => matched,
            FilterAction::Deny => !matched,
        }
    }
}

fn severity_rank(value: &serde_json::Value) -> Option<u8> {
    match value.as_str()? {
        "info" => Some(0),
        "warning" => Some(1),
        "critical" => Some(2),
        "emergency" => Some(3),
        _ => None,
    }
}

fn priority_rank(value: &serde_json::Value) -> Option<u8> {
    match value.as_str()? {
        "low" => Some(0),
        "normal" => Some(1),
        "high" => Some(2),
        "urgent" => Some(3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use covgate_core::{CoverageBody, EventType, Severity};

    use super::*;

    fn event() -> CoverageEvent {
        CoverageEvent::new(EventType::Regression, "org/repo")
            .with_branch("main")
            .with_severity(Severity::Warning)
            .with_tag("nightly")
            .with_coverage(CoverageBody {
                current: 72.5,
                previous: 75.0,
                change: -2.5,
                ..CoverageBody::default()
            })
    }

    fn rule(
        field: FilterField,
        condition: FilterCondition,
        value: serde_json::Value,
        action: FilterAction,
    ) -> RuleFilter {
        RuleFilter::new("test-rule", field, condition, value, action)
    }

    #[test]
    fn fn_filter_delegates_to_closure() {
        let filter = FnFilter::new("main-only", |e: &CoverageEvent| e.branch == "main");
        assert!(filter.should_process(&event()));
        let other = CoverageEvent::new(EventType::Generic, "org/repo").with_branch("dev");
        assert!(!filter.should_process(&other));
    }

    #[test]
    fn allow_repository_equals() {
        let filter = rule(
            FilterField::Repository,
            FilterCondition::Equals,
            serde_json::json!("org/repo"),
            FilterAction::Allow,
        );
        assert!(filter.should_process(&event()));
    }

    #[test]
    fn deny_branch_equals() {
        let filter = rule(
            FilterField::Branch,
            FilterCondition::Equals,
            serde_json::json!("main"),
            FilterAction::Deny,
        );
        assert!(!filter.should_process(&event()));
    }

    #[test]
    fn severity_greater_than() {
        let filter = rule(
            FilterField::Severity,
            FilterCondition::GreaterThan,
            serde_json::json!("info"),
            FilterAction::Allow,
        );
        assert!(filter.should_process(&event()));

        let strict = rule(
            FilterField::Severity,
            FilterCondition::GreaterThan,
            serde_json::json!("critical"),
            FilterAction::Allow,
        );
        assert!(!strict.should_process(&event()));
    }

    #[test]
    fn coverage_current_less_than() {
        let filter = rule(
            FilterField::CoverageCurrent,
            FilterCondition::LessThan,
            serde_json::json!(80.0),
            FilterAction::Allow,
        );
        assert!(filter.should_process(&event()));
    }

    #[test]
    fn coverage_change_between() {
        let filter = rule(
            FilterField::CoverageChange,
            FilterCondition::Between,
            serde_json::json!([-5.0, 0.0]),
            FilterAction::Allow,
        );
        assert!(filter.should_process(&event()));

        let outside = rule(
            FilterField::CoverageChange,
            FilterCondition::Between,
            serde_json::json!([0.0, 5.0]),
            FilterAction::Allow,
        );
        assert!(!outside.should_process(&event()));
    }

    #[test]
    fn type_in_list() {
        let filter = rule(
            FilterField::Type,
            FilterCondition::InList,
            serde_json::json!(["regression", "threshold"]),
            FilterAction::Allow,
        );
        assert!(filter.should_process(&event()));
    }

    #[test]
    fn tag_membership() {
        let filter = rule(
            FilterField::Tag,
            FilterCondition::Contains,
            serde_json::json!("nightly"),
            FilterAction::Allow,
        );
        assert!(filter.should_process(&event()));

        let denied = rule(
            FilterField::Tag,
            FilterCondition::Contains,
            serde_json::json!("release"),
            FilterAction::Allow,
        );
        assert!(!denied.should_process(&event()));
    }

    #[test]
    fn branch_starts_with() {
        let filter = rule(
            FilterField::Branch,
            FilterCondition::StartsWith,
            serde_json::json!("ma"),
            FilterAction::Allow,
        );
        assert!(filter.should_process(&event()));
    }

    #[test]
    fn repository_not_in_list() {
        let filter = rule(
            FilterField::Repository,
            FilterCondition::NotInList,
            serde_json::json!(["other/repo"]),
            FilterAction::Allow,
        );
        assert!(filter.should_process(&event()));
    }

    #[test]
    fn missing_coverage_never_matches() {
        let bare = CoverageEvent::new(EventType::Generic, "org/repo");
        let filter = rule(
            FilterField::CoverageCurrent,
            FilterCondition::GreaterThan,
            serde_json::json!(0.0),
            FilterAction::Allow,
        );
        assert!(!filter.should_process(&bare));
    }
}
