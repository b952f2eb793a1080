//! Maps events onto notifications.

use chrono::{DateTime, Utc};

use covgate_core::{
    CoverageEvent, EventError, EventType, Notification, TrendDirection, build_links,
};

/// Build the notification for an accepted event.
///
/// Pure: the same event and channel set always produce the same
/// notification (up to the build timestamp). Severity, priority,
/// repository, branch, commit, and PR number are carried over verbatim.
///
/// Fails when the event type requires data the event does not carry
/// (e.g. a `threshold` event without a coverage body).
pub fn build_notification(
    event: &CoverageEvent,
    channels: Vec<String>,
    now: DateTime<Utc>,
) -> Result<Notification, EventError> {
    let subject = subject_for(event)?;
    let message = message_for(event, &subject);

    Ok(Notification {
        id: event.id.clone(),
        timestamp: now,
        event_type: event.event_type,
        severity: event.severity,
        priority: event.priority,
        subject,
        message,
        repository: event.repository.clone(),
        branch: event.branch.clone(),
        commit_sha: event.commit_sha.clone(),
        pr_number: event.pr_number,
        author: event.author.clone(),
        coverage: event.coverage.clone(),
        trend: event.coverage.as_ref().and_then(|c| c.trend.clone()),
        links: build_links(
            &event.repository,
            event.commit_sha.as_deref(),
            event.pr_number,
        ),
        channels,
    })
}

/// Subject line per event type.
fn subject_for(event: &CoverageEvent) -> Result<String, EventError> {
    let coverage = || {
        event
            .coverage
            .as_ref()
            .ok_or(EventError::MissingField("coverage"))
    };

    let subject = match event.event_type {
        EventType::Threshold => {
            let c = coverage()?;
            let relation = if c.current >= c.threshold {
                "Above"
            } else {
                "Below"
            };
            format!("Coverage {relation} Threshold: {:.1}%", c.current)
        }
        EventType::Regression => {
            let c = coverage()?;
            format!("Coverage Regression: {:.1}% → {:.1}%", c.previous, c.current)
        }
        EventType::Improvement => {
            let c = coverage()?;
            format!("Coverage Improvement: {:.1}% → {:.1}%", c.previous, c.current)
        }
        EventType::Milestone => {
            let c = coverage()?;
            format!("Coverage Milestone: {:.0}% Reached", c.current)
        }
        EventType::Trend => {
            let direction = coverage()?
                .trend
                .as_ref()
                .map_or(TrendDirection::Stable, |t| t.direction);
            format!("Coverage Trend Alert: {} Trend", direction.label())
        }
        EventType::Prediction => {
            let c = coverage()?;
            let predicted = c
                .trend
                .as_ref()
                .and_then(|t| t.prediction)
                .unwrap_or(c.current);
            format!("Coverage Prediction Alert: {predicted:.1}% Predicted")
        }
        EventType::Quality => {
            let gates = coverage()?
                .quality_gates
                .as_ref()
                .ok_or(EventError::MissingField("coverage.quality_gates"))?;
            let outcome = if gates.passed { "Passed" } else { "Failed" };
            format!("Quality Gates {outcome}")
        }
        EventType::Generic => format!("Coverage Notification: {}", event.repository),
    };
    Ok(subject)
}

/// Longer body text assembling the event's details.
fn message_for(event: &CoverageEvent, subject: &str) -> String {
    let mut lines = vec![subject.to_owned(), String::new()];
    lines.push(format!("Repository: {}", event.repository));
    if !event.branch.is_empty() {
        lines.push(format!("Branch: {}", event.branch));
    }
    if let Some(pr) = event.pr_number {
        lines.push(format!("Pull request: #{pr}"));
    }
    if let Some(ref author) = event.author {
        lines.push(format!("Author: {author}"));
    }
    if let Some(ref sha) = event.commit_sha {
        lines.push(format!("Commit: {sha}"));
    }
    if let Some(ref coverage) = event.coverage {
        lines.push(format!(
            "Coverage: {:.2}% ({:+.2})",
            coverage.current, coverage.change
        ));
        if let Some(ref gates) = coverage.quality_gates {
            lines.push(format!(
                "Quality gates: {}/{} passed",
                gates.passed_gates, gates.total_gates
            ));
            for failed in &gates.failed_gates {
                lines.push(format!("  failed: {failed}"));
            }
        }
    }
    if let Some(count) = event.event_data.get("aggregated_count") {
        lines.push(format!("Aggregated from {count} events"));
    }
    lines.join("\n")
}
