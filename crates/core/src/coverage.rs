//! Coverage measurements carried by events.

use serde::{Deserialize, Serialize};

/// Tolerance used for percentage equality checks.
///
/// Upstream coverage tooling rounds aggressively; two values closer than
/// this are considered equal throughout the pipeline.
pub const EPSILON: f64 = 1e-6;

/// Clamp a percentage into the `[0, 100]` range.
///
/// Non-finite inputs collapse to `0.0` so that upstream rounding noise or
/// serialization glitches cannot poison downstream scoring.
#[must_use]
pub fn saturate_pct(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Returns `true` when two percentages are equal within [`EPSILON`].
#[must_use]
pub fn pct_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Coverage measurements attached to a [`CoverageEvent`](crate::CoverageEvent).
///
/// All percentage fields are expressed in percent points (`0.0..=100.0`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageBody {
    /// Current overall line coverage.
    pub current: f64,

    /// Coverage before the change that produced this event.
    pub previous: f64,

    /// `current - previous`. Recomputed from those fields on validation.
    pub change: f64,

    /// The coverage value the project aims for.
    pub target: f64,

    /// The threshold whose crossing produced this event (if any).
    pub threshold: f64,

    /// Total number of coverable lines.
    pub lines_total: u64,

    /// Number of covered lines.
    pub lines_covered: u64,

    /// Branch coverage percentage.
    pub branch_coverage: f64,

    /// Function coverage percentage.
    pub function_coverage: f64,

    /// Number of tests executed.
    pub test_count: u64,

    /// Number of tests that passed.
    pub tests_passed: u64,

    /// Quality gate outcome, when the event originated from a gate run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_gates: Option<QualityGatesSummary>,

    /// Trend information, when the event originated from trend analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendInfo>,
}

impl CoverageBody {
    /// Clamp every percentage field into `[0, 100]` and recompute `change`
    /// from `current - previous`.
    ///
    /// A zero `previous` is a valid baseline (a brand-new project), so the
    /// recomputation has no carve-out for it.
    pub fn normalize(&mut self) {
        self.current = saturate_pct(self.current);
        self.previous = saturate_pct(self.previous);
        self.target = saturate_pct(self.target);
        self.threshold = saturate_pct(self.threshold);
        self.branch_coverage = saturate_pct(self.branch_coverage);
        self.function_coverage = saturate_pct(self.function_coverage);

        let derived = self.current - self.previous;
        if !pct_eq(self.change, derived) {
            self.change = derived;
        }
    }
}

/// Summary of a quality gate run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityGatesSummary {
    /// Whether all gates passed.
    pub passed: bool,
    /// Total number of gates evaluated.
    pub total_gates: u32,
    /// Number of gates that passed.
    pub passed_gates: u32,
    /// Names of the gates that failed.
    pub failed_gates: Vec<String>,
    /// Aggregate score in `[0, 1]`.
    pub score: f64,
}

/// Direction of a coverage trend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Coverage is rising.
    Up,
    /// Coverage is falling.
    Down,
    /// Coverage is holding steady.
    #[default]
    Stable,
    /// Coverage oscillates without a clear direction.
    Volatile,
}

impl TrendDirection {
    /// Human-readable label used in notification subjects.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Up => "Upward",
            Self::Down => "Downward",
            Self::Stable => "Stable",
            Self::Volatile => "Volatile",
        }
    }
}

/// Trend analysis attached to a coverage body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendInfo {
    /// The overall direction of the trend.
    pub direction: TrendDirection,
    /// Magnitude of the trend in percent points.
    pub magnitude: f64,
    /// Confidence in the trend estimate, `[0, 1]`.
    pub confidence: f64,
    /// Observed volatility.
    pub volatility: f64,
    /// Predicted coverage value, when a prediction exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<f64>,
}

impl TrendInfo {
    /// Clamp confidence into `[0, 1]` and the prediction into `[0, 100]`.
    pub fn normalize(&mut self) {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        if let Some(p) = self.prediction {
            self.prediction = Some(saturate_pct(p));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturate_clamps_range() {
        assert!(pct_eq(saturate_pct(-3.0), 0.0));
        assert!(pct_eq(saturate_pct(101.5), 100.0));
        assert!(pct_eq(saturate_pct(55.5), 55.5));
    }

    #[test]
    fn saturate_rejects_non_finite() {
        assert!(pct_eq(saturate_pct(f64::NAN), 0.0));
        assert!(pct_eq(saturate_pct(f64::INFINITY), 0.0));
    }

    #[test]
    fn normalize_recomputes_change() {
        let mut body = CoverageBody {
            current: 80.0,
            previous: 85.0,
            change: 0.0,
            ..CoverageBody::default()
        };
        body.normalize();
        assert!(pct_eq(body.change, -5.0));
    }

    #[test]
    fn normalize_recomputes_change_from_zero_baseline() {
        let mut body = CoverageBody {
            current: 10.0,
            previous: 0.0,
            change: 999.0,
            ..CoverageBody::default()
        };
        body.normalize();
        assert!(pct_eq(body.change, 10.0));
    }

    #[test]
    fn normalize_keeps_consistent_change() {
        let mut body = CoverageBody {
            current: 82.0,
            previous: 80.0,
            change: 2.0,
            ..CoverageBody::default()
        };
        body.normalize();
        assert!(pct_eq(body.change, 2.0));
    }

    #[test]
    fn normalize_clamps_percentages() {
        let mut body = CoverageBody {
            current: 120.0,
            branch_coverage: -5.0,
            ..CoverageBody::default()
        };
        body.normalize();
        assert!(pct_eq(body.current, 100.0));
        assert!(pct_eq(body.branch_coverage, 0.0));
    }

    #[test]
    fn trend_normalize_clamps_confidence() {
        let mut trend = TrendInfo {
            confidence: 1.7,
            prediction: Some(104.0),
            ..TrendInfo::default()
        };
        trend.normalize();
        assert!(pct_eq(trend.confidence, 1.0));
        assert!(pct_eq(trend.prediction.unwrap(), 100.0));
    }

    #[test]
    fn trend_direction_serde() {
        let json = serde_json::to_string(&TrendDirection::Volatile).unwrap();
        assert_eq!(json, r#""volatile""#);
        let back: TrendDirection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TrendDirection::Volatile);
    }

    #[test]
    fn coverage_body_serde_roundtrip() {
        let body = CoverageBody {
            current: 81.2,
            previous: 79.9,
            change: 1.3,
            quality_gates: Some(QualityGatesSummary {
                passed: true,
                total_gates: 3,
                passed_gates: 3,
                failed_gates: vec![],
                score: 1.0,
            }),
            ..CoverageBody::default()
        };
        let json = serde_json::to_string(&body).unwrap();
        let back: CoverageBody = serde_json::from_str(&json).unwrap();
        assert_eq!(back, body);
    }
}
