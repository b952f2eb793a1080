//! Analyzer output types.

use serde::{Deserialize, Serialize};

/// How large the predicted coverage impact of a change-set is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    /// Negligible impact.
    Minor,
    /// Noticeable impact.
    Moderate,
    /// Large impact.
    Major,
    /// Very large impact.
    Critical,
}

impl ImpactLevel {
    /// Stable string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }
}

/// Severity of a single risk factor, and the overall risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Low risk.
    Low,
    /// Moderate risk.
    Moderate,
    /// High risk.
    High,
    /// Critical risk.
    Critical,
}

impl RiskLevel {
    /// Weight used in the risk score formula.
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Moderate => 0.5,
            Self::High => 0.75,
            Self::Critical => 1.0,
        }
    }

    /// Map a magnitude in percent points onto a risk level.
    ///
    /// `[0,5)` low, `[5,10)` moderate, `[10,15)` high, `>=15` critical.
    #[must_use]
    pub fn from_magnitude(magnitude: f64) -> Self {
        if magnitude >= 15.0 {
            Self::Critical
        } else if magnitude >= 10.0 {
            Self::High
        } else if magnitude >= 5.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    /// Stable string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// The scored impact of one changed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileImpact {
    /// Repository-relative path.
    pub path: String,
    /// Weighted impact score.
    pub impact_score: f64,
    /// Heuristic estimate of the coverage change this file causes, in
    /// percent points.
    pub estimated_coverage_change: f64,
    /// Risk-factor tags attached to this file.
    pub risk_factors: Vec<String>,
}

/// One named contributor to the overall risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Stable factor name (e.g. `sensitive_code_area`).
    pub name: String,
    /// Severity of the factor.
    pub severity: RiskLevel,
    /// Magnitude in percent points used by the risk score formula.
    pub impact: f64,
    /// Human-readable description.
    pub description: String,
}

/// The aggregated risk picture for a change-set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Overall risk level.
    pub overall_risk: RiskLevel,
    /// Score in `[0, 1]`.
    pub risk_score: f64,
    /// Contributing factors.
    pub factors: Vec<RiskFactor>,
    /// Suggested mitigations.
    pub mitigations: Vec<String>,
}

impl RiskAssessment {
    /// Whether a named factor is present.
    #[must_use]
    pub fn has_factor(&self, name: &str) -> bool {
        self.factors.iter().any(|f| f.name == name)
    }
}

/// Outcome of a single quality gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    /// Gate name (`minimum_coverage`, `coverage_regression`, `risk_score`).
    pub name: String,
    /// The measured value.
    pub value: f64,
    /// The configured threshold.
    pub threshold: f64,
    /// Whether the gate passed.
    pub passed: bool,
    /// Score floored at 0. The regression gate's score exceeds 1 when the
    /// metric beats its threshold; the others cap at 1.
    pub score: f64,
    /// Optional failure explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Combined quality gate outcome for a change-set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityGateResults {
    /// Whether every gate passed.
    pub passed: bool,
    /// Names of the gates that failed.
    pub failed_gates: Vec<String>,
    /// Per-gate results.
    pub gates: Vec<GateResult>,
    /// Mean of the gate scores.
    pub overall_score: f64,
}

/// Complexity summary for a change-set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    /// Sum of per-file complexity scores.
    pub total_complexity: f64,
    /// Total minus the per-file baseline assumption of 2.
    pub complexity_delta: f64,
    /// Paths of files whose complexity exceeds the hotspot bar.
    pub hotspots: Vec<String>,
}

/// What a recommendation asks the author to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Add or improve tests.
    Testing,
    /// Reduce complexity.
    Refactor,
    /// Address a failing quality gate.
    QualityGate,
}

/// Priority of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    /// Can wait.
    Low,
    /// Should be addressed soon.
    Medium,
    /// Should be addressed before merge.
    High,
}

/// A single actionable recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// What kind of action is recommended.
    pub kind: RecommendationKind,
    /// How urgent it is.
    pub priority: RecommendationPriority,
    /// Human-readable text.
    pub message: String,
}

/// A medium-term forecast derived from the short-term prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediumTermPrediction {
    /// Predicted coverage at the horizon.
    pub predicted_coverage: f64,
    /// Confidence in the forecast, `[0, 1]`.
    pub confidence: f64,
}

/// The full result of analyzing one pull-request change-set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    /// Overall impact level by coverage-change magnitude.
    pub overall_impact: ImpactLevel,
    /// Predicted coverage after merge, percent.
    pub predicted_coverage: f64,
    /// Predicted coverage change relative to the baseline, percent points.
    pub coverage_change: f64,
    /// Confidence in the prediction, `[0, 1]`.
    pub confidence_score: f64,
    /// Risk picture.
    pub risk_assessment: RiskAssessment,
    /// Quality gate outcome.
    pub quality_gate_results: QualityGateResults,
    /// Per-file impact scores.
    pub file_impacts: Vec<FileImpact>,
    /// Complexity summary.
    pub complexity_analysis: ComplexityAnalysis,
    /// Actionable recommendations.
    pub recommendations: Vec<Recommendation>,
    /// Warnings worth surfacing verbatim.
    pub warnings: Vec<String>,
    /// Medium-term forecast, when the horizon allows one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium_term: Option<MediumTermPrediction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impact_level_ordering() {
        assert!(ImpactLevel::Minor < ImpactLevel::Moderate);
        assert!(ImpactLevel::Major < ImpactLevel::Critical);
    }

    #[test]
    fn risk_level_from_magnitude() {
        assert_eq!(RiskLevel::from_magnitude(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_magnitude(4.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_magnitude(5.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_magnitude(9.9), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_magnitude(10.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_magnitude(14.9), RiskLevel::High);
        assert_eq!(RiskLevel::from_magnitude(15.0), RiskLevel::Critical);
    }

    #[test]
    fn risk_level_weights() {
        assert!((RiskLevel::Low.weight() - 0.25).abs() < f64::EPSILON);
        assert!((RiskLevel::Moderate.weight() - 0.5).abs() < f64::EPSILON);
        assert!((RiskLevel::High.weight() - 0.75).abs() < f64::EPSILON);
        assert!((RiskLevel::Critical.weight() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn impact_level_serde() {
        let json = serde_json::to_string(&ImpactLevel::Moderate).unwrap();
        assert_eq!(json, r#""moderate""#);
    }
}
