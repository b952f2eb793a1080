use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How much risk the project tolerates before gating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    /// Gate aggressively.
    Strict,
    /// Balanced gating.
    #[default]
    Moderate,
    /// Gate only on severe findings.
    Relaxed,
}

/// Magnitude cut points (in percent points of coverage change) separating
/// the four impact levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactThresholds {
    /// Below this the change is negligible.
    pub minor: f64,
    /// At or above this the change is moderate.
    pub moderate: f64,
    /// At or above this the change is major.
    pub major: f64,
    /// At or above this the change is critical.
    pub critical: f64,
}

impl Default for ImpactThresholds {
    fn default() -> Self {
        Self {
            minor: 1.0,
            moderate: 5.0,
            major: 10.0,
            critical: 15.0,
        }
    }
}

/// Thresholds for the three quality gates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    /// Minimum acceptable predicted coverage.
    pub min_coverage: f64,
    /// Most negative acceptable coverage change (a negative number).
    pub max_regression: f64,
    /// Complexity delta above which the complexity factor fires.
    pub max_complexity: f64,
    /// Maximum acceptable risk score.
    pub max_risk: f64,
    /// Desired ratio of test changes to code changes.
    pub test_coverage_ratio: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_coverage: 70.0,
            max_regression: -5.0,
            max_complexity: 10.0,
            max_risk: 0.7,
            test_coverage_ratio: 0.3,
        }
    }
}

/// Configuration for the PR impact analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// How far back the coverage baseline looks.
    pub baseline_period: Duration,
    /// Minimum confidence required before acting on a forecast.
    pub confidence_threshold: f64,
    /// How much risk the project tolerates.
    pub risk_tolerance: RiskTolerance,
    /// Forecast horizon for predictions.
    pub prediction_horizon: Duration,
    /// Impact level cut points.
    pub impact_thresholds: ImpactThresholds,
    /// Quality gate thresholds.
    pub gates: GateThresholds,
    /// Per-file-type impact weights. Unlisted types weigh `1.0`.
    #[serde(default)]
    pub file_type_weights: HashMap<String, f64>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            baseline_period: Duration::from_secs(30 * 24 * 3600),
            confidence_threshold: 0.7,
            risk_tolerance: RiskTolerance::default(),
            prediction_horizon: Duration::from_secs(7 * 24 * 3600),
            impact_thresholds: ImpactThresholds::default(),
            gates: GateThresholds::default(),
            file_type_weights: HashMap::new(),
        }
    }
}

impl AnalyzerConfig {
    /// The impact weight for a file type; unlisted types weigh `1.0`.
    #[must_use]
    pub fn file_type_weight(&self, file_type: &str) -> f64 {
        self.file_type_weights
            .get(file_type)
            .copied()
            .unwrap_or(1.0)
    }

    /// Set a file type weight.
    #[must_use]
    pub fn with_file_type_weight(mut self, file_type: impl Into<String>, weight: f64) -> Self {
        self.file_type_weights.insert(file_type.into(), weight);
        self
    }
}
