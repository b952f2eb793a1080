//! Deterministic scoring of a pull-request change-set.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, instrument};

use covgate_core::{
    CoverageBody, CoverageEvent, EventType, Priority, QualityGatesSummary, Severity, saturate_pct,
};

use crate::changeset::{ChangedFile, FileStatus, PRChangeSet};
use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::impact::{
    ComplexityAnalysis, FileImpact, GateResult, ImpactAnalysis, ImpactLevel, MediumTermPrediction,
    QualityGateResults, Recommendation, RecommendationKind, RecommendationPriority, RiskAssessment,
    RiskFactor, RiskLevel,
};
use crate::predictor::Predictor;

/// Paths matching this pattern are flagged as sensitive code areas.
static SENSITIVE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)auth|security|crypto|password|config|env|secret")
        .expect("sensitive path pattern is valid")
});

/// Complexity above which a file counts as a hotspot.
const HOTSPOT_COMPLEXITY: f64 = 5.0;

/// Per-file complexity assumed for unchanged code.
const BASELINE_COMPLEXITY_PER_FILE: f64 = 2.0;

/// Scores a pull-request change-set into an [`ImpactAnalysis`] and emits a
/// [`CoverageEvent`] describing it.
///
/// The pipeline is deterministic: the same change-set, baseline, and
/// forecast always produce the same analysis.
pub struct ImpactAnalyzer {
    config: AnalyzerConfig,
    predictor: Option<Arc<dyn Predictor>>,
}

impl ImpactAnalyzer {
    /// Create an analyzer with the given configuration and no predictor.
    #[must_use]
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            predictor: None,
        }
    }

    /// Wire a prediction collaborator.
    #[must_use]
    pub fn with_predictor(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// The analyzer configuration.
    #[must_use]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze a change-set against a coverage baseline.
    ///
    /// Without a predictor the short-term forecast step reports
    /// [`AnalyzerError::PredictorUnavailable`] internally and the analyzer
    /// proceeds with the heuristic per-file estimate; predictor errors other
    /// than unavailability propagate to the caller.
    #[instrument(skip(self, changeset), fields(pr = changeset.pr_number, files = changeset.files.len()))]
    pub async fn analyze(
        &self,
        changeset: &PRChangeSet,
        baseline_coverage: f64,
    ) -> Result<ImpactAnalysis, AnalyzerError> {
        let baseline = saturate_pct(baseline_coverage);

        let file_impacts: Vec<FileImpact> = changeset
            .files
            .iter()
            .map(|file| self.score_file(file))
            .collect();

        let (predicted_coverage, coverage_change, confidence_score) =
            match self.predict(changeset, baseline, &file_impacts).await {
                Ok(prediction) => prediction,
                Err(AnalyzerError::PredictorUnavailable) => {
                    let change: f64 = file_impacts
                        .iter()
                        .map(|f| f.estimated_coverage_change)
                        .sum();
                    let predicted = saturate_pct(baseline + change);
                    (predicted, predicted - baseline, heuristic_confidence(changeset))
                }
                Err(err) => return Err(err),
            };

        let medium_term = (self.config.prediction_horizon >= Duration::from_secs(7 * 24 * 3600))
            .then(|| MediumTermPrediction {
                predicted_coverage: saturate_pct(predicted_coverage + coverage_change * 0.5),
                confidence: (confidence_score * 0.8).clamp(0.0, 1.0),
            });

        let complexity_analysis = analyze_complexity(&changeset.files);
        let risk_assessment =
            self.assess_risk(changeset, coverage_change, &file_impacts);
        let quality_gate_results =
            self.evaluate_gates(predicted_coverage, coverage_change, &risk_assessment);
        let overall_impact = self.impact_level(coverage_change.abs());
        let recommendations = self.recommend(
            changeset,
            coverage_change,
            &complexity_analysis,
            &quality_gate_results,
        );
        let warnings = collect_warnings(
            &quality_gate_results,
            &risk_assessment,
            &complexity_analysis,
        );

        debug!(
            predicted = predicted_coverage,
            change = coverage_change,
            impact = overall_impact.as_str(),
            risk = risk_assessment.overall_risk.as_str(),
            gates_passed = quality_gate_results.passed,
            "change-set analyzed"
        );

        Ok(ImpactAnalysis {
            overall_impact,
            predicted_coverage,
            coverage_change,
            confidence_score,
            risk_assessment,
            quality_gate_results,
            file_impacts,
            complexity_analysis,
            recommendations,
            warnings,
            medium_term,
        })
    }

    /// Map an analysis onto a [`CoverageEvent`] ready for publication.
    #[must_use]
    pub fn to_event(
        &self,
        analysis: &ImpactAnalysis,
        changeset: &PRChangeSet,
        repository: &str,
    ) -> CoverageEvent {
        let baseline = analysis.predicted_coverage - analysis.coverage_change;

        let event_type = if !analysis.quality_gate_results.passed {
            EventType::Quality
        } else if analysis.coverage_change.abs() > self.config.impact_thresholds.minor {
            if analysis.coverage_change < 0.0 {
                EventType::Regression
            } else {
                EventType::Improvement
            }
        } else if (analysis.predicted_coverage - self.config.gates.min_coverage).abs() <= 2.0 {
            EventType::Threshold
        } else {
            EventType::Generic
        };

        let (severity, priority) = classify(analysis);

        let gates = &analysis.quality_gate_results;
        #[allow(clippy::cast_possible_truncation)]
        let summary = QualityGatesSummary {
            passed: gates.passed,
            total_gates: gates.gates.len() as u32,
            passed_gates: gates.gates.iter().filter(|g| g.passed).count() as u32,
            failed_gates: gates.failed_gates.clone(),
            score: gates.overall_score,
        };

        let coverage = CoverageBody {
            current: analysis.predicted_coverage,
            previous: saturate_pct(baseline),
            change: analysis.coverage_change,
            target: self.config.gates.min_coverage,
            threshold: self.config.gates.min_coverage,
            quality_gates: Some(summary),
            ..CoverageBody::default()
        };

        CoverageEvent::new(event_type, repository)
            .with_source("pr-impact")
            .with_branch(changeset.branch.clone())
            .with_pr_number(changeset.pr_number)
            .with_author(changeset.author.clone())
            .with_severity(severity)
            .with_priority(priority)
            .with_coverage(coverage)
            .with_data(
                "overall_impact",
                serde_json::json!(analysis.overall_impact.as_str()),
            )
            .with_data(
                "risk_score",
                serde_json::json!(analysis.risk_assessment.risk_score),
            )
            .with_data(
                "recommendation_count",
                serde_json::json!(analysis.recommendations.len()),
            )
    }

    /// Step 1: score one changed file.
    fn score_file(&self, file: &ChangedFile) -> FileImpact {
        #[allow(clippy::cast_precision_loss)]
        let changes = file.total_changes() as f64;
        let base = changes / 100.0;
        let weight = self.config.file_type_weight(&file.file_type);

        let mut status_mult = match file.status {
            FileStatus::Added => 1.5,
            FileStatus::Deleted => 0.8,
            FileStatus::Renamed => 0.5,
            FileStatus::Modified => 1.0,
        };
        if file.is_test {
            status_mult *= 0.7;
        }

        // Test additions tend to raise coverage; untested churn lowers it.
        // The flat +2.0 factor for tests is a modelling assumption.
        let direction = if file.is_test { 2.0 } else { -1.5 };
        let estimated_coverage_change = direction * changes / 1000.0;

        let mut risk_factors = Vec::new();
        if changes > 100.0 {
            risk_factors.push("large_change_set".to_owned());
        }
        if file.complexity_score > HOTSPOT_COMPLEXITY {
            risk_factors.push("high_complexity".to_owned());
        }
        if file.status == FileStatus::Added && !file.is_test {
            risk_factors.push("new_untested_code".to_owned());
        }
        if SENSITIVE_PATH.is_match(&file.path) {
            risk_factors.push("sensitive_code_area".to_owned());
        }

        FileImpact {
            path: file.path.clone(),
            impact_score: base * weight * status_mult,
            estimated_coverage_change,
            risk_factors,
        }
    }

    /// Step 2: short-term forecast through the predictor collaborator.
    async fn predict(
        &self,
        _changeset: &PRChangeSet,
        baseline: f64,
        _file_impacts: &[FileImpact],
    ) -> Result<(f64, f64, f64), AnalyzerError> {
        let predictor = self
            .predictor
            .as_ref()
            .ok_or(AnalyzerError::PredictorUnavailable)?;

        let points = predictor.forecast(Duration::from_secs(24 * 3600)).await?;
        let first = points
            .first()
            .ok_or_else(|| AnalyzerError::InsufficientData("empty forecast".into()))?;

        let predicted = saturate_pct(first.coverage);
        Ok((
            predicted,
            predicted - baseline,
            first.confidence.clamp(0.0, 1.0),
        ))
    }

    /// Step 3: aggregate file-level tags and change-set shape into risk.
    fn assess_risk(
        &self,
        changeset: &PRChangeSet,
        coverage_change: f64,
        file_impacts: &[FileImpact],
    ) -> RiskAssessment {
        let mut factors: Vec<RiskFactor> = Vec::new();

        let mut add_factor = |name: &str, severity: RiskLevel, impact: f64, desc: String| {
            if !factors.iter().any(|f| f.name == name) {
                factors.push(RiskFactor {
                    name: name.to_owned(),
                    severity,
                    impact,
                    description: desc,
                });
            }
        };

        if coverage_change < 0.0 {
            let magnitude = coverage_change.abs();
            add_factor(
                "coverage_regression",
                RiskLevel::from_magnitude(magnitude),
                magnitude,
                format!("predicted coverage drop of {magnitude:.2} points"),
            );
        }

        if changeset.files.len() > 20 {
            add_factor(
                "large_changeset",
                RiskLevel::High,
                15.0,
                format!("{} files changed", changeset.files.len()),
            );
        }

        let complexity_delta_sum: f64 = changeset
            .files
            .iter()
            .map(|f| (f.complexity_score - BASELINE_COMPLEXITY_PER_FILE).abs())
            .sum();
        if complexity_delta_sum > self.config.gates.max_complexity {
            add_factor(
                "high_complexity",
                RiskLevel::Moderate,
                10.0,
                format!("aggregate complexity delta {complexity_delta_sum:.1}"),
            );
        }

        for impact in file_impacts {
            for tag in &impact.risk_factors {
                let (severity, weight) = match tag.as_str() {
                    "sensitive_code_area" => (RiskLevel::High, 20.0),
                    "new_untested_code" => (RiskLevel::High, 15.0),
                    "large_change_set" | "high_complexity" => (RiskLevel::Moderate, 10.0),
                    _ => (RiskLevel::Low, 5.0),
                };
                add_factor(
                    tag,
                    severity,
                    weight,
                    format!("{tag} in {}", impact.path),
                );
            }
        }

        let risk_score = if factors.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let n = factors.len() as f64;
            let sum: f64 = factors
                .iter()
                .map(|f| f.severity.weight() * f.impact / 100.0)
                .sum();
            (sum / n).min(1.0)
        };

        let overall_risk = RiskLevel::from_magnitude(risk_score * 100.0);
        let mitigations = suggest_mitigations(&factors);

        RiskAssessment {
            overall_risk,
            risk_score,
            factors,
            mitigations,
        }
    }

    /// Step 4: evaluate the quality gates.
    fn evaluate_gates(
        &self,
        predicted_coverage: f64,
        coverage_change: f64,
        risk: &RiskAssessment,
    ) -> QualityGateResults {
        let gates_cfg = &self.config.gates;
        let mut gates = Vec::new();

        let min_cov = gates_cfg.min_coverage;
        let passed = predicted_coverage + covgate_core::EPSILON >= min_cov;
        gates.push(GateResult {
            name: "minimum_coverage".to_owned(),
            value: predicted_coverage,
            threshold: min_cov,
            passed,
            score: (predicted_coverage / min_cov).min(1.0),
            message: (!passed).then(|| {
                format!("predicted coverage {predicted_coverage:.2}% is below {min_cov:.2}%")
            }),
        });

        let max_regression = gates_cfg.max_regression;
        let passed = coverage_change + covgate_core::EPSILON >= max_regression;
        gates.push(GateResult {
            name: "coverage_regression".to_owned(),
            value: coverage_change,
            threshold: max_regression,
            passed,
            score: (1.0 + coverage_change / max_regression.abs()).max(0.0),
            message: (!passed).then(|| {
                format!(
                    "coverage change {coverage_change:.2} exceeds the allowed regression of {max_regression:.2}"
                )
            }),
        });

        if !risk.factors.is_empty() {
            let max_risk = gates_cfg.max_risk;
            let passed = risk.risk_score <= max_risk;
            gates.push(GateResult {
                name: "risk_score".to_owned(),
                value: risk.risk_score,
                threshold: max_risk,
                passed,
                score: (1.0 - risk.risk_score / max_risk).max(0.0),
                message: (!passed).then(|| {
                    format!("risk score {:.2} exceeds {max_risk:.2}", risk.risk_score)
                }),
            });
        }

        let failed_gates: Vec<String> = gates
            .iter()
            .filter(|g| !g.passed)
            .map(|g| g.name.clone())
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let overall_score = gates.iter().map(|g| g.score).sum::<f64>() / gates.len() as f64;

        QualityGateResults {
            passed: failed_gates.is_empty(),
            failed_gates,
            gates,
            overall_score,
        }
    }

    /// Step 6: map a coverage-change magnitude onto an impact level.
    fn impact_level(&self, magnitude: f64) -> ImpactLevel {
        let t = &self.config.impact_thresholds;
        if magnitude >= t.critical {
            ImpactLevel::Critical
        } else if magnitude >= t.major {
            ImpactLevel::Major
        } else if magnitude >= t.moderate {
            ImpactLevel::Moderate
        } else {
            ImpactLevel::Minor
        }
    }

    /// Step 7: produce recommendations.
    fn recommend(
        &self,
        changeset: &PRChangeSet,
        coverage_change: f64,
        complexity: &ComplexityAnalysis,
        gates: &QualityGateResults,
    ) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        if coverage_change < -covgate_core::EPSILON {
            recommendations.push(Recommendation {
                kind: RecommendationKind::Testing,
                priority: RecommendationPriority::High,
                message: format!(
                    "add tests to offset the predicted {:.2}-point coverage regression",
                    coverage_change.abs()
                ),
            });
        }

        if complexity.total_complexity > 20.0 || !complexity.hotspots.is_empty() {
            recommendations.push(Recommendation {
                kind: RecommendationKind::Refactor,
                priority: RecommendationPriority::Medium,
                message: format!(
                    "reduce complexity ({} hotspot(s), total {:.1})",
                    complexity.hotspots.len(),
                    complexity.total_complexity
                ),
            });
        }

        if changeset.files.len() > 15 {
            recommendations.push(Recommendation {
                kind: RecommendationKind::Testing,
                priority: RecommendationPriority::Medium,
                message: format!(
                    "a {}-file change-set is hard to cover; consider splitting it",
                    changeset.files.len()
                ),
            });
        }

        for gate in gates.gates.iter().filter(|g| !g.passed) {
            let priority = match gate.name.as_str() {
                "risk_score" => RecommendationPriority::Medium,
                _ => RecommendationPriority::High,
            };
            recommendations.push(Recommendation {
                kind: RecommendationKind::QualityGate,
                priority,
                message: gate
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("quality gate '{}' failed", gate.name)),
            });
        }

        recommendations
    }
}

/// Step 5: complexity summary.
fn analyze_complexity(files: &[ChangedFile]) -> ComplexityAnalysis {
    let total_complexity: f64 = files.iter().map(|f| f.complexity_score).sum();
    #[allow(clippy::cast_precision_loss)]
    let complexity_delta = total_complexity - BASELINE_COMPLEXITY_PER_FILE * files.len() as f64;
    let hotspots = files
        .iter()
        .filter(|f| f.complexity_score > HOTSPOT_COMPLEXITY)
        .map(|f| f.path.clone())
        .collect();
    ComplexityAnalysis {
        total_complexity,
        complexity_delta,
        hotspots,
    }
}

/// Step 8: warnings for failed gates, elevated risk, and hotspots.
fn collect_warnings(
    gates: &QualityGateResults,
    risk: &RiskAssessment,
    complexity: &ComplexityAnalysis,
) -> Vec<String> {
    let mut warnings = Vec::new();
    for gate in gates.gates.iter().filter(|g| !g.passed) {
        warnings.push(
            gate.message
                .clone()
                .unwrap_or_else(|| format!("quality gate '{}' failed", gate.name)),
        );
    }
    if risk.overall_risk >= RiskLevel::High {
        warnings.push(format!(
            "overall risk is {} (score {:.2})",
            risk.overall_risk.as_str(),
            risk.risk_score
        ));
    }
    for hotspot in &complexity.hotspots {
        warnings.push(format!("complexity hotspot: {hotspot}"));
    }
    warnings
}

fn suggest_mitigations(factors: &[RiskFactor]) -> Vec<String> {
    let mut mitigations = Vec::new();
    for factor in factors {
        let suggestion = match factor.name.as_str() {
            "coverage_regression" => "extend test coverage before merging",
            "sensitive_code_area" => "request a security-focused review for sensitive paths",
            "new_untested_code" => "add tests covering the newly added code",
            "high_complexity" => "split complex functions before they calcify",
            "large_changeset" | "large_change_set" => "split the pull request into smaller pieces",
            _ => continue,
        };
        if !mitigations.iter().any(|m| m == suggestion) {
            mitigations.push(suggestion.to_owned());
        }
    }
    mitigations
}

/// Confidence of the heuristic estimate, shrinking with change-set size.
fn heuristic_confidence(changeset: &PRChangeSet) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let total = changeset.total_changes() as f64;
    (0.8 - total / 5000.0).clamp(0.3, 0.8)
}

/// Severity and priority implied by an analysis.
fn classify(analysis: &ImpactAnalysis) -> (Severity, Priority) {
    let mut severity = match analysis.overall_impact {
        ImpactLevel::Minor => Severity::Info,
        ImpactLevel::Moderate => Severity::Warning,
        ImpactLevel::Major => Severity::Critical,
        ImpactLevel::Critical => Severity::Emergency,
    };
    if !analysis.quality_gate_results.passed {
        severity = severity.max(Severity::Warning);
    }
    let priority = match severity {
        Severity::Info => Priority::Normal,
        Severity::Warning => Priority::Normal,
        Severity::Critical => Priority::High,
        Severity::Emergency => Priority::Urgent,
    };
    (severity, priority)
}
