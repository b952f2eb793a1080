pub mod analyzer;
pub mod changeset;
pub mod config;
pub mod error;
pub mod impact;
pub mod predictor;

pub use analyzer::ImpactAnalyzer;
pub use changeset::{ChangedFile, FileStatus, PRChangeSet};
pub use config::{AnalyzerConfig, GateThresholds, ImpactThresholds, RiskTolerance};
pub use error::AnalyzerError;
pub use impact::{
    ComplexityAnalysis, FileImpact, GateResult, ImpactAnalysis, ImpactLevel, MediumTermPrediction,
    QualityGateResults, Recommendation, RecommendationKind, RecommendationPriority, RiskAssessment,
    RiskFactor, RiskLevel,
};
pub use predictor::{FixedPredictor, ForecastPoint, Predictor};
