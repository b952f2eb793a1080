use thiserror::Error;

/// Errors raised by the impact analyzer and its collaborators.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// No predictor collaborator is wired.
    #[error("no predictor available")]
    PredictorUnavailable,

    /// The predictor exists but its model has not been trained.
    #[error("prediction model not trained")]
    ModelNotTrained,

    /// Not enough history to produce a usable result.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The change-set is malformed.
    #[error("invalid change-set: {0}")]
    InvalidChangeSet(String),
}

impl AnalyzerError {
    /// Stable error code for the taxonomy surfaced to callers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PredictorUnavailable => "predictor_unavailable",
            Self::ModelNotTrained => "model_not_trained",
            Self::InsufficientData(_) => "insufficient_data",
            Self::InvalidChangeSet(_) => "config_invalid",
        }
    }
}
