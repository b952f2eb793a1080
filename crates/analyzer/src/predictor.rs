//! Coverage prediction collaborator interface.
//!
//! Forecasting itself is out of scope for this workspace; the analyzer
//! only consumes forecasts through this trait. A caller that has a trained
//! model wires it in; without one the analyzer falls back to its heuristic
//! estimate.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalyzerError;

/// One point of a coverage forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// When the forecast applies.
    pub at: DateTime<Utc>,
    /// Predicted coverage percentage.
    pub coverage: f64,
    /// Confidence in this point, `[0, 1]`.
    pub confidence: f64,
}

/// A source of coverage forecasts.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Forecast coverage over the given horizon. The first point is the
    /// short-term (24h) forecast.
    ///
    /// Implementations return [`AnalyzerError::ModelNotTrained`] when no
    /// model has been fitted, or [`AnalyzerError::InsufficientData`] when
    /// history is too thin.
    async fn forecast(&self, horizon: Duration) -> Result<Vec<ForecastPoint>, AnalyzerError>;
}

/// A predictor returning a fixed forecast, for wiring and tests.
#[derive(Debug, Clone)]
pub struct FixedPredictor {
    points: Vec<ForecastPoint>,
}

impl FixedPredictor {
    /// Create a predictor that always returns the given points.
    #[must_use]
    pub fn new(points: Vec<ForecastPoint>) -> Self {
        Self { points }
    }

    /// Convenience: a single-point forecast.
    #[must_use]
    pub fn single(coverage: f64, confidence: f64) -> Self {
        Self::new(vec![ForecastPoint {
            at: Utc::now() + chrono::Duration::hours(24),
            coverage,
            confidence,
        }])
    }
}

#[async_trait]
impl Predictor for FixedPredictor {
    async fn forecast(&self, _horizon: Duration) -> Result<Vec<ForecastPoint>, AnalyzerError> {
        if self.points.is_empty() {
            return Err(AnalyzerError::InsufficientData(
                "fixed predictor has no points".into(),
            ));
        }
        Ok(self.points.clone())
    }
}
