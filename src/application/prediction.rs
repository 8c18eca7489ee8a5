//! Prediction service: Runs the scaler + classifier pipeline.
//!
//! The model is optional. When artifacts failed to load at start, every
//! prediction fails with [`PredictionError::ArtifactsUnavailable`] and the
//! rest of the application keeps working.

use std::sync::Arc;

use crate::domain::{ClinicalFeatures, PatientObservation, RiskAssessment};
use crate::ports::{PredictionError, RiskModel};

/// Service for turning validated observations into risk assessments.
pub struct PredictionService<M>
where
    M: RiskModel,
{
    model: Option<Arc<M>>,
}

impl<M> Clone for PredictionService<M>
where
    M: RiskModel,
{
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
        }
    }
}

impl<M> PredictionService<M>
where
    M: RiskModel,
{
    /// Create a prediction service around a loaded model.
    pub fn new(model: Arc<M>) -> Self {
        Self { model: Some(model) }
    }

    /// A service whose predictions always fail.
    #[must_use]
    pub fn unavailable() -> Self {
        Self { model: None }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    /// Description of the loaded model, if any.
    #[must_use]
    pub fn model_description(&self) -> Option<String> {
        self.model.as_ref().map(|m| m.describe())
    }

    /// Predict from a validated observation.
    ///
    /// # Errors
    /// Returns `PredictionError::IncompleteObservation` if a clinical value
    /// is missing, or the model's error if the pipeline fails.
    pub fn predict(
        &self,
        observation: &PatientObservation,
    ) -> Result<RiskAssessment, PredictionError> {
        let features = observation
            .clinical
            .complete()
            .ok_or(PredictionError::IncompleteObservation)?;
        self.predict_features(&features)
    }

    /// Predict from a complete feature set.
    ///
    /// # Errors
    /// Returns error if no model is loaded or the pipeline fails.
    pub fn predict_features(
        &self,
        features: &ClinicalFeatures,
    ) -> Result<RiskAssessment, PredictionError> {
        let model = self
            .model
            .as_ref()
            .ok_or(PredictionError::ArtifactsUnavailable)?;

        tracing::debug!("Scaling and classifying {} features", features.to_array().len());
        let classification = model.classify(features)?;
        let assessment = RiskAssessment::new(classification);

        tracing::debug!(
            "Prediction complete: class={}, risk={}",
            assessment.predicted_class,
            assessment.risk_level
        );
        Ok(assessment)
    }
}
