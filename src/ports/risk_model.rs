//! Risk model port: Trait for the scaler + classifier pipeline.
//!
//! This trait abstracts the model artifacts from the application logic.

use crate::domain::{Classification, ClinicalFeatures};

/// Errors that make a prediction unavailable.
///
/// None of these describe invalid input: validation runs before the model
/// is consulted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    #[error("Model artifacts are not loaded")]
    ArtifactsUnavailable,

    #[error("Observation is incomplete; validate before predicting")]
    IncompleteObservation,

    #[error("Feature transform failed: {0}")]
    Transform(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Trait for binary cardiovascular risk classifiers.
///
/// Implementations must be deterministic: the same features always yield
/// the same classification.
pub trait RiskModel: Send + Sync {
    /// Scale the raw features and classify them.
    ///
    /// # Errors
    /// Returns `PredictionError` if the transform or inference step fails.
    fn classify(&self, features: &ClinicalFeatures) -> Result<Classification, PredictionError>;

    /// Whether `classify` fills in a positive-class probability.
    fn supports_probability(&self) -> bool;

    /// Short description for health checks and logs.
    fn describe(&self) -> String;
}
