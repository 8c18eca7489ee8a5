//! Standard scaler exported from the training pipeline.

use serde::{Deserialize, Serialize};

use super::ModelError;
use crate::domain::{Field, CLINICAL_FEATURE_COUNT};
use crate::ports::PredictionError;

/// `(x - mean) / scale`, per feature.
///
/// A zero scale is treated as 1, matching scikit-learn for constant
/// training columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Optional feature order recorded at export time
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Check shape, finiteness and feature order.
    ///
    /// # Errors
    /// Returns `ModelError::Invalid` describing the first problem found.
    pub fn check(&self) -> Result<(), ModelError> {
        if self.mean.len() != CLINICAL_FEATURE_COUNT || self.scale.len() != CLINICAL_FEATURE_COUNT {
            return Err(ModelError::Invalid(format!(
                "scaler expects {CLINICAL_FEATURE_COUNT} features, got mean={} scale={}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err(ModelError::Invalid("scaler contains non-finite values".into()));
        }
        if !self.feature_names.is_empty() {
            let expected: Vec<&str> = Field::CLINICAL.iter().map(Field::as_str).collect();
            let names: Vec<&str> = self.feature_names.iter().map(String::as_str).collect();
            if names != expected {
                return Err(ModelError::Invalid(format!(
                    "scaler feature order {names:?} does not match {expected:?}"
                )));
            }
        }
        Ok(())
    }

    /// Apply the transform.
    ///
    /// # Errors
    /// Returns `PredictionError::Transform` if the result is not finite.
    pub fn transform(
        &self,
        raw: &[f64; CLINICAL_FEATURE_COUNT],
    ) -> Result<[f64; CLINICAL_FEATURE_COUNT], PredictionError> {
        if self.mean.len() != CLINICAL_FEATURE_COUNT || self.scale.len() != CLINICAL_FEATURE_COUNT {
            return Err(PredictionError::Transform("scaler shape mismatch".into()));
        }

        let mut scaled = [0.0; CLINICAL_FEATURE_COUNT];
        for (i, out) in scaled.iter_mut().enumerate() {
            let scale = if self.scale[i] == 0.0 { 1.0 } else { self.scale[i] };
            *out = (raw[i] - self.mean[i]) / scale;
            if !out.is_finite() {
                return Err(PredictionError::Transform(format!(
                    "non-finite scaled value for {}",
                    Field::CLINICAL[i]
                )));
            }
        }
        Ok(scaled)
    }
}
