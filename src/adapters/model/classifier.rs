//! Binary classifiers exported from the training pipeline.
//!
//! Three families are understood:
//! - `logistic_regression`: sigmoid of a linear decision function
//! - `random_forest`: mean of per-tree leaf class fractions
//! - `linear_svm`: sign of a linear decision function, no probability

use serde::{Deserialize, Serialize};

use super::ModelError;
use crate::domain::{Classification, CLINICAL_FEATURE_COUNT};
use crate::ports::PredictionError;

/// One node of an exported decision tree.
///
/// Samples with `x[feature] <= threshold` go left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class weights `[negative, positive]` at the leaf
    Leaf { value: [f64; 2] },
}

/// Flat node array, root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn check(&self, index: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid(format!("tree {index} has no nodes")));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= CLINICAL_FEATURE_COUNT {
                        return Err(ModelError::Invalid(format!(
                            "tree {index} node {i}: feature {feature} out of range"
                        )));
                    }
                    // Children must come after their parent, which rules out cycles.
                    if *left <= i || *right <= i || *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(ModelError::Invalid(format!(
                            "tree {index} node {i}: invalid child index"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::Invalid(format!(
                            "tree {index} node {i}: non-finite threshold"
                        )));
                    }
                }
                TreeNode::Leaf { value } => {
                    let total = value[0] + value[1];
                    if value.iter().any(|v| !v.is_finite() || *v < 0.0) || total <= 0.0 {
                        return Err(ModelError::Invalid(format!(
                            "tree {index} node {i}: leaf weights must be non-negative with a positive sum"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Positive-class fraction at the leaf reached by `x`.
    fn positive_fraction(&self, x: &[f64; CLINICAL_FEATURE_COUNT]) -> Result<f64, PredictionError> {
        let mut index = 0;
        // Bounded walk: a checked tree never needs more steps than it has nodes.
        for _ in 0..self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = x.get(*feature).ok_or_else(|| {
                        PredictionError::Inference(format!("feature index {feature} out of range"))
                    })?;
                    index = if *value <= *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { value }) => return Ok(value[1] / (value[0] + value[1])),
                None => {
                    return Err(PredictionError::Inference(format!(
                        "node index {index} out of range"
                    )))
                }
            }
        }
        Err(PredictionError::Inference("tree walk did not reach a leaf".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    LogisticRegression { coefficients: Vec<f64>, intercept: f64 },
    RandomForest { trees: Vec<DecisionTree> },
    LinearSvm { coefficients: Vec<f64>, intercept: f64 },
}

impl Classifier {
    /// Check shapes and tree structure.
    ///
    /// # Errors
    /// Returns `ModelError::Invalid` describing the first problem found.
    pub fn check(&self) -> Result<(), ModelError> {
        match self {
            Self::LogisticRegression {
                coefficients,
                intercept,
            }
            | Self::LinearSvm {
                coefficients,
                intercept,
            } => {
                if coefficients.len() != CLINICAL_FEATURE_COUNT {
                    return Err(ModelError::Invalid(format!(
                        "classifier expects {CLINICAL_FEATURE_COUNT} coefficients, got {}",
                        coefficients.len()
                    )));
                }
                if coefficients.iter().any(|c| !c.is_finite()) || !intercept.is_finite() {
                    return Err(ModelError::Invalid(
                        "classifier contains non-finite parameters".into(),
                    ));
                }
                Ok(())
            }
            Self::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err(ModelError::Invalid("random forest has no trees".into()));
                }
                trees
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, tree)| tree.check(i))
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LogisticRegression { .. } => "logistic_regression",
            Self::RandomForest { .. } => "random_forest",
            Self::LinearSvm { .. } => "linear_svm",
        }
    }

    #[must_use]
    pub fn supports_probability(&self) -> bool {
        !matches!(self, Self::LinearSvm { .. })
    }

    /// Classify an already-scaled feature vector.
    ///
    /// Ties go to the negative class.
    ///
    /// # Errors
    /// Returns `PredictionError::Inference` on malformed parameters.
    pub fn classify(
        &self,
        scaled: &[f64; CLINICAL_FEATURE_COUNT],
    ) -> Result<Classification, PredictionError> {
        match self {
            Self::LogisticRegression {
                coefficients,
                intercept,
            } => {
                let z = decision_function(coefficients, *intercept, scaled)?;
                Ok(Classification {
                    predicted_class: u8::from(z > 0.0),
                    probability: Some(sigmoid(z)),
                })
            }
            Self::LinearSvm {
                coefficients,
                intercept,
            } => {
                let z = decision_function(coefficients, *intercept, scaled)?;
                Ok(Classification {
                    predicted_class: u8::from(z > 0.0),
                    probability: None,
                })
            }
            Self::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err(PredictionError::Inference("random forest has no trees".into()));
                }
                let mut sum = 0.0;
                for tree in trees {
                    sum += tree.positive_fraction(scaled)?;
                }
                let probability = sum / trees.len() as f64;
                Ok(Classification {
                    predicted_class: u8::from(probability > 0.5),
                    probability: Some(probability),
                })
            }
        }
    }
}

fn decision_function(
    coefficients: &[f64],
    intercept: f64,
    x: &[f64; CLINICAL_FEATURE_COUNT],
) -> Result<f64, PredictionError> {
    if coefficients.len() != x.len() {
        return Err(PredictionError::Inference(format!(
            "expected {} coefficients, got {}",
            x.len(),
            coefficients.len()
        )));
    }
    let z = coefficients.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + intercept;
    if z.is_finite() {
        Ok(z)
    } else {
        Err(PredictionError::Inference("non-finite decision value".into()))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_weights(first: f64) -> Vec<f64> {
        let mut w = vec![0.0; CLINICAL_FEATURE_COUNT];
        w[0] = first;
        w
    }

    fn x(first: f64) -> [f64; CLINICAL_FEATURE_COUNT] {
        let mut v = [0.0; CLINICAL_FEATURE_COUNT];
        v[0] = first;
        v
    }

    fn stump() -> DecisionTree {
        DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 0.0,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: [9.0, 1.0] },
                TreeNode::Leaf { value: [2.0, 8.0] },
            ],
        }
    }

    #[test]
    fn test_logistic_regression() {
        let model = Classifier::LogisticRegression {
            coefficients: unit_weights(2.0),
            intercept: 0.0,
        };
        model.check().expect("Should be valid");

        let high = model.classify(&x(1.0)).expect("Should classify");
        assert_eq!(high.predicted_class, 1);
        assert!((high.probability.expect("prob") - sigmoid(2.0)).abs() < 1e-12);

        let tie = model.classify(&x(0.0)).expect("Should classify");
        assert_eq!(tie.predicted_class, 0);
        assert!((tie.probability.expect("prob") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_linear_svm_has_no_probability() {
        let model = Classifier::LinearSvm {
            coefficients: unit_weights(-1.0),
            intercept: 0.5,
        };
        assert!(!model.supports_probability());

        let result = model.classify(&x(0.0)).expect("Should classify");
        assert_eq!(result.predicted_class, 1);
        assert!(result.probability.is_none());
    }

    #[test]
    fn test_random_forest_averages_leaves() {
        let model = Classifier::RandomForest {
            trees: vec![stump(), stump()],
        };
        model.check().expect("Should be valid");

        let left = model.classify(&x(-1.0)).expect("Should classify");
        assert_eq!(left.predicted_class, 0);
        assert!((left.probability.expect("prob") - 0.1).abs() < 1e-12);

        let right = model.classify(&x(1.0)).expect("Should classify");
        assert_eq!(right.predicted_class, 1);
        assert!((right.probability.expect("prob") - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_tree_checks() {
        let mut cyclic = stump();
        cyclic.nodes[0] = TreeNode::Split {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 2,
        };
        let model = Classifier::RandomForest { trees: vec![cyclic] };
        assert!(model.check().is_err());

        let mut bad_feature = stump();
        bad_feature.nodes[0] = TreeNode::Split {
            feature: CLINICAL_FEATURE_COUNT,
            threshold: 0.0,
            left: 1,
            right: 2,
        };
        assert!(Classifier::RandomForest {
            trees: vec![bad_feature]
        }
        .check()
        .is_err());

        assert!(Classifier::RandomForest { trees: vec![] }.check().is_err());
    }

    #[test]
    fn test_deserialize_tagged_json() {
        let json = r#"{
            "kind": "random_forest",
            "trees": [{"nodes": [
                {"feature": 2, "threshold": 0.5, "left": 1, "right": 2},
                {"value": [3.0, 1.0]},
                {"value": [0.0, 4.0]}
            ]}]
        }"#;
        let model: Classifier = serde_json::from_str(json).expect("Should parse");
        model.check().expect("Should be valid");
        assert_eq!(model.kind(), "random_forest");
    }
}
