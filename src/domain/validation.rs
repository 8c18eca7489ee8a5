//! Validation engine for submitted observations.
//!
//! Checks run in a fixed precedence: identity fields, then missing clinical
//! values, then closed-range checks on the values that are present.

use serde::{Deserialize, Serialize};

use super::patient::{Field, PatientObservation};

/// A clinical value outside its inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeError {
    pub field: Field,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl std::fmt::Display for RangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} out of range [{}, {}]",
            self.field.label(),
            self.value,
            self.min,
            self.max
        )
    }
}

/// Outcome of [`validate`]. Valid when both lists are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub missing_fields: Vec<Field>,
    pub range_errors: Vec<RangeError>,
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.missing_fields.is_empty() && self.range_errors.is_empty()
    }

    /// Message suitable for showing next to the form.
    #[must_use]
    pub fn message(&self) -> String {
        let mut parts = Vec::new();

        match self.missing_fields.as_slice() {
            [] => {}
            [only] => parts.push(format!("Please fill in the missing field: {}", only.label())),
            many => {
                let labels: Vec<&str> = many.iter().map(Field::label).collect();
                parts.push(format!(
                    "Please fill in the missing fields: {}",
                    labels.join(", ")
                ));
            }
        }

        parts.extend(self.range_errors.iter().map(ToString::to_string));
        parts.join("; ")
    }
}

impl std::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Validate an observation. Pure function of its input.
///
/// A missing value never produces a range error.
#[must_use]
pub fn validate(observation: &PatientObservation) -> ValidationResult {
    let mut result = ValidationResult::default();

    if observation.name().is_none() {
        result.missing_fields.push(Field::PatientName);
    }
    if observation.id().is_none() {
        result.missing_fields.push(Field::PatientId);
    }

    for field in Field::CLINICAL {
        if observation.clinical.get(field).is_none() {
            result.missing_fields.push(field);
        }
    }

    for field in Field::CLINICAL {
        let (Some(value), Some((min, max))) = (observation.clinical.get(field), field.range())
        else {
            continue;
        };
        // NaN fails `contains` and is reported as out of range.
        if !(min..=max).contains(&value) {
            result.range_errors.push(RangeError {
                field,
                value,
                min,
                max,
            });
        }
    }

    result
}
