//! Per-session state: last assessment, last raw form values and duplicate
//! detection.

use serde::{Deserialize, Serialize};

use super::assessment::RiskAssessment;
use super::patient::{PatientObservation, ValidatedObservation};

/// Whether a submission produced a fresh assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    New,
    Duplicate,
}

/// The last successful submission of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSubmission {
    pub observation: ValidatedObservation,
    pub assessment: RiskAssessment,
    /// Store key, when the assessment made it into history
    pub record_id: Option<i64>,
}

/// State owned by one user session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    last: Option<LastSubmission>,
    field_values: Option<PatientObservation>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last(&self) -> Option<&LastSubmission> {
        self.last.as_ref()
    }

    /// Raw values of the most recent attempt, for restoring the form.
    #[must_use]
    pub fn field_values(&self) -> Option<&PatientObservation> {
        self.field_values.as_ref()
    }

    /// Previous assessment if `observation` resubmits the same patient with
    /// identical clinical values.
    ///
    /// Values are compared exactly as parsed; no tolerance is applied.
    #[must_use]
    pub fn duplicate_of(&self, observation: &ValidatedObservation) -> Option<&LastSubmission> {
        self.last.as_ref().filter(|last| {
            last.observation.patient_id == observation.patient_id
                && last.observation.features == observation.features
        })
    }

    /// Record the raw values of any attempt, valid or not.
    pub fn record_attempt(&mut self, observation: &PatientObservation) {
        self.field_values = Some(observation.clone());
    }

    pub fn record_success(&mut self, submission: LastSubmission) {
        self.last = Some(submission);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last.is_none() && self.field_values.is_none()
    }
}

/// Generate a random session identifier (UUID v4 format) using a CSPRNG.
#[must_use]
pub fn new_session_id() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}
