//! Domain layer: Core business types and logic.
//!
//! Pure Rust types with no I/O. Validation, duplicate detection and report
//! formatting live here so they can be tested without a model or a store.

mod assessment;
mod patient;
mod report;
mod session;
mod validation;

pub use assessment::{
    AssessmentRecord, AssessmentSummary, Classification, HistoryStats, RiskAssessment, RiskLevel,
};
pub use patient::{
    ClinicalFeatures, ClinicalInputs, Field, PatientObservation, ValidatedObservation,
    CLINICAL_FEATURE_COUNT,
};
pub use report::{AssessmentReport, ReportEntry};
pub use session::{new_session_id, LastSubmission, SessionState, SubmissionStatus};
pub use validation::{validate, RangeError, ValidationResult};

#[cfg(test)]
pub(crate) use patient::tests::{sample_features, sample_observation};
