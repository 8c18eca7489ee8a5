//! Assessment service: Orchestrates validation, prediction and history.
//!
//! One submission is one synchronous unit of work:
//! validate, check for a duplicate, predict, persist, update the session.
//! Persistence is best-effort; a failed write is reported as a warning on
//! the outcome and never turns a successful prediction into an error.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::adapters::StorageError;
use crate::domain::{
    validate, AssessmentRecord, AssessmentReport, AssessmentSummary, HistoryStats,
    LastSubmission, PatientObservation, RiskAssessment, SessionState, SubmissionStatus,
    ValidatedObservation, ValidationResult,
};
use crate::ports::{AssessmentPage, AssessmentStore, PredictionError, RiskModel};
use crate::HealthHorizonError;

use super::PredictionService;

/// Result of a submission that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub status: SubmissionStatus,
    pub assessment: RiskAssessment,
    /// Set when the assessment could not be written to history
    pub persistence_warning: bool,
    pub record_id: Option<i64>,
}

/// A history listing with counts over the rows shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub items: Vec<AssessmentSummary>,
    pub stats: HistoryStats,
}

/// Service for the assessment workflow.
pub struct AssessmentService<M, S>
where
    M: RiskModel,
    S: AssessmentStore,
{
    prediction: PredictionService<M>,
    storage: Arc<S>,
}

impl<M, S> AssessmentService<M, S>
where
    M: RiskModel,
    S: AssessmentStore,
    S::Error: Into<StorageError>,
{
    /// Create a new assessment service.
    pub fn new(prediction: PredictionService<M>, storage: Arc<S>) -> Self {
        Self {
            prediction,
            storage,
        }
    }

    #[must_use]
    pub fn prediction(&self) -> &PredictionService<M> {
        &self.prediction
    }

    /// Validate without predicting.
    #[must_use]
    pub fn validate(&self, observation: &PatientObservation) -> ValidationResult {
        validate(observation)
    }

    /// Submit an observation on behalf of a session.
    ///
    /// The raw values are kept on the session whatever the outcome, so the
    /// form can be restored after a validation or prediction failure.
    ///
    /// # Errors
    /// Returns `HealthHorizonError::Validation` for invalid input,
    /// `HealthHorizonError::Prediction` when the model cannot be consulted,
    /// and `HealthHorizonError::Session` if the session lock is poisoned.
    pub fn submit(
        &self,
        session: &Mutex<SessionState>,
        observation: &PatientObservation,
    ) -> Result<SubmissionOutcome, HealthHorizonError> {
        let mut state = session
            .lock()
            .map_err(|_| HealthHorizonError::Session("session state lock poisoned".to_string()))?;

        state.record_attempt(observation);

        let validation = validate(observation);
        if !validation.is_valid() {
            tracing::debug!(
                "Submission rejected: {} missing, {} out of range",
                validation.missing_fields.len(),
                validation.range_errors.len()
            );
            return Err(HealthHorizonError::Validation(validation));
        }

        let validated = observation
            .to_validated()
            .ok_or(PredictionError::IncompleteObservation)?;

        if let Some(previous) = state.duplicate_of(&validated) {
            tracing::info!("Duplicate submission; returning previous assessment");
            return Ok(SubmissionOutcome {
                status: SubmissionStatus::Duplicate,
                assessment: previous.assessment,
                persistence_warning: false,
                record_id: previous.record_id,
            });
        }

        let assessment = self
            .prediction
            .predict_features(&validated.features)
            .map_err(|e| {
                tracing::warn!("Prediction failed: {}", e);
                e
            })?;

        let record_id = self.persist(&validated, &assessment);

        tracing::info!(
            "Assessment complete: class={}, risk={}, saved={}",
            assessment.predicted_class,
            assessment.risk_level,
            record_id.is_some()
        );

        state.record_success(LastSubmission {
            observation: validated,
            assessment,
            record_id,
        });

        Ok(SubmissionOutcome {
            status: SubmissionStatus::New,
            assessment,
            persistence_warning: record_id.is_none(),
            record_id,
        })
    }

    /// Store an assessment. Failures are logged and yield `None`.
    pub fn persist(
        &self,
        observation: &ValidatedObservation,
        assessment: &RiskAssessment,
    ) -> Option<i64> {
        match self.storage.save_assessment(observation, assessment) {
            Ok(id) => Some(id),
            Err(e) => {
                let e: StorageError = e.into();
                tracing::warn!("Failed to save assessment: {}", e);
                None
            }
        }
    }

    /// History listing; a blank term lists everything.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn history(&self, search: Option<&str>) -> Result<History, HealthHorizonError> {
        let items = match search.map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => self.storage.search(term),
            None => self.storage.list_all(),
        }
        .map_err(|e| HealthHorizonError::Storage(e.into()))?;

        let stats = HistoryStats::from_summaries(&items);
        Ok(History { items, stats })
    }

    /// One page of history.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn history_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<AssessmentPage, HealthHorizonError> {
        self.storage
            .list_paginated(offset, limit)
            .map_err(|e| HealthHorizonError::Storage(e.into()))
    }

    /// Risk-level counts over the whole history.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    pub fn stats(&self) -> Result<HistoryStats, HealthHorizonError> {
        self.storage
            .stats()
            .map_err(|e| HealthHorizonError::Storage(e.into()))
    }

    /// Most recent record for a patient identifier.
    ///
    /// # Errors
    /// Returns `HealthHorizonError::NotFound` if the patient has no record.
    pub fn find_by_patient_id(
        &self,
        patient_id: &str,
    ) -> Result<AssessmentRecord, HealthHorizonError> {
        self.storage
            .find_latest_by_patient_id(patient_id.trim())
            .map_err(|e| HealthHorizonError::Storage(e.into()))?
            .ok_or_else(|| {
                HealthHorizonError::NotFound("no assessment for this patient".to_string())
            })
    }

    /// Readable report of the most recent record for a patient.
    ///
    /// # Errors
    /// Returns `HealthHorizonError::NotFound` if the patient has no record.
    pub fn report(&self, patient_id: &str) -> Result<AssessmentReport, HealthHorizonError> {
        let record = self.find_by_patient_id(patient_id)?;
        Ok(AssessmentReport::build(
            &record.patient_name,
            &record.patient_id,
            &record.features,
            &record.assessment(),
        ))
    }

    /// Delete one stored assessment.
    ///
    /// # Errors
    /// Returns `HealthHorizonError::NotFound` if no row has this id.
    pub fn delete(&self, record_id: i64) -> Result<(), HealthHorizonError> {
        let removed = self
            .storage
            .delete_assessment(record_id)
            .map_err(|e| HealthHorizonError::Storage(e.into()))?;
        if removed {
            tracing::info!("Deleted assessment record {}", record_id);
            Ok(())
        } else {
            Err(HealthHorizonError::NotFound(format!(
                "assessment record {record_id}"
            )))
        }
    }
}
