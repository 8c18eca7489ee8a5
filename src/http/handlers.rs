//! Request handlers, one per logical operation.
//!
//! Service calls touch SQLite and the model synchronously, so they run on
//! the blocking pool.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ApiError, AppState, SESSION_HEADER};
use crate::domain::{
    AssessmentReport, AssessmentSummary, Field, HistoryStats, LastSubmission,
    PatientObservation, RangeError, RiskAssessment, SubmissionStatus,
};
use crate::HealthHorizonError;

/// Largest page the history listing will return.
pub const MAX_PAGE_SIZE: usize = 200;

/// Largest offset SQLite can take as an integer.
pub const MAX_OFFSET: usize = i64::MAX as usize;

async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, HealthHorizonError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {e}")))?
        .map_err(ApiError::from)
}

fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let prediction = state.assessments.prediction();
    Json(json!({
        "status": "ok",
        "modelLoaded": prediction.is_available(),
        "model": prediction.model_description(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub message: String,
    pub missing_fields: Vec<Field>,
    pub range_errors: Vec<RangeError>,
}

pub async fn validate(
    State(state): State<AppState>,
    Json(observation): Json<PatientObservation>,
) -> Json<ValidateResponse> {
    let result = state.assessments.validate(&observation);
    Json(ValidateResponse {
        valid: result.is_valid(),
        message: result.message(),
        missing_fields: result.missing_fields,
        range_errors: result.range_errors,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub session_id: String,
    pub status: SubmissionStatus,
    pub assessment: RiskAssessment,
    pub persistence_warning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub record_id: Option<i64>,
}

/// `POST /api/v1/assessments`
///
/// Starts a session when no `x-session-id` header is sent. The session id
/// is echoed in the response header on success and on validation or
/// prediction failure, so the client can restore the form later.
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(observation): Json<PatientObservation>,
) -> Response {
    let requested = session_header(&headers);
    let sessions = state.sessions.clone();
    let session = match blocking(move || sessions.get_or_create(requested.as_deref())).await {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    let (session_id, handle) = session;

    let service = state.assessments.clone();
    let outcome = blocking(move || service.submit(&handle, &observation)).await;

    let mut response = match outcome {
        Ok(outcome) => Json(SubmitResponse {
            session_id: session_id.clone(),
            status: outcome.status,
            assessment: outcome.assessment,
            persistence_warning: outcome.persistence_warning,
            warning: outcome
                .persistence_warning
                .then(|| "Assessment was not saved to history".to_string()),
            record_id: outcome.record_id,
        })
        .into_response(),
        Err(e) => e.into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub search: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_count: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub items: Vec<AssessmentSummary>,
    pub stats: HistoryStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// `GET /api/v1/assessments?search=&offset=&limit=`
///
/// A non-blank search wins over pagination. Pagination reports counts over
/// the whole history; the other listings count the rows returned.
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let search = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    if let (None, Some(limit)) = (&search, query.limit) {
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let offset = query.offset.unwrap_or(0);
        if offset > MAX_OFFSET {
            return Err(ApiError::BadRequest(format!(
                "offset must be at most {MAX_OFFSET}"
            )));
        }
        let service = state.assessments.clone();
        let (page, stats) = blocking(move || {
            let page = service.history_page(offset, limit)?;
            let stats = service.stats()?;
            Ok((page, stats))
        })
        .await?;

        return Ok(Json(HistoryResponse {
            pagination: Some(Pagination {
                total_count: page.total_count,
                offset: page.offset,
                limit: page.limit,
                has_more: page.has_more,
            }),
            items: page.items,
            stats,
        }));
    }

    let service = state.assessments.clone();
    let history = blocking(move || service.history(search.as_deref())).await?;
    Ok(Json(HistoryResponse {
        items: history.items,
        stats: history.stats,
        pagination: None,
    }))
}

/// `GET /api/v1/assessments/:patient_id`
pub async fn latest_for_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let service = state.assessments.clone();
    let record = blocking(move || service.find_by_patient_id(&patient_id)).await?;
    Ok(Json(json!({
        "record": record,
        "assessment": record.assessment(),
    })))
}

/// `GET /api/v1/assessments/:patient_id/report`
pub async fn report(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Json<AssessmentReport>, ApiError> {
    let service = state.assessments.clone();
    let report = blocking(move || service.report(&patient_id)).await?;
    Ok(Json(report))
}

/// `DELETE /api/v1/records/:record_id`
pub async fn delete_record(
    State(state): State<AppState>,
    Path(record_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let service = state.assessments.clone();
    blocking(move || service.delete(record_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/sessions`
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let sessions = state.sessions.clone();
    let (session_id, _) = blocking(move || sessions.create()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "sessionId": session_id }))))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub last_submission: Option<LastSubmission>,
    pub field_values: Option<PatientObservation>,
    pub report: Option<AssessmentReport>,
}

/// `GET /api/v1/sessions/:session_id`
pub async fn session_snapshot(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let sessions = state.sessions.clone();
    let id = session_id.clone();
    let snapshot = blocking(move || sessions.snapshot(&id)).await?;

    let report = snapshot.last().map(|last| {
        AssessmentReport::build(
            &last.observation.patient_name,
            &last.observation.patient_id,
            &last.observation.features,
            &last.assessment,
        )
    });

    Ok(Json(SessionView {
        session_id,
        last_submission: snapshot.last().cloned(),
        field_values: snapshot.field_values().cloned(),
        report,
    }))
}

/// `DELETE /api/v1/sessions/:session_id`
pub async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let sessions = state.sessions.clone();
    blocking(move || sessions.reset(&session_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
