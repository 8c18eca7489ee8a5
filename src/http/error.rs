//! JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::ValidationResult;
use crate::HealthHorizonError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Invalid(ValidationResult),

    #[error("Prediction unavailable")]
    PredictionUnavailable,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<HealthHorizonError> for ApiError {
    fn from(err: HealthHorizonError) -> Self {
        match err {
            HealthHorizonError::Validation(result) => Self::Invalid(result),
            HealthHorizonError::Prediction(e) => {
                tracing::warn!("Prediction unavailable: {}", e);
                Self::PredictionUnavailable
            }
            HealthHorizonError::NotFound(what) => Self::NotFound(what),
            HealthHorizonError::Storage(e) => {
                tracing::error!("Storage failure: {}", e);
                Self::Internal("history storage is unavailable".to_string())
            }
            other => {
                tracing::error!("Request failed: {}", other);
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Invalid(result) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "status": "error",
                    "message": result.message(),
                    "missingFields": result.missing_fields,
                    "rangeErrors": result.range_errors,
                }),
            ),
            ApiError::PredictionUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "status": "error", "message": "Prediction unavailable" }),
            ),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "status": "error", "message": format!("Not found: {what}") }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "status": "error", "message": msg }),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "status": "error", "message": msg }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
