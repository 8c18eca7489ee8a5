//! HTTP layer: axum router over the application services.
//!
//! All bodies are JSON with camelCase fields. Session identity travels in
//! the `x-session-id` header.

mod error;
mod handlers;

use std::sync::Arc;

use axum::{
    http::{HeaderName, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::adapters::model::ArtifactModel;
use crate::adapters::sqlite::SqliteStorage;
use crate::application::{AssessmentService, SessionRegistry};

pub use error::ApiError;
pub use handlers::{MAX_OFFSET, MAX_PAGE_SIZE};

pub const SESSION_HEADER: &str = "x-session-id";

pub type Service = AssessmentService<ArtifactModel, SqliteStorage>;

/// Shared state for the axum application
#[derive(Clone)]
pub struct AppState {
    pub assessments: Arc<Service>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    #[must_use]
    pub fn new(assessments: Service) -> Self {
        Self::with_sessions(assessments, SessionRegistry::new())
    }

    #[must_use]
    pub fn with_sessions(assessments: Service, sessions: SessionRegistry) -> Self {
        Self {
            assessments: Arc::new(assessments),
            sessions: Arc::new(sessions),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_HEADER)])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/validate", post(handlers::validate))
        .route(
            "/api/v1/assessments",
            post(handlers::submit).get(handlers::history),
        )
        .route(
            "/api/v1/assessments/:patient_id",
            get(handlers::latest_for_patient),
        )
        .route("/api/v1/assessments/:patient_id/report", get(handlers::report))
        .route("/api/v1/records/:record_id", delete(handlers::delete_record))
        .route("/api/v1/sessions", post(handlers::create_session))
        .route(
            "/api/v1/sessions/:session_id",
            get(handlers::session_snapshot).delete(handlers::reset_session),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::model::tests::age_driven_model;
    use crate::application::PredictionService;
    use crate::domain::sample_observation;
    use reqwest::{Method as HttpMethod, StatusCode};
    use serde_json::Value;

    /// Router served on an ephemeral loopback port.
    struct TestServer {
        base: String,
        client: reqwest::Client,
    }

    impl TestServer {
        async fn start(app: Router) -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Should bind");
            let addr = listener.local_addr().expect("Should have address");
            tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            });
            Self {
                base: format!("http://{addr}"),
                client: reqwest::Client::new(),
            }
        }

        async fn send(
            &self,
            method: HttpMethod,
            path: &str,
            body: Option<&Value>,
            session: Option<&str>,
        ) -> (StatusCode, Option<String>, Value) {
            let mut request = self.client.request(method, format!("{}{}", self.base, path));
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(id) = session {
                request = request.header(SESSION_HEADER, id);
            }
            let response = request.send().await.expect("Should respond");

            let status = response.status();
            let session = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let bytes = response.bytes().await.expect("Should read body");
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).expect("Should be JSON")
            };
            (status, session, body)
        }

        async fn get(&self, path: &str) -> (StatusCode, Option<String>, Value) {
            self.send(HttpMethod::GET, path, None, None).await
        }

        async fn delete(&self, path: &str) -> (StatusCode, Option<String>, Value) {
            self.send(HttpMethod::DELETE, path, None, None).await
        }

        async fn post(
            &self,
            path: &str,
            body: &Value,
            session: Option<&str>,
        ) -> (StatusCode, Option<String>, Value) {
            self.send(HttpMethod::POST, path, Some(body), session).await
        }
    }

    async fn server_with(prediction: PredictionService<ArtifactModel>) -> TestServer {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should create storage"));
        TestServer::start(router(AppState::new(AssessmentService::new(prediction, storage)))).await
    }

    async fn server() -> TestServer {
        server_with(PredictionService::new(Arc::new(age_driven_model()))).await
    }

    fn observation_json() -> Value {
        serde_json::to_value(sample_observation()).expect("Should serialize")
    }

    #[tokio::test]
    async fn test_health_reports_model() {
        let (status, _, body) = server().await.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["modelLoaded"], true);
        assert_eq!(body["model"], "logistic_regression");
    }

    #[tokio::test]
    async fn test_validate_endpoint() {
        let mut json = observation_json();
        json["age"] = Value::from(0);
        json["chol"] = Value::Null;

        let (status, _, body) = server().await.post("/api/v1/validate", &json, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], false);
        assert_eq!(body["missingFields"], serde_json::json!(["chol"]));
        assert_eq!(body["rangeErrors"][0]["field"], "age");
    }

    #[tokio::test]
    async fn test_submit_then_duplicate() {
        let server = server().await;
        let json = observation_json();

        let (status, session, body) =
            server.post("/api/v1/assessments", &json, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "NEW");
        assert_eq!(body["assessment"]["riskLevel"], "High Risk");
        assert_eq!(body["persistenceWarning"], false);
        let session = session.expect("Should return session header");
        assert_eq!(body["sessionId"], session.as_str());

        let (status, _, body) =
            server.post("/api/v1/assessments", &json, Some(&session)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "DUPLICATE");

        let (status, _, body) = server.get("/api/v1/assessments").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["stats"]["highRisk"], 1);
    }

    #[tokio::test]
    async fn test_invalid_submission_is_422_and_keeps_fields() {
        let server = server().await;
        let mut json = observation_json();
        json["patientName"] = Value::from("");

        let (status, session, body) =
            server.post("/api/v1/assessments", &json, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["missingFields"], serde_json::json!(["patientName"]));
        assert_eq!(
            body["message"],
            "Please fill in the missing field: Patient Name"
        );

        let session = session.expect("Should return session header");
        let (status, _, body) =
            server.get(&format!("/api/v1/sessions/{session}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fieldValues"]["patientId"], "P-1001");
        assert!(body["lastSubmission"].is_null());
    }

    #[tokio::test]
    async fn test_prediction_unavailable_is_503() {
        let server = server_with(PredictionService::unavailable()).await;
        let (status, _, body) = server.post("/api/v1/assessments", &observation_json(), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Prediction unavailable");

        let (_, _, health) = server.get("/health").await;
        assert_eq!(health["modelLoaded"], false);
    }

    #[tokio::test]
    async fn test_lookup_report_and_delete() {
        let server = server().await;
        let (_, _, body) = server.post("/api/v1/assessments", &observation_json(), None).await;
        let record_id = body["recordId"].as_i64().expect("Should have record id");

        let (status, _, body) = server.get("/api/v1/assessments/P-1001").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["record"]["patientName"], "Jane Roe");

        let (status, _, body) =
            server.get("/api/v1/assessments/P-1001/report").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["riskAssessment"][1]["value"], "High Risk");

        let (status, _, _) = server.get("/api/v1/assessments/P-404").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/v1/records/{record_id}");
        let (status, _, _) = server.delete(&uri).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _, _) = server.delete(&uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_history_pagination() {
        let server = server().await;
        for id in ["P-1", "P-2", "P-3"] {
            let mut json = observation_json();
            json["patientId"] = Value::from(id);
            server.post("/api/v1/assessments", &json, None).await;
        }

        let (status, _, body) =
            server.get("/api/v1/assessments?offset=0&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["pagination"]["totalCount"], 3);
        assert_eq!(body["pagination"]["hasMore"], true);
        assert_eq!(body["stats"]["total"], 3);

        let (status, _, body) =
            server.get("/api/v1/assessments?search=p-2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
        assert!(body.get("pagination").is_none());

        let (status, _, _) = server.get("/api/v1/assessments?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) = server
            .get(&format!("/api/v1/assessments?offset={}&limit=1", usize::MAX))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _, body) = server
            .get(&format!("/api/v1/assessments?offset={MAX_OFFSET}&limit=1"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
        assert_eq!(body["pagination"]["hasMore"], false);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let server = server().await;
        let (status, _, body) = server.send(HttpMethod::POST, "/api/v1/sessions", None, None).await;
        assert_eq!(status, StatusCode::CREATED);
        let session = body["sessionId"].as_str().expect("Should have id").to_string();

        server.post("/api/v1/assessments", &observation_json(), Some(&session)).await;

        let uri = format!("/api/v1/sessions/{session}");
        let (_, _, body) = server.get(&uri).await;
        assert_eq!(body["lastSubmission"]["assessment"]["predictedClass"], 1);
        assert_eq!(body["report"]["patientId"], "P-1001");

        let (status, _, _) = server.delete(&uri).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, _, body) = server.get(&uri).await;
        assert!(body["lastSubmission"].is_null());
        assert!(body["fieldValues"].is_null());

        let (status, _, _) = server.post("/api/v1/assessments", &observation_json(), Some("unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
