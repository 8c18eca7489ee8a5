//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod assessment;
mod prediction;
mod sessions;

pub use assessment::{AssessmentService, History, SubmissionOutcome};
pub use prediction::PredictionService;
pub use sessions::{SessionHandle, SessionRegistry, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL};
