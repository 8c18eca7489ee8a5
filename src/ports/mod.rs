//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (model artifacts, storage).

mod risk_model;
mod storage;

pub use risk_model::{PredictionError, RiskModel};
pub use storage::{AssessmentPage, AssessmentStore};
