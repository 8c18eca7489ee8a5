//! # Health Horizon
//!
//! Cardiovascular risk assessment service for clinicians.
//!
//! This crate provides:
//! - Validation of the 13-attribute clinical observation form
//! - Risk prediction from pre-fitted scaler + classifier artifacts
//! - Per-session duplicate detection and best-effort history persistence
//! - A JSON HTTP API over the above
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (observations, validation, assessments, sessions)
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (model artifacts, SQLite, log sanitizing)
//! - `application`: Use cases orchestrating domain and ports
//! - `http`: axum router and handlers
//! - `config`: Environment-driven configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod http;
pub mod ports;

pub use domain::{PatientObservation, RiskAssessment, RiskLevel, ValidationResult};

/// Result type for Health Horizon operations
pub type Result<T> = std::result::Result<T, HealthHorizonError>;

/// Main error type for Health Horizon
#[derive(Debug, thiserror::Error)]
pub enum HealthHorizonError {
    #[error("Invalid observation: {0}")]
    Validation(domain::ValidationResult),

    #[error("Prediction unavailable: {0}")]
    Prediction(#[from] ports::PredictionError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Model artifacts failed to load: {0}")]
    Model(#[from] adapters::ModelError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
