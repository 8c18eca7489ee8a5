//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `model`: JSON scaler + classifier artifacts (serde_json, sha2)
//! - `sqlite`: SQLite for assessment history
//! - `sanitize`: PII filtering for logs

pub mod model;
pub mod sanitize;
pub mod sqlite;

// Re-export adapter errors for lib.rs
pub use model::ModelError;
pub use sqlite::StorageError;
