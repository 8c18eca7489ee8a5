//! Model adapter: Implementation of RiskModel from exported JSON artifacts.
//!
//! A model directory holds:
//! - `scaler.json`: [`StandardScaler`] parameters
//! - `classifier.json`: a tagged [`Classifier`]
//! - `manifest.json` (optional): SHA-256 of both files, written by the
//!   `hash_artifacts` binary
//!
//! When a manifest is present, every artifact loaded must be bound by it and
//! match its hash. Without one, loading proceeds with a warning unless the
//! caller requires a manifest.

mod classifier;
mod scaler;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use classifier::{Classifier, DecisionTree, TreeNode};
pub use scaler::StandardScaler;

use crate::domain::{Classification, ClinicalFeatures};
use crate::ports::{PredictionError, RiskModel};

pub const SCALER_FILE: &str = "scaler.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Errors raised while loading model artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid model artifact: {0}")]
    Invalid(String),

    #[error("Artifact integrity check failed: {0}")]
    Integrity(String),
}

/// `manifest.json` contents: artifact file name to lowercase hex SHA-256.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    pub files: BTreeMap<String, String>,
}

impl ArtifactManifest {
    /// Hash the named files inside `dir`.
    ///
    /// # Errors
    /// Returns error if a file cannot be read.
    pub fn from_dir(dir: &Path, names: &[&str]) -> Result<Self, ModelError> {
        let mut files = BTreeMap::new();
        for name in names {
            let path = dir.join(name);
            let bytes = read_artifact(&path)?;
            files.insert((*name).to_string(), sha256_hex(&bytes));
        }
        Ok(Self {
            version: MANIFEST_VERSION,
            files,
        })
    }

    /// Check that `name` is bound by the manifest and its bytes match.
    ///
    /// # Errors
    /// Returns `ModelError::Integrity` on a missing entry or hash mismatch.
    pub fn verify(&self, name: &str, bytes: &[u8]) -> Result<(), ModelError> {
        let expected = self
            .files
            .get(name)
            .ok_or_else(|| ModelError::Integrity(format!("{name} is not listed in the manifest")))?;
        let actual = sha256_hex(bytes);
        if !expected.eq_ignore_ascii_case(&actual) {
            return Err(ModelError::Integrity(format!(
                "{name} hash mismatch (expected {expected}, got {actual})"
            )));
        }
        Ok(())
    }
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

fn read_artifact(path: &Path) -> Result<Vec<u8>, ModelError> {
    if !path.exists() {
        return Err(ModelError::NotFound(path.to_path_buf()));
    }
    fs::read(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_artifact<T: serde::de::DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T, ModelError> {
    serde_json::from_slice(bytes).map_err(|source| ModelError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

struct RawArtifacts {
    dir: PathBuf,
    scaler: Vec<u8>,
    classifier: Vec<u8>,
}

impl RawArtifacts {
    fn read(model_dir: &Path) -> Result<Self, ModelError> {
        Ok(Self {
            dir: model_dir.to_path_buf(),
            scaler: read_artifact(&model_dir.join(SCALER_FILE))?,
            classifier: read_artifact(&model_dir.join(CLASSIFIER_FILE))?,
        })
    }

    fn parse(self) -> Result<ArtifactModel, ModelError> {
        let scaler: StandardScaler = parse_artifact(&self.dir.join(SCALER_FILE), &self.scaler)?;
        let classifier: Classifier =
            parse_artifact(&self.dir.join(CLASSIFIER_FILE), &self.classifier)?;
        let mut model = ArtifactModel::from_parts(scaler, classifier)?;
        model.source = Some(self.dir);
        Ok(model)
    }
}

/// Pre-fitted scaler and classifier, loaded once at start.
#[derive(Debug, Clone)]
pub struct ArtifactModel {
    scaler: StandardScaler,
    classifier: Classifier,
    source: Option<PathBuf>,
}

impl ArtifactModel {
    /// Build from in-memory parameters.
    ///
    /// # Errors
    /// Returns `ModelError::Invalid` if either part fails its checks.
    pub fn from_parts(scaler: StandardScaler, classifier: Classifier) -> Result<Self, ModelError> {
        scaler.check()?;
        classifier.check()?;
        Ok(Self {
            scaler,
            classifier,
            source: None,
        })
    }

    /// Load artifacts from a model directory.
    ///
    /// # Errors
    /// Returns error if files are missing, unreadable, malformed, fail
    /// their checks, or fail manifest verification.
    pub fn load(model_dir: &Path, require_manifest: bool) -> Result<Self, ModelError> {
        if !model_dir.is_dir() {
            return Err(ModelError::NotFound(model_dir.to_path_buf()));
        }

        let manifest_path = model_dir.join(MANIFEST_FILE);
        let manifest: Option<ArtifactManifest> = if manifest_path.exists() {
            let bytes = read_artifact(&manifest_path)?;
            let manifest: ArtifactManifest = parse_artifact(&manifest_path, &bytes)?;
            if manifest.version != MANIFEST_VERSION {
                return Err(ModelError::Integrity(format!(
                    "unsupported manifest version {}",
                    manifest.version
                )));
            }
            Some(manifest)
        } else if require_manifest {
            return Err(ModelError::Integrity(format!(
                "{} is required but missing in {}",
                MANIFEST_FILE,
                model_dir.display()
            )));
        } else {
            tracing::warn!(
                "Loading model artifacts from {:?} without {}; integrity is not verified",
                model_dir,
                MANIFEST_FILE
            );
            None
        };

        let artifacts = RawArtifacts::read(model_dir)?;
        if let Some(manifest) = &manifest {
            manifest.verify(SCALER_FILE, &artifacts.scaler)?;
            manifest.verify(CLASSIFIER_FILE, &artifacts.classifier)?;
        }
        let model = artifacts.parse()?;

        tracing::info!(
            "Loaded model from {:?} (classifier={}, probability={}, verified={})",
            model_dir,
            model.classifier.kind(),
            model.classifier.supports_probability(),
            manifest.is_some()
        );

        Ok(model)
    }

    /// Load artifacts without looking at any manifest.
    ///
    /// Used when (re)writing a manifest for updated artifacts.
    ///
    /// # Errors
    /// Returns error if files are missing, unreadable, malformed or fail
    /// their checks.
    pub fn load_unverified(model_dir: &Path) -> Result<Self, ModelError> {
        RawArtifacts::read(model_dir)?.parse()
    }

    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl RiskModel for ArtifactModel {
    fn classify(&self, features: &ClinicalFeatures) -> Result<Classification, PredictionError> {
        let scaled = self.scaler.transform(&features.to_array())?;
        self.classifier.classify(&scaled)
    }

    fn supports_probability(&self) -> bool {
        self.classifier.supports_probability()
    }

    fn describe(&self) -> String {
        self.classifier.kind().to_string()
    }
}
