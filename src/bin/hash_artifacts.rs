//! Manifest utility for Health Horizon model artifacts.
//!
//! Writes `manifest.json` binding the SHA-256 of `scaler.json` and
//! `classifier.json`, and checks that the artifacts load before doing so.
//!
//! # Usage
//!
//! ```bash
//! hash_artifacts <model_dir> [--check]
//! ```
//!
//! With `--check`, verifies the existing manifest instead of writing one.

use std::env;
use std::fs;
use std::path::PathBuf;

use health_horizon::adapters::model::{
    ArtifactManifest, ArtifactModel, CLASSIFIER_FILE, MANIFEST_FILE, SCALER_FILE,
};
use health_horizon::ports::RiskModel;

fn usage() -> String {
    "Usage: hash_artifacts <model_dir> [--check]".to_string()
}

fn parse_args() -> Result<(PathBuf, bool), String> {
    let mut model_dir: Option<PathBuf> = None;
    let mut check = false;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--check" => check = true,
            "-h" | "--help" => return Err(usage()),
            _ => {
                if model_dir.is_none() {
                    model_dir = Some(PathBuf::from(arg));
                } else {
                    return Err(usage());
                }
            }
        }
    }

    let model_dir = model_dir.ok_or_else(usage)?;
    Ok((model_dir, check))
}

fn main() -> Result<(), String> {
    let (model_dir, check) = parse_args()?;

    let model_dir = if model_dir.is_file() {
        model_dir
            .parent()
            .ok_or_else(|| "Model path has no parent directory".to_string())?
            .to_path_buf()
    } else {
        model_dir
    };

    if check {
        let model = ArtifactModel::load(&model_dir, true).map_err(|e| e.to_string())?;
        println!(
            "OK: {} verified against {} ({})",
            model_dir.display(),
            MANIFEST_FILE,
            model.describe()
        );
        return Ok(());
    }

    // Refuse to bless artifacts that would not load.
    let model = ArtifactModel::load_unverified(&model_dir).map_err(|e| e.to_string())?;

    let manifest = ArtifactManifest::from_dir(&model_dir, &[SCALER_FILE, CLASSIFIER_FILE])
        .map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| format!("Failed to serialize manifest: {e}"))?;

    let manifest_path = model_dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, format!("{json}\n"))
        .map_err(|e| format!("Failed to write {}: {e}", manifest_path.display()))?;

    println!("Wrote {}", manifest_path.display());
    for (name, hash) in &manifest.files {
        println!("  {name}: {hash}");
    }
    println!("Classifier: {}", model.describe());
    Ok(())
}
