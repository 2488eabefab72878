use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sgc_core::{ErrorInfo, SgcError};
use sha2::{Digest, Sha256};

use crate::config::RunConfig;
use crate::ladder::LadderTermination;

/// Structured manifest describing a completed tempering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: RunConfig,
    /// SHA-256 of the canonical JSON form of `config`.
    pub config_hash: String,
    /// Master seed used to derive replica substreams.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Ladder temperatures, hottest first.
    pub temperatures: Vec<f64>,
    /// How the ladder was obtained.
    pub ladder: LadderTermination,
    /// Ladder file (relative to the run directory when inside it).
    pub ladder_file: Option<PathBuf>,
    /// Metrics file produced during the run (relative to run directory).
    pub metrics_file: Option<PathBuf>,
    /// Summary file produced at the end of the run (relative to run directory).
    pub summary_file: Option<PathBuf>,
}

/// Hex SHA-256 digest of `config` serialized as JSON.
pub fn config_hash(config: &RunConfig) -> Result<String, SgcError> {
    let json = serde_json::to_vec(config)
        .map_err(|err| SgcError::Serde(ErrorInfo::new("config-serialize", err.to_string())))?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(format!("{:x}", hasher.finalize()))
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), SgcError> {
        write_json(path, self, "manifest")
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, SgcError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            SgcError::Storage(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            SgcError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Writes `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), SgcError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            SgcError::Storage(
                ErrorInfo::new(format!("{what}-mkdir"), err.to_string())
                    .with_context("path", parent.display().to_string()),
            )
        })?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|err| {
        SgcError::Serde(
            ErrorInfo::new(format!("{what}-serialize"), err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    fs::write(path, json).map_err(|err| {
        SgcError::Storage(
            ErrorInfo::new(format!("{what}-write"), err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}
