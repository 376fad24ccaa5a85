//! Model artifact loading
//!
//! This module provides:
//! - Path resolution over a list of candidate artifact names
//! - Ordered fallback deserialization (json, bincode, onnx)
//! - SHA-256 checksums of loaded artifacts
//! - A process-wide cache keyed by path and modification time

mod cache;


pub use cache::ModelCache;

use crate::error::{Error, Result};
use crate::models::FeatureFrame;
use crate::predictor::{ModelSchema, NativeRegressor, OnnxRegressor, Regressor};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Default hourly model file names, in preference order
pub const HOURLY_MODEL_CANDIDATES: &[&str] = &[
    "ridewise_hourly_gb_model.json",
    "hourly_model.json",
    "hourly_model.onnx",
];

/// Default daily model file names, in preference order
pub const DAILY_MODEL_CANDIDATES: &[&str] = &[
    "ridewise_daily_gb_model.json",
    "daily_model.json",
    "daily_model.onnx",
];

/// Suffix of the sidecar file holding an ONNX model's feature names
pub const FEATURE_SIDECAR_SUFFIX: &str = ".features.json";

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Json,
    Bincode,
    Onnx,
}

impl ModelFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Bincode => "bincode",
            Self::Onnx => "onnx",
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy selector for [`ModelLoader::load`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
    /// Try every format in priority order
    #[default]
    Auto,
    Json,
    Bincode,
    Onnx,
}

impl LoadStrategy {
    /// Whether this strategy attempts `format`
    pub fn accepts(&self, format: ModelFormat) -> bool {
        match self {
            Self::Auto => true,
            Self::Json => format == ModelFormat::Json,
            Self::Bincode => format == ModelFormat::Bincode,
            Self::Onnx => format == ModelFormat::Onnx,
        }
    }

    /// Formats to attempt, in loader priority order
    pub fn formats(&self) -> Vec<ModelFormat> {
        attempts(*self).map(|(format, _)| *format).collect()
    }
}

impl FromStr for LoadStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "json" => Ok(Self::Json),
            "bincode" => Ok(Self::Bincode),
            "onnx" => Ok(Self::Onnx),
            other => Err(format!(
                "unknown loader '{}' (expected auto, json, bincode or onnx)",
                other
            )),
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Json => f.write_str("json"),
            Self::Bincode => f.write_str("bincode"),
            Self::Onnx => f.write_str("onnx"),
        }
    }
}

/// Metadata about a loaded artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub format: ModelFormat,
    pub checksum: String,
    pub size_bytes: usize,
    pub loaded_at: i64,
    pub feature_names: Option<Vec<String>>,
}

/// A loaded, immutable model plus its metadata
pub struct ModelArtifact {
    model: Box<dyn Regressor>,
    info: ArtifactInfo,
}

impl ModelArtifact {
    pub fn info(&self) -> &ArtifactInfo {
        &self.info
    }

    /// Short checksum prefix used as a version tag in logs
    pub fn version(&self) -> &str {
        &self.info.checksum[..self.info.checksum.len().min(12)]
    }
}

impl Regressor for ModelArtifact {
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        self.model.predict(frame)
    }

    fn schema(&self) -> Option<&ModelSchema> {
        self.model.schema()
    }
}

impl fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelArtifact").field("info", &self.info).finish()
    }
}

type LoaderFn = fn(&[u8], &Path) -> anyhow::Result<Box<dyn Regressor>>;

/// Deserialization strategies in auto priority order
const STRATEGIES: &[(ModelFormat, LoaderFn)] = &[
    (ModelFormat::Json, load_json),
    (ModelFormat::Bincode, load_bincode),
    (ModelFormat::Onnx, load_onnx),
];

/// Entries of the strategy list selected by `strategy`, in priority order
fn attempts(strategy: LoadStrategy) -> impl Iterator<Item = &'static (ModelFormat, LoaderFn)> {
    STRATEGIES
        .iter()
        .filter(move |(format, _)| strategy.accepts(*format))
}

fn load_json(bytes: &[u8], _path: &Path) -> anyhow::Result<Box<dyn Regressor>> {
    let model = NativeRegressor::from_json(bytes).context("Failed to parse JSON model")?;
    Ok(Box::new(model))
}

fn load_bincode(bytes: &[u8], _path: &Path) -> anyhow::Result<Box<dyn Regressor>> {
    let model = NativeRegressor::from_bincode(bytes).context("Failed to decode bincode model")?;
    Ok(Box::new(model))
}

fn load_onnx(bytes: &[u8], path: &Path) -> anyhow::Result<Box<dyn Regressor>> {
    let schema = read_feature_sidecar(path)?;
    let model = OnnxRegressor::from_bytes(bytes, schema)?;
    Ok(Box::new(model))
}

/// Path of the feature-name sidecar for an artifact
pub fn feature_sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(FEATURE_SIDECAR_SUFFIX);
    PathBuf::from(name)
}

fn read_feature_sidecar(path: &Path) -> anyhow::Result<Option<ModelSchema>> {
    let sidecar = feature_sidecar_path(path);
    if !sidecar.exists() {
        return Ok(None);
    }
    let content = std::fs::read(&sidecar)
        .with_context(|| format!("Failed to read feature sidecar {:?}", sidecar))?;
    let schema: ModelSchema = serde_json::from_slice(&content)
        .with_context(|| format!("Failed to parse feature sidecar {:?}", sidecar))?;
    Ok(Some(schema))
}

/// Compute SHA256 checksum of artifact bytes
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// First candidate that exists under `dir`, else the first candidate
pub fn resolve_model_path<S: AsRef<str>>(dir: &Path, candidates: &[S]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|c| dir.join(c.as_ref()))
        .find(|p| p.exists())
        .or_else(|| candidates.first().map(|c| dir.join(c.as_ref())))
}

/// Loads model artifacts from disk
pub struct ModelLoader;

impl ModelLoader {
    /// Load the artifact at `path`
    ///
    /// Existence is checked before any deserialization. When every attempted
    /// format fails the error carries the last format's failure.
    pub fn load(path: impl AsRef<Path>, strategy: LoadStrategy) -> Result<ModelArtifact> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ModelNotFound {
                path: path.to_path_buf(),
            });
        }

        let bytes = std::fs::read(path).map_err(|e| Error::ModelLoad {
            path: path.to_path_buf(),
            strategy: strategy.to_string(),
            message: e.to_string(),
        })?;

        let mut last_error: Option<(ModelFormat, anyhow::Error)> = None;
        for (format, loader) in attempts(strategy) {
            match loader(&bytes, path) {
                Ok(model) => {
                    let info = ArtifactInfo {
                        path: path.to_path_buf(),
                        format: *format,
                        checksum: compute_checksum(&bytes),
                        size_bytes: bytes.len(),
                        loaded_at: chrono::Utc::now().timestamp(),
                        feature_names: model.schema().map(|s| s.names().to_vec()),
                    };
                    info!(
                        path = %path.display(),
                        format = %format,
                        checksum = %info.checksum,
                        features = info.feature_names.as_ref().map(|n| n.len()).unwrap_or(0),
                        "Model loaded"
                    );
                    return Ok(ModelArtifact { model, info });
                }
                Err(e) => {
                    debug!(path = %path.display(), format = %format, error = %e, "Load attempt failed");
                    last_error = Some((*format, e));
                }
            }
        }

        let (strategy, message) = match last_error {
            Some((format, e)) => (format.to_string(), format!("{:#}", e)),
            None => (strategy.to_string(), "no loader attempted".to_string()),
        };
        Err(Error::ModelLoad {
            path: path.to_path_buf(),
            strategy,
            message,
        })
    }
}
