//! Server configuration
//!
//! An optional file named by `RIDEWISE_CONFIG` is layered under
//! `RIDEWISE_*` environment variables. Candidate lists in the environment
//! are comma separated.

use anyhow::{Context, Result};
use ridewise_lib::loader::{
    resolve_model_path, LoadStrategy, DAILY_MODEL_CANDIDATES, HOURLY_MODEL_CANDIDATES,
};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "RIDEWISE_CONFIG";

const ENV_PREFIX: &str = "RIDEWISE";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory that model candidates and relative model paths resolve against
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_hourly_candidates")]
    pub hourly_model_candidates: Vec<String>,

    #[serde(default = "default_daily_candidates")]
    pub daily_model_candidates: Vec<String>,

    /// `auto`, `json`, `bincode` or `onnx`
    #[serde(default = "default_loader")]
    pub loader: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_model_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_hourly_candidates() -> Vec<String> {
    HOURLY_MODEL_CANDIDATES.iter().map(|s| s.to_string()).collect()
}

fn default_daily_candidates() -> Vec<String> {
    DAILY_MODEL_CANDIDATES.iter().map(|s| s.to_string()).collect()
}

fn default_loader() -> String {
    "auto".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            model_dir: default_model_dir(),
            hourly_model_candidates: default_hourly_candidates(),
            daily_model_candidates: default_daily_candidates(),
            loader: default_loader(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the optional file and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(std::env::var(CONFIG_PATH_ENV).ok().as_deref())
    }

    /// Load with an explicit configuration file, still honoring the environment
    pub fn load_from(file: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("hourly_model_candidates")
                    .with_list_parse_key("daily_model_candidates"),
            )
            .build()
            .context("Failed to read configuration")?;

        let config: ServerConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        config.load_strategy()?;
        Ok(config)
    }

    pub fn load_strategy(&self) -> Result<LoadStrategy> {
        self.loader.parse().map_err(anyhow::Error::msg)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Resolve a request-supplied path inside the model directory
    ///
    /// Returns `None` for paths that could leave it.
    pub fn model_path(&self, path: &str) -> Option<PathBuf> {
        stays_in_model_dir(path).then(|| self.model_dir.join(Path::new(path)))
    }

    pub fn hourly_model_path(&self) -> Option<PathBuf> {
        resolve_model_path(&self.model_dir, &self.hourly_model_candidates)
    }

    pub fn daily_model_path(&self) -> Option<PathBuf> {
        resolve_model_path(&self.model_dir, &self.daily_model_candidates)
    }
}

/// True when `path` is relative and never steps up a directory
pub fn stays_in_model_dir(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
