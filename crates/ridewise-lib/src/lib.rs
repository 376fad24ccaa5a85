//! Bike-share demand prediction library
//!
//! This crate provides the core functionality for:
//! - Loading and caching trained demand models
//! - Feature construction and schema alignment
//! - Hourly, daily and peak demand prediction
//! - Date and hour extraction from chat messages
//! - Health checks and observability

pub mod chat;
pub mod error;
pub mod health;
pub mod loader;
pub mod models;
pub mod observability;
pub mod predictor;

pub use error::{Error, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use loader::{LoadStrategy, ModelArtifact, ModelCache, ModelLoader};
pub use models::*;
pub use observability::{PredictionMode, PredictorMetrics, StructuredLogger};
pub use predictor::Regressor;
