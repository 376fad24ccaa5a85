//! Demand prediction pipeline
//!
//! FeatureBuilder -> SchemaAligner -> Regressor::predict -> (daily only)
//! DemandProfileSynthesizer.

mod engine;
mod features;
mod inference;
mod peak;
mod profile;
mod schema;

pub use engine::{predict_daily, predict_hourly, predict_hourly_curve};
pub use features::{names, season_for_month, FeatureBuilder, FEATURE_ALIASES};
pub use inference::{
    LinearModel, NativeModel, NativeRegressor, OnnxRegressor, RegressionTree, TreeEnsemble,
    TreeNode,
};
pub use peak::{peak_day, peak_hour, PeakDay, PeakHour};
pub use profile::{
    DemandProfile, DemandProfileSynthesizer, HourlyCurve, WEEKDAY_WEIGHTS, WEEKEND_WEIGHTS,
};
pub use schema::{Alignment, ModelSchema, SchemaAligner};

use crate::error::Result;
use crate::models::FeatureFrame;

/// Trait for trained regression models
///
/// Implementations are read-only once constructed and safe to share across
/// concurrent requests.
pub trait Regressor: Send + Sync {
    /// One prediction per frame row
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>>;

    /// Ordered feature names the model was trained on, if it declares them
    fn schema(&self) -> Option<&ModelSchema>;
}
