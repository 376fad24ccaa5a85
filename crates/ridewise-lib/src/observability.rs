//! Observability infrastructure for the prediction service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, model load latency, counters)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PredictorMetricsInner> = OnceLock::new();

struct PredictorMetricsInner {
    prediction_latency_seconds: Histogram,
    model_load_latency_seconds: Histogram,
    predictions: IntCounterVec,
    imputed_features: IntCounter,
    prediction_errors: IntCounter,
    model_load_errors: IntCounter,
    chat_fallbacks: IntCounter,
    models_cached: IntGauge,
}

impl PredictorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "ridewise_prediction_latency_seconds",
                "Time spent building features and running model inference",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            model_load_latency_seconds: register_histogram!(
                "ridewise_model_load_latency_seconds",
                "Time spent loading model artifacts from disk",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register model_load_latency_seconds"),

            predictions: register_int_counter_vec!(
                "ridewise_predictions_total",
                "Predictions served, by mode",
                &["mode"]
            )
            .expect("Failed to register predictions_total"),

            imputed_features: register_int_counter!(
                "ridewise_imputed_features_total",
                "Schema features zero-filled because the input lacked them"
            )
            .expect("Failed to register imputed_features_total"),

            prediction_errors: register_int_counter!(
                "ridewise_prediction_errors_total",
                "Predictions that failed inside the model"
            )
            .expect("Failed to register prediction_errors_total"),

            model_load_errors: register_int_counter!(
                "ridewise_model_load_errors_total",
                "Model artifacts that were missing or could not be loaded"
            )
            .expect("Failed to register model_load_errors_total"),

            chat_fallbacks: register_int_counter!(
                "ridewise_chat_fallbacks_total",
                "Chat messages answered without a prediction"
            )
            .expect("Failed to register chat_fallbacks_total"),

            models_cached: register_int_gauge!(
                "ridewise_models_cached",
                "Number of model artifacts held in the cache"
            )
            .expect("Failed to register models_cached"),
        }
    }
}

/// Prediction mode label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMode {
    Hourly,
    Daily,
    Chat,
}

impl PredictionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Chat => "chat",
        }
    }
}

/// Handle to the process-wide metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct PredictorMetrics {
    _private: (),
}

impl Default for PredictorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PredictorMetricsInner {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_model_load_latency(&self, duration_secs: f64) {
        self.inner().model_load_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, mode: PredictionMode) {
        self.inner()
            .predictions
            .with_label_values(&[mode.as_str()])
            .inc();
    }

    pub fn add_imputed_features(&self, count: usize) {
        self.inner().imputed_features.inc_by(count as u64);
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    pub fn inc_model_load_errors(&self) {
        self.inner().model_load_errors.inc();
    }

    pub fn inc_chat_fallbacks(&self) {
        self.inner().chat_fallbacks.inc();
    }

    pub fn set_models_cached(&self, count: usize) {
        self.inner().models_cached.set(count as i64);
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&families, &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, bind_addr: &str, model_dir: &str) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            bind_addr = %bind_addr,
            model_dir = %model_dir,
            "Prediction service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Prediction service shutting down"
        );
    }

    pub fn log_model_loaded(
        &self,
        path: &str,
        format: &str,
        checksum: &str,
        features: usize,
        elapsed_ms: u128,
    ) {
        info!(
            event = "model_loaded",
            service = %self.service,
            path = %path,
            format = %format,
            checksum = %checksum,
            features = features,
            elapsed_ms = elapsed_ms,
            "Model artifact loaded"
        );
    }

    pub fn log_model_load_failed(&self, path: &str, error: &str) {
        warn!(
            event = "model_load_failed",
            service = %self.service,
            path = %path,
            error = %error,
            "Model artifact could not be loaded"
        );
    }

    pub fn log_prediction(
        &self,
        mode: PredictionMode,
        value: f64,
        imputed: usize,
        model_version: &str,
    ) {
        info!(
            event = "prediction_served",
            service = %self.service,
            mode = mode.as_str(),
            value = value,
            imputed = imputed,
            model_version = %model_version,
            "Prediction served"
        );
    }

    pub fn log_imputation(&self, mode: PredictionMode, imputed: &[String]) {
        if imputed.is_empty() {
            return;
        }
        warn!(
            event = "schema_imputation",
            service = %self.service,
            mode = mode.as_str(),
            imputed = ?imputed,
            "Input lacked model features; zeros imputed"
        );
    }

    pub fn log_chat_fallback(&self, message_len: usize) {
        info!(
            event = "chat_fallback",
            service = %self.service,
            message_len = message_len,
            "Chat message had no demand intent"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handle_records_and_renders() {
        let metrics = PredictorMetrics::new();
        metrics.observe_prediction_latency(0.002);
        metrics.observe_model_load_latency(0.05);
        metrics.inc_predictions(PredictionMode::Hourly);
        metrics.add_imputed_features(2);
        metrics.inc_chat_fallbacks();
        metrics.set_models_cached(1);

        let text = metrics.render();
        assert!(text.contains("ridewise_predictions_total"));
        assert!(text.contains("ridewise_models_cached"));
    }

    #[test]
    fn test_handles_share_registration() {
        let a = PredictorMetrics::new();
        let b = a.clone();
        a.inc_model_load_errors();
        b.inc_prediction_errors();
        assert!(PredictorMetrics::default()
            .render()
            .contains("ridewise_model_load_errors_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("ridewise-test");
        assert_eq!(logger.service, "ridewise-test");
        logger.log_imputation(PredictionMode::Daily, &[]);
    }
}
