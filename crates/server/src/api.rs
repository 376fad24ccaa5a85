//! HTTP API for predictions, chat, model info, health checks and metrics

use crate::config::{stays_in_model_dir, ServerConfig};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use ridewise_lib::{
    chat::{display_round, ChatAssistant, ModelProvider, ReplyKind},
    health::{components, ComponentStatus, HealthRegistry},
    loader::{ArtifactInfo, LoadStrategy, ModelArtifact, ModelCache},
    models::{DayConditions, IntentHint, WeatherCondition, WeatherInputs},
    observability::{PredictionMode, PredictorMetrics, StructuredLogger},
    predictor::{predict_daily, predict_hourly, predict_hourly_curve, FeatureBuilder, Regressor},
    Error,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Hour used when a hourly request omits `target_hour`
pub const DEFAULT_TARGET_HOUR: i64 = 17;

/// Strings accepted as a true flag
const TRUTHY: &[&str] = &["1", "true", "yes", "on"];

/// Which of the two models a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Hourly,
    Daily,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }

    /// Health component tracking this model
    pub fn component(&self) -> &'static str {
        match self {
            Self::Hourly => components::HOURLY_MODEL,
            Self::Daily => components::DAILY_MODEL,
        }
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            other => Err(format!(
                "unknown model kind '{}' (expected hourly or daily)",
                other
            )),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub cache: ModelCache,
    pub health_registry: HealthRegistry,
    pub metrics: PredictorMetrics,
    pub logger: StructuredLogger,
    strategy: LoadStrategy,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        health_registry: HealthRegistry,
        metrics: PredictorMetrics,
        logger: StructuredLogger,
    ) -> Self {
        let strategy = config.load_strategy().unwrap_or_default();
        Self {
            config,
            cache: ModelCache::new(),
            health_registry,
            metrics,
            logger,
            strategy,
        }
    }

    /// Configured load strategy
    pub fn strategy(&self) -> LoadStrategy {
        self.strategy
    }

    /// Fetch a model through the cache
    ///
    /// `path` overrides the configured candidates and resolves against the
    /// model directory. Blocks on disk I/O when the model is not cached.
    pub fn model(
        &self,
        kind: ModelKind,
        path: Option<&str>,
        strategy: LoadStrategy,
    ) -> ridewise_lib::Result<Arc<ModelArtifact>> {
        let path = match path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => self.config.model_path(p),
            None => match kind {
                ModelKind::Hourly => self.config.hourly_model_path(),
                ModelKind::Daily => self.config.daily_model_path(),
            },
        }
        .ok_or_else(|| Error::ModelNotFound {
            path: self.config.model_dir.clone(),
        })?;

        let previous = self.cache.peek(&path);
        let start = Instant::now();
        let result = self.cache.get_or_load(&path, strategy);
        self.metrics.set_models_cached(self.cache.len());

        match result {
            Ok(artifact) => {
                let reused = previous.is_some_and(|p| Arc::ptr_eq(&p, &artifact));
                if !reused {
                    let elapsed = start.elapsed();
                    self.metrics.observe_model_load_latency(elapsed.as_secs_f64());
                    let info = artifact.info();
                    self.logger.log_model_loaded(
                        &info.path.display().to_string(),
                        info.format.as_str(),
                        &info.checksum,
                        info.feature_names.as_ref().map_or(0, |n| n.len()),
                        elapsed.as_millis(),
                    );
                }
                Ok(artifact)
            }
            Err(e) => {
                self.metrics.inc_model_load_errors();
                self.logger
                    .log_model_load_failed(&path.display().to_string(), &e.to_string());
                Err(e)
            }
        }
    }

    fn record_failure(&self, error: &Error) {
        if matches!(error, Error::Prediction(_)) {
            self.metrics.inc_prediction_errors();
        }
    }
}

impl ModelProvider for AppState {
    fn hourly_model(&self) -> ridewise_lib::Result<Arc<dyn Regressor>> {
        let model: Arc<dyn Regressor> = self.model(ModelKind::Hourly, None, self.strategy)?;
        Ok(model)
    }

    fn daily_model(&self) -> ridewise_lib::Result<Arc<dyn Regressor>> {
        let model: Arc<dyn Regressor> = self.model(ModelKind::Daily, None, self.strategy)?;
        Ok(model)
    }
}

/// Load both configured models once and record the outcome as component health
pub async fn probe_models(state: Arc<AppState>) {
    state
        .health_registry
        .register(components::MODEL_CACHE)
        .await;

    let probe = Arc::clone(&state);
    let outcomes = tokio::task::spawn_blocking(move || {
        [ModelKind::Hourly, ModelKind::Daily]
            .map(|kind| (kind, probe.model(kind, None, probe.strategy).map(|_| ())))
    })
    .await;

    match outcomes {
        Ok(outcomes) => {
            for (kind, outcome) in outcomes {
                info!(model = kind.as_str(), loaded = outcome.is_ok(), "Model probe finished");
                state
                    .health_registry
                    .record_probe(kind.component(), &outcome)
                    .await;
            }
        }
        Err(e) => {
            error!(error = %e, "Model probe task failed");
            state
                .health_registry
                .set_unhealthy(components::MODEL_CACHE, e.to_string())
                .await;
        }
    }
}

/// Error returned by API handlers as `{ "error": message }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match e {
            Error::ModelNotFound { .. } => StatusCode::NOT_FOUND,
            Error::ModelLoad { .. } | Error::InvalidModel(_) | Error::Prediction(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Request body fields with form-style leniency
///
/// A body that is not a JSON object reads as empty, so every field takes
/// its default. Numbers may arrive as strings and flags as strings,
/// numbers or booleans.
struct RequestFields(Map<String, Value>);

impl RequestFields {
    fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self(Map::new()),
        }
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Non-empty text value
    fn non_empty(&self, key: &str) -> Option<String> {
        self.text(key).filter(|s| !s.trim().is_empty())
    }

    fn number(&self, key: &str, default: f64) -> Result<f64, ApiError> {
        let invalid = |v: String| {
            ApiError::bad_request(format!("invalid number for '{}': {}", key, v))
        };
        match self.get(key) {
            None => Ok(default),
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| invalid(n.to_string())),
            Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid(s.clone())),
            Some(other) => Err(invalid(other.to_string())),
        }
    }

    fn integer(&self, key: &str, default: i64) -> Result<i64, ApiError> {
        let invalid = |v: String| {
            ApiError::bad_request(format!("invalid integer for '{}': {}", key, v))
        };
        match self.get(key) {
            None => Ok(default),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .ok_or_else(|| invalid(n.to_string())),
            Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid(s.clone())),
            Some(other) => Err(invalid(other.to_string())),
        }
    }

    /// Nested object field
    fn object(&self, key: &str) -> Option<RequestFields> {
        match self.get(key)? {
            Value::Object(map) => Some(Self(map.clone())),
            _ => None,
        }
    }

    /// String field; other JSON types read as absent
    fn string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            _ => None,
        }
    }

    /// Whole number from an integer, an integral float or a numeric string
    fn whole_number(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => TRUTHY.contains(&s.trim().to_lowercase().as_str()),
            Some(other) => TRUTHY.contains(&other.to_string().as_str()),
        }
    }
}

/// Defaults for weather fields a request leaves out
struct WeatherDefaults {
    temperature: f64,
    humidity_pct: f64,
    windspeed: f64,
    condition: WeatherCondition,
}

const HOURLY_DEFAULTS: WeatherDefaults = WeatherDefaults {
    temperature: 20.0,
    humidity_pct: 60.0,
    windspeed: 12.0,
    condition: WeatherCondition::Clear,
};

const DAILY_DEFAULTS: WeatherDefaults = WeatherDefaults {
    temperature: 18.0,
    humidity_pct: 65.0,
    windspeed: 14.0,
    condition: WeatherCondition::Cloudy,
};

/// Fields shared by both prediction endpoints
#[derive(Debug)]
struct PredictionInputs {
    model_path: Option<String>,
    strategy: LoadStrategy,
    date: NaiveDate,
    conditions: DayConditions,
}

impl PredictionInputs {
    fn from_fields(
        fields: &RequestFields,
        defaults: &WeatherDefaults,
        fallback_strategy: LoadStrategy,
        today: NaiveDate,
    ) -> Result<Self, ApiError> {
        let strategy = match fields.non_empty("loader") {
            Some(s) => s.parse().map_err(ApiError::bad_request)?,
            None => fallback_strategy,
        };
        let date = match fields.non_empty("target_date") {
            Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                ApiError::bad_request(format!(
                    "invalid target_date '{}': expected YYYY-MM-DD",
                    s
                ))
            })?,
            None => today,
        };
        let weather = WeatherInputs::new(
            fields.number("temperature_c", defaults.temperature)?,
            fields.number("humidity_pct", defaults.humidity_pct)?,
            fields.number("windspeed_kph", defaults.windspeed)?,
            fields
                .text("weather_condition")
                .unwrap_or_else(|| defaults.condition.label().to_string()),
        );
        let day_type = fields.text("day_type").unwrap_or_else(|| "Weekday".into());

        let model_path = fields.non_empty("model_path");
        if let Some(p) = model_path.as_deref().filter(|p| !stays_in_model_dir(p.trim())) {
            return Err(ApiError::bad_request(format!(
                "invalid model_path '{}': must be relative to the model directory",
                p
            )));
        }

        Ok(Self {
            model_path,
            strategy,
            date,
            conditions: DayConditions {
                weather,
                is_holiday: fields.flag("is_holiday", false),
                is_working_day: fields.flag("is_working_day", true),
                weekend_override: Some(day_type == "Weekend"),
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyResponse {
    pub prediction: f64,
    pub rounded: i64,
    pub imputed: Vec<String>,
    pub by_hour_24: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyResponse {
    pub total: f64,
    pub average: f64,
    pub by_hour: Vec<f64>,
    pub imputed: Vec<String>,
    pub rounded_total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Run model work off the async executor
async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ApiError::internal(format!("Prediction task failed: {}", e)))?
}

fn serve_hourly(
    state: &AppState,
    inputs: &PredictionInputs,
    hour: u32,
) -> Result<HourlyResponse, ApiError> {
    let start = Instant::now();
    let model = state.model(
        ModelKind::Hourly,
        inputs.model_path.as_deref(),
        inputs.strategy,
    )?;

    let target = inputs
        .date
        .and_hms_opt(hour, 0, 0)
        .ok_or_else(|| ApiError::bad_request(format!("invalid target_hour {}", hour)))?;
    let row = FeatureBuilder::new().build_for(target, &inputs.conditions);

    let outcome = predict_hourly(model.as_ref(), &row).and_then(|prediction| {
        predict_hourly_curve(model.as_ref(), inputs.date, &inputs.conditions)
            .map(|curve| (prediction, curve))
    });
    let (prediction, by_hour_24) = outcome.map_err(|e| {
        state.record_failure(&e);
        ApiError::from(e)
    })?;

    state
        .metrics
        .observe_prediction_latency(start.elapsed().as_secs_f64());
    state.metrics.inc_predictions(PredictionMode::Hourly);
    state.metrics.add_imputed_features(prediction.imputed.len());
    state
        .logger
        .log_imputation(PredictionMode::Hourly, &prediction.imputed);
    state.logger.log_prediction(
        PredictionMode::Hourly,
        prediction.value,
        prediction.imputed.len(),
        model.version(),
    );

    Ok(HourlyResponse {
        prediction: prediction.value,
        rounded: display_round(prediction.value),
        imputed: prediction.imputed,
        by_hour_24,
    })
}

fn serve_daily(state: &AppState, inputs: &PredictionInputs) -> Result<DailyResponse, ApiError> {
    let start = Instant::now();
    let model = state.model(
        ModelKind::Daily,
        inputs.model_path.as_deref(),
        inputs.strategy,
    )?;

    let base = inputs.date.and_time(chrono::NaiveTime::MIN);
    let prediction = predict_daily(model.as_ref(), base, &inputs.conditions).map_err(|e| {
        state.record_failure(&e);
        ApiError::from(e)
    })?;

    state
        .metrics
        .observe_prediction_latency(start.elapsed().as_secs_f64());
    state.metrics.inc_predictions(PredictionMode::Daily);
    state.metrics.add_imputed_features(prediction.imputed.len());
    state
        .logger
        .log_imputation(PredictionMode::Daily, &prediction.imputed);
    state.logger.log_prediction(
        PredictionMode::Daily,
        prediction.total,
        prediction.imputed.len(),
        model.version(),
    );

    Ok(DailyResponse {
        rounded_total: display_round(prediction.total),
        total: prediction.total,
        average: prediction.average,
        by_hour: prediction.by_hour,
        imputed: prediction.imputed,
    })
}

async fn predict_hourly_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<HourlyResponse>, ApiError> {
    let fields = RequestFields::parse(&body);
    let inputs = PredictionInputs::from_fields(&fields, &HOURLY_DEFAULTS, state.strategy, today())?;
    let hour = fields.integer("target_hour", DEFAULT_TARGET_HOUR)?;
    let hour = u32::try_from(hour)
        .ok()
        .filter(|h| *h < 24)
        .ok_or_else(|| ApiError::bad_request(format!("target_hour must be 0-23, got {}", hour)))?;

    let response = run_blocking(move || serve_hourly(&state, &inputs, hour)).await?;
    Ok(Json(response))
}

async fn predict_daily_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<DailyResponse>, ApiError> {
    let fields = RequestFields::parse(&body);
    let inputs = PredictionInputs::from_fields(&fields, &DAILY_DEFAULTS, state.strategy, today())?;

    let response = run_blocking(move || serve_daily(&state, &inputs)).await?;
    Ok(Json(response))
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let fields = RequestFields::parse(&body);
    let message = fields.text("message").unwrap_or_default();
    // Each hint field stands alone so one bad value does not discard the rest
    let hint = fields.object("hint").map(|h| IntentHint {
        kind: h.string("kind"),
        date: h.string("date"),
        hour: h.whole_number("hour"),
    });

    let reply = run_blocking(move || {
        let start = Instant::now();
        let now = chrono::Local::now().naive_local();
        let assistant = ChatAssistant::new(Arc::clone(&state));
        let reply = assistant
            .respond(&message, hint.as_ref(), now)
            .map_err(|e| {
                state.record_failure(&e);
                ApiError::from(e)
            })?;
        match reply.kind {
            ReplyKind::Fallback => {
                state.metrics.inc_chat_fallbacks();
                state.logger.log_chat_fallback(message.len());
            }
            ReplyKind::Hourly | ReplyKind::Daily => {
                state
                    .metrics
                    .observe_prediction_latency(start.elapsed().as_secs_f64());
                state.metrics.inc_predictions(PredictionMode::Chat);
                state.metrics.add_imputed_features(reply.imputed.len());
                state
                    .logger
                    .log_imputation(PredictionMode::Chat, &reply.imputed);
            }
            ReplyKind::Prompt => {}
        }
        Ok(reply)
    })
    .await?;

    Ok(Json(ChatResponse { reply: reply.reply }))
}

async fn model_info_handler(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<ArtifactInfo>, ApiError> {
    let kind: ModelKind = kind.parse().map_err(ApiError::bad_request)?;
    let info = run_blocking(move || {
        let artifact = state.model(kind, None, state.strategy)?;
        Ok(artifact.info().clone())
    })
    .await?;
    Ok(Json(info))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.metrics.set_models_cached(state.cache.len());
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/predict_hourly", post(predict_hourly_handler))
        .route("/api/predict_daily", post(predict_daily_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/models/:kind", get(model_info_handler))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve<F>(state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = state.config.listen_addr();
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
