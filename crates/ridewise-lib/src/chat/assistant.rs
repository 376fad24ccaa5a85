//! Chat assistant answering free-text demand questions
//!
//! Messages without demand intent never reach a model; they are answered
//! by a [`ConversationalFallback`].

use super::extractor::{has_demand_intent, DateTimeExtractor};
use crate::error::Result;
use crate::models::{DayConditions, IntentHint, WeatherCondition, WeatherInputs};
use crate::predictor::{predict_daily, predict_hourly, FeatureBuilder, Regressor};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Reply to an empty message
pub const EMPTY_MESSAGE_REPLY: &str =
    "Please enter a question like 'how many bikes will be rented tomorrow at 5pm?'";

/// Reply to a message without demand intent
pub const CANNED_FALLBACK_REPLY: &str = "Hi! Ask me things like 'How many bikes will be rented tomorrow at 5pm?' or 'What is the expected bike demand on 25 Nov 2025?'";

/// Hour used when hourly mode is requested without a time
pub const DEFAULT_CHAT_HOUR: u32 = 17;

/// Source of the hourly and daily models
pub trait ModelProvider: Send + Sync {
    fn hourly_model(&self) -> Result<Arc<dyn Regressor>>;
    fn daily_model(&self) -> Result<Arc<dyn Regressor>>;
}

impl<T: ModelProvider + ?Sized> ModelProvider for Arc<T> {
    fn hourly_model(&self) -> Result<Arc<dyn Regressor>> {
        (**self).hourly_model()
    }

    fn daily_model(&self) -> Result<Arc<dyn Regressor>> {
        (**self).daily_model()
    }
}

/// Answers messages that are not demand questions
pub trait ConversationalFallback: Send + Sync {
    fn respond(&self, message: &str) -> String;
}

/// Fixed guidance text
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedFallback;

impl ConversationalFallback for CannedFallback {
    fn respond(&self, _message: &str) -> String {
        CANNED_FALLBACK_REPLY.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    Prompt,
    Fallback,
    Hourly,
    Daily,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub kind: ReplyKind,
    /// Schema columns zero-filled for the prediction behind the reply
    #[serde(default)]
    pub imputed: Vec<String>,
}

impl ChatReply {
    fn new(reply: impl Into<String>, kind: ReplyKind) -> Self {
        Self {
            reply: reply.into(),
            kind,
            imputed: Vec::new(),
        }
    }

    fn with_imputed(mut self, imputed: Vec<String>) -> Self {
        self.imputed = imputed;
        self
    }
}

/// Conditions assumed for a chat question on `date`
pub fn chat_conditions(date: NaiveDate) -> DayConditions {
    let is_weekend = date.weekday().num_days_from_monday() >= 5;
    DayConditions {
        weather: WeatherInputs::new(20.0, 60.0, 12.0, WeatherCondition::Clear.label()),
        is_holiday: false,
        is_working_day: !is_weekend,
        weekend_override: Some(is_weekend),
    }
}

/// Round for display, ties to even
pub fn display_round(value: f64) -> i64 {
    value.round_ties_even() as i64
}

pub struct ChatAssistant<P, F = CannedFallback> {
    provider: P,
    fallback: F,
    extractor: DateTimeExtractor,
}

impl<P: ModelProvider> ChatAssistant<P, CannedFallback> {
    pub fn new(provider: P) -> Self {
        Self::with_fallback(provider, CannedFallback)
    }
}

impl<P: ModelProvider, F: ConversationalFallback> ChatAssistant<P, F> {
    pub fn with_fallback(provider: P, fallback: F) -> Self {
        Self {
            provider,
            fallback,
            extractor: DateTimeExtractor::new(),
        }
    }

    /// Answer one message as of `now`
    ///
    /// Model loading and prediction failures propagate; nothing else fails.
    pub fn respond(
        &self,
        text: &str,
        hint: Option<&IntentHint>,
        now: NaiveDateTime,
    ) -> Result<ChatReply> {
        let message = text.trim().to_lowercase();
        if message.is_empty() {
            return Ok(ChatReply::new(EMPTY_MESSAGE_REPLY, ReplyKind::Prompt));
        }

        let extraction = self.extractor.extract(&message, now, hint);
        if !has_demand_intent(&message, &extraction) {
            debug!("No demand intent in chat message");
            return Ok(ChatReply::new(
                self.fallback.respond(&message),
                ReplyKind::Fallback,
            ));
        }

        let date = extraction.resolved_date();
        let conditions = chat_conditions(date);

        if extraction.wants_hourly {
            let hour = extraction.hour.unwrap_or(DEFAULT_CHAT_HOUR);
            let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
            let target = date.and_time(time);
            let row = FeatureBuilder::new().build_for(target, &conditions);
            let model = self.provider.hourly_model()?;
            let prediction = predict_hourly(model.as_ref(), &row)?;
            Ok(ChatReply::new(
                format!(
                    "Predicted bikes for {} at {:02}:00: {}.",
                    date.format("%Y-%m-%d"),
                    hour,
                    display_round(prediction.value)
                ),
                ReplyKind::Hourly,
            )
            .with_imputed(prediction.imputed))
        } else {
            let model = self.provider.daily_model()?;
            let prediction =
                predict_daily(model.as_ref(), date.and_time(NaiveTime::MIN), &conditions)?;
            Ok(ChatReply::new(
                format!(
                    "Predicted total bikes on {}: {}.",
                    date.format("%Y-%m-%d"),
                    display_round(prediction.total)
                ),
                ReplyKind::Daily,
            )
            .with_imputed(prediction.imputed))
        }
    }
}
