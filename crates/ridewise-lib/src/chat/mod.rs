//! Free-text demand questions
//!
//! This module provides:
//! - Rule-ordered date and hour extraction
//! - Intent gating for unrelated messages
//! - A chat assistant that routes questions to the hourly or daily model

mod assistant;
mod extractor;


pub use assistant::{
    chat_conditions, display_round, CannedFallback, ChatAssistant, ChatReply,
    ConversationalFallback, ModelProvider, ReplyKind, CANNED_FALLBACK_REPLY, DEFAULT_CHAT_HOUR,
    EMPTY_MESSAGE_REPLY,
};
pub use extractor::{
    has_demand_intent, DateRule, DateTimeExtractor, Extraction, HourRule, INTENT_KEYWORDS,
    TOMORROW_ALIASES,
};
