//! Date and hour extraction from free-text demand questions
//!
//! Rules are evaluated top to bottom and the first match wins. Later rules
//! are shadowed by earlier ones (for instance "not today" is already caught
//! by the plain "today" keyword). Nothing here fails: text without a
//! recognizable date resolves to today and text without a time yields no
//! hour.

use crate::models::IntentHint;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Substrings meaning "tomorrow", including common misspellings
pub const TOMORROW_ALIASES: &[&str] = &["tomorrow", "tommorow", "tmrw", "next day"];

/// Substrings that signal a demand question
pub const INTENT_KEYWORDS: &[&str] = &["predict", "demand", "bike", "bikes", "rent"];

static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b([0-9]{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec|january|february|march|april|june|july|august|september|october|november|december)\s+([0-9]{4})\b",
    )
    .expect("valid day-month-year pattern")
});

static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(20[0-9]{2})-([0-9]{1,2})-([0-9]{1,2})\b").expect("valid ISO date pattern")
});

static SLASH_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([0-9]{1,2})/([0-9]{1,2})/(20[0-9]{2})\b").expect("valid slash date pattern")
});

static AT_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bat\s+([0-9]{1,2})(?::([0-9]{2}))?\s*(am|pm)?\b").expect("valid 'at' pattern")
});

static AMPM_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([0-9]{1,2})\s*(am|pm)\b").expect("valid am/pm pattern"));

static COLON_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([0-9]{1,2}):([0-9]{2})\b").expect("valid HH:MM pattern"));

/// Which date rule produced the extracted date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRule {
    Hint,
    Tomorrow,
    Today,
    ExplicitPreference,
    DayMonthYear,
    Iso,
    Slash,
}

/// Which hour rule produced the extracted hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourRule {
    Hint,
    At,
    AmPm,
    Colon,
}

/// Outcome of parsing one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// Date matched by a rule; `None` means the today fallback applies
    pub date: Option<NaiveDate>,
    /// Hour in 0..=23
    pub hour: Option<u32>,
    pub wants_hourly: bool,
    pub date_rule: Option<DateRule>,
    pub hour_rule: Option<HourRule>,
    today: NaiveDate,
}

impl Extraction {
    /// The extracted date, or today when none matched
    pub fn resolved_date(&self) -> NaiveDate {
        self.date.unwrap_or(self.today)
    }
}

/// Rule-table parser for chat messages
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeExtractor;

impl DateTimeExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parse `text` relative to `now`
    ///
    /// `text` is matched case-insensitively. A hint from an upstream
    /// classifier takes precedence over every text rule.
    pub fn extract(
        &self,
        text: &str,
        now: NaiveDateTime,
        hint: Option<&IntentHint>,
    ) -> Extraction {
        let message = text.to_lowercase();
        let today = now.date();

        let (date, date_rule) = match extract_date(&message, today, hint) {
            Some((d, rule)) => (Some(d), Some(rule)),
            None => (None, None),
        };
        let (hour, hour_rule) = match extract_hour(&message, hint) {
            Some((h, rule)) => (Some(h), Some(rule)),
            None => (None, None),
        };

        let hint_hourly = hint
            .and_then(|h| h.kind.as_deref())
            .map(|k| k.eq_ignore_ascii_case("hourly"))
            .unwrap_or(false);
        let wants_hourly = hour.is_some() || hint_hourly;

        debug!(
            date = ?date,
            date_rule = ?date_rule,
            hour = ?hour,
            hour_rule = ?hour_rule,
            wants_hourly,
            "Extracted chat intent"
        );

        Extraction {
            date,
            hour,
            wants_hourly,
            date_rule,
            hour_rule,
            today,
        }
    }
}

/// True when the message should reach the prediction pipeline
pub fn has_demand_intent(text: &str, extraction: &Extraction) -> bool {
    let message = text.to_lowercase();
    INTENT_KEYWORDS.iter().any(|k| message.contains(k))
        || extraction.date.is_some()
        || extraction.hour.is_some()
}

fn extract_date(
    message: &str,
    today: NaiveDate,
    hint: Option<&IntentHint>,
) -> Option<(NaiveDate, DateRule)> {
    if let Some(d) = hint
        .and_then(|h| h.date.as_deref())
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
    {
        return Some((d, DateRule::Hint));
    }

    let tomorrow = today + Duration::days(1);
    if TOMORROW_ALIASES.iter().any(|a| message.contains(a)) {
        return Some((tomorrow, DateRule::Tomorrow));
    }
    if message.contains("today") {
        return Some((today, DateRule::Today));
    }
    if message.contains("not today") || message.contains("instead tomorrow") {
        return Some((tomorrow, DateRule::ExplicitPreference));
    }

    if let Some(d) = DAY_MONTH_YEAR.captures(message).and_then(|c| {
        let month = month_number(c.get(2)?.as_str())?;
        NaiveDate::from_ymd_opt(group(&c, 3)? as i32, month, group(&c, 1)?)
    }) {
        return Some((d, DateRule::DayMonthYear));
    }

    if let Some(d) = ISO_DATE.captures(message).and_then(|c| {
        NaiveDate::from_ymd_opt(group(&c, 1)? as i32, group(&c, 2)?, group(&c, 3)?)
    }) {
        return Some((d, DateRule::Iso));
    }

    if let Some(d) = SLASH_DATE.captures(message).and_then(|c| {
        let (a, b, year) = (group(&c, 1)?, group(&c, 2)?, group(&c, 3)?);
        // Day-first only when the first group cannot be a month
        let (day, month) = if a > 12 { (a, b) } else { (b, a) };
        NaiveDate::from_ymd_opt(year as i32, month, day)
    }) {
        return Some((d, DateRule::Slash));
    }

    None
}

fn extract_hour(message: &str, hint: Option<&IntentHint>) -> Option<(u32, HourRule)> {
    if let Some(h) = hint.and_then(|h| h.hour) {
        return Some((h.clamp(0, 23) as u32, HourRule::Hint));
    }

    let (hour, meridiem, rule) = if let Some(c) = AT_TIME.captures(message) {
        (group(&c, 1)?, c.get(3).map(|m| m.as_str()), HourRule::At)
    } else if let Some(c) = AMPM_TIME.captures(message) {
        (group(&c, 1)?, c.get(2).map(|m| m.as_str()), HourRule::AmPm)
    } else if let Some(c) = COLON_TIME.captures(message) {
        (group(&c, 1)?, None, HourRule::Colon)
    } else {
        return None;
    };

    Some((to_24_hour(hour, meridiem), rule))
}

/// Apply am/pm and clamp to 0..=23
fn to_24_hour(hour: u32, meridiem: Option<&str>) -> u32 {
    let hour = match meridiem {
        Some("pm") if hour != 12 => hour + 12,
        Some("am") if hour == 12 => 0,
        _ => hour,
    };
    hour.min(23)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

fn group(captures: &Captures<'_>, idx: usize) -> Option<u32> {
    captures.get(idx)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 24)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_meridiem_conversion() {
        assert_eq!(to_24_hour(5, Some("pm")), 17);
        assert_eq!(to_24_hour(12, Some("pm")), 12);
        assert_eq!(to_24_hour(12, Some("am")), 0);
        assert_eq!(to_24_hour(7, Some("am")), 7);
        assert_eq!(to_24_hour(13, Some("pm")), 23);
        assert_eq!(to_24_hour(99, None), 23);
    }

    #[test]
    fn test_month_table() {
        assert_eq!(month_number("sept"), Some(9));
        assert_eq!(month_number("may"), Some(5));
        assert_eq!(month_number("december"), Some(12));
        assert_eq!(month_number("smarch"), None);
    }

    #[test]
    fn test_no_match_falls_back_to_today() {
        let e = DateTimeExtractor::new().extract("hello there", now(), None);
        assert!(e.date.is_none());
        assert!(e.hour.is_none());
        assert!(!e.wants_hourly);
        assert_eq!(e.resolved_date(), now().date());
        assert!(!has_demand_intent("hello there", &e));
    }

    #[test]
    fn test_keyword_alone_is_intent() {
        let e = DateTimeExtractor::new().extract("what is the demand like", now(), None);
        assert!(e.date.is_none());
        assert!(has_demand_intent("What is the DEMAND like", &e));
    }
}
