//! Core data models for the demand predictor

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hours in a synthesized or predicted demand curve
pub const HOURS_PER_DAY: usize = 24;

/// Ordinal weather vocabulary; the code is the enumeration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherCondition {
    #[serde(rename = "Clear/Few Clouds")]
    Clear,
    #[serde(rename = "Cloudy/Overcast")]
    Cloudy,
    #[serde(rename = "Mist/Haze")]
    Mist,
    #[serde(rename = "Light Rain/Snow")]
    LightPrecipitation,
    #[serde(rename = "Heavy Rain/Snow/Thunderstorm")]
    HeavyPrecipitation,
}

impl WeatherCondition {
    pub const ALL: [WeatherCondition; 5] = [
        WeatherCondition::Clear,
        WeatherCondition::Cloudy,
        WeatherCondition::Mist,
        WeatherCondition::LightPrecipitation,
        WeatherCondition::HeavyPrecipitation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Clear => "Clear/Few Clouds",
            Self::Cloudy => "Cloudy/Overcast",
            Self::Mist => "Mist/Haze",
            Self::LightPrecipitation => "Light Rain/Snow",
            Self::HeavyPrecipitation => "Heavy Rain/Snow/Thunderstorm",
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Exact label lookup
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    /// Ordinal code for a label; unknown labels silently map to 0
    pub fn code_for_label(label: &str) -> u8 {
        Self::from_label(label).map(|c| c.code()).unwrap_or(0)
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Weather inputs for a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherInputs {
    pub temperature: f64,
    pub humidity_pct: f64,
    pub windspeed: f64,
    /// Free-form label, matched against the [`WeatherCondition`] vocabulary
    pub condition: String,
}

impl WeatherInputs {
    pub fn new(temperature: f64, humidity_pct: f64, windspeed: f64, condition: impl Into<String>) -> Self {
        Self {
            temperature,
            humidity_pct,
            windspeed,
            condition: condition.into(),
        }
    }
}

/// Weather plus calendar flags shared by every hour of a day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayConditions {
    pub weather: WeatherInputs,
    pub is_holiday: bool,
    pub is_working_day: bool,
    /// Supersedes the calendar-derived weekend flag when set
    pub weekend_override: Option<bool>,
}

/// Ordered mapping from feature name to value
///
/// Insertion order is preserved so that a row without a model schema keeps
/// a stable column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    entries: Vec<(String, f64)>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing an existing entry in place
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FeatureRow {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut row = FeatureRow::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

/// Column-ordered batch of feature values, the input to a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureFrame {
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Values of one named column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }
}

/// Result of a single-hour prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPrediction {
    /// Clamped at 0
    pub value: f64,
    /// Schema columns that were zero-filled
    pub imputed: Vec<String>,
}

/// Result of a daily prediction expanded to an hourly curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrediction {
    pub total: f64,
    pub average: f64,
    pub by_hour: Vec<f64>,
    pub imputed: Vec<String>,
}

/// Structured hint from an upstream intent classifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentHint {
    /// `"hourly"` or `"daily"`
    #[serde(default)]
    pub kind: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub hour: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_codes_follow_vocabulary_order() {
        for (idx, cond) in WeatherCondition::ALL.iter().enumerate() {
            assert_eq!(cond.code() as usize, idx);
            assert_eq!(WeatherCondition::from_label(cond.label()), Some(*cond));
        }
        assert_eq!(WeatherCondition::code_for_label("Mist/Haze"), 2);
    }

    #[test]
    fn test_unknown_weather_label_maps_to_zero() {
        assert_eq!(WeatherCondition::code_for_label("Sandstorm"), 0);
        assert_eq!(WeatherCondition::code_for_label(""), 0);
    }

    #[test]
    fn test_weather_serde_uses_labels() {
        let json = serde_json::to_string(&WeatherCondition::LightPrecipitation).unwrap();
        assert_eq!(json, "\"Light Rain/Snow\"");
    }

    #[test]
    fn test_feature_row_insert_replaces_in_place() {
        let mut row = FeatureRow::new();
        row.insert("hr", 5.0);
        row.insert("temp", 20.0);
        row.insert("hr", 6.0);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("hr"), Some(6.0));
        assert_eq!(row.names().collect::<Vec<_>>(), vec!["hr", "temp"]);
    }

    #[test]
    fn test_frame_column_lookup() {
        let frame = FeatureFrame::from_parts(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        );
        assert_eq!(frame.column("b"), Some(vec![2.0, 4.0]));
        assert_eq!(frame.column("c"), None);
        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.n_cols(), 2);
    }
}
