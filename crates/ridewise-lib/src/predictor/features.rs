//! Feature construction for demand inference
//!
//! Derives a canonical feature row from a target timestamp plus weather and
//! calendar inputs. Every canonical feature is emitted together with the
//! aliased names used by models trained on the hour/day rental dataset, so
//! alignment resolves either naming convention.

use crate::models::{DayConditions, FeatureRow, WeatherCondition, WeatherInputs};
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Canonical feature names
pub mod names {
    pub const TEMPERATURE: &str = "temperature";
    pub const HUMIDITY_PCT: &str = "humidity_pct";
    pub const WINDSPEED: &str = "windspeed";
    pub const WEATHER_CODE: &str = "weather_code";
    pub const IS_HOLIDAY: &str = "is_holiday";
    pub const IS_WORKING_DAY: &str = "is_working_day";
    pub const HOUR: &str = "hour";
    pub const DAYOFWEEK: &str = "dayofweek";
    pub const IS_WEEKEND: &str = "is_weekend";
    pub const MONTH: &str = "month";
    pub const DAY: &str = "day";
    pub const SEASON: &str = "season";
}

/// Canonical name to the aliases emitted alongside it
pub const FEATURE_ALIASES: &[(&str, &[&str])] = &[
    (names::TEMPERATURE, &["temp", "atemp"]),
    (names::HUMIDITY_PCT, &["hum"]),
    (names::WINDSPEED, &["windspeed"]),
    (names::WEATHER_CODE, &["weathersit"]),
    (names::IS_HOLIDAY, &["holiday"]),
    (names::IS_WORKING_DAY, &["workingday"]),
    (names::HOUR, &["hr"]),
    (names::DAYOFWEEK, &["weekday"]),
    (names::MONTH, &["mnth"]),
];

/// Season code for a calendar month (1=winter .. 4=autumn)
pub fn season_for_month(month: u32) -> u8 {
    match month {
        12 | 1 | 2 => 1,
        3..=5 => 2,
        6..=8 => 3,
        _ => 4,
    }
}

/// Builds canonical feature rows
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the feature row for `target`
    ///
    /// `weekend_override`, when supplied, replaces the calendar weekend flag.
    pub fn build(
        &self,
        target: NaiveDateTime,
        weather: &WeatherInputs,
        is_holiday: bool,
        is_working_day: bool,
        weekend_override: Option<bool>,
    ) -> FeatureRow {
        let dayofweek = target.weekday().num_days_from_monday();
        let month = target.month();
        let is_weekend = weekend_override.unwrap_or(dayofweek >= 5);

        let mut row = FeatureRow::new();
        row.insert(names::TEMPERATURE, weather.temperature);
        row.insert(names::HUMIDITY_PCT, weather.humidity_pct);
        row.insert(names::WINDSPEED, weather.windspeed);
        row.insert(
            names::WEATHER_CODE,
            WeatherCondition::code_for_label(&weather.condition) as f64,
        );
        row.insert(names::IS_HOLIDAY, flag(is_holiday));
        row.insert(names::IS_WORKING_DAY, flag(is_working_day));
        row.insert(names::HOUR, target.hour() as f64);
        row.insert(names::DAYOFWEEK, dayofweek as f64);
        row.insert(names::IS_WEEKEND, flag(is_weekend));
        row.insert(names::MONTH, month as f64);
        row.insert(names::DAY, target.day() as f64);
        row.insert(names::SEASON, season_for_month(month) as f64);

        with_aliases(row)
    }

    /// Build from shared day conditions
    pub fn build_for(&self, target: NaiveDateTime, conditions: &DayConditions) -> FeatureRow {
        self.build(
            target,
            &conditions.weather,
            conditions.is_holiday,
            conditions.is_working_day,
            conditions.weekend_override,
        )
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn with_aliases(mut row: FeatureRow) -> FeatureRow {
    for (canonical, aliases) in FEATURE_ALIASES {
        if let Some(value) = row.get(canonical) {
            for alias in aliases.iter() {
                row.insert(*alias, value);
            }
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn clear() -> WeatherInputs {
        WeatherInputs::new(20.0, 60.0, 12.0, "Clear/Few Clouds")
    }

    #[test]
    fn test_reference_tuesday_evening() {
        let row = FeatureBuilder::new().build(at(2025, 11, 25, 17), &clear(), false, true, None);
        assert_eq!(row.get(names::SEASON), Some(4.0));
        assert_eq!(row.get(names::WEATHER_CODE), Some(0.0));
        assert_eq!(row.get(names::DAYOFWEEK), Some(1.0));
        assert_eq!(row.get(names::HOUR), Some(17.0));
        assert_eq!(row.get(names::MONTH), Some(11.0));
        assert_eq!(row.get(names::DAY), Some(25.0));
        assert_eq!(row.get(names::IS_WEEKEND), Some(0.0));
        assert_eq!(row.get(names::IS_WORKING_DAY), Some(1.0));
        assert_eq!(row.get(names::TEMPERATURE), Some(20.0));
    }

    #[test]
    fn test_season_table() {
        let expected = [1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4, 1];
        for (idx, season) in expected.iter().enumerate() {
            assert_eq!(season_for_month(idx as u32 + 1), *season, "month {}", idx + 1);
        }
    }

    #[test]
    fn test_weekend_derived_from_calendar() {
        let builder = FeatureBuilder::new();
        // 2025-11-29 is a Saturday
        let row = builder.build(at(2025, 11, 29, 9), &clear(), false, false, None);
        assert_eq!(row.get(names::DAYOFWEEK), Some(5.0));
        assert_eq!(row.get(names::IS_WEEKEND), Some(1.0));
    }

    #[test]
    fn test_weekend_override_wins() {
        let builder = FeatureBuilder::new();
        let tuesday = builder.build(at(2025, 11, 25, 9), &clear(), false, true, Some(true));
        assert_eq!(tuesday.get(names::IS_WEEKEND), Some(1.0));

        let sunday = builder.build(at(2025, 11, 30, 9), &clear(), false, true, Some(false));
        assert_eq!(sunday.get(names::IS_WEEKEND), Some(0.0));
    }

    #[test]
    fn test_aliases_mirror_canonical_values() {
        let weather = WeatherInputs::new(31.5, 44.0, 7.0, "Light Rain/Snow");
        let row = FeatureBuilder::new().build(at(2025, 7, 4, 8), &weather, true, false, None);
        for (canonical, aliases) in FEATURE_ALIASES {
            let value = row.get(canonical).unwrap();
            for alias in aliases.iter() {
                assert_eq!(row.get(alias), Some(value), "alias {} of {}", alias, canonical);
            }
        }
        assert_eq!(row.get("weathersit"), Some(3.0));
        assert_eq!(row.get("atemp"), Some(31.5));
        assert_eq!(row.get("holiday"), Some(1.0));
    }

    #[test]
    fn test_unknown_weather_label_defaults_to_clear() {
        let weather = WeatherInputs::new(10.0, 80.0, 3.0, "volcanic ash");
        let row = FeatureBuilder::new().build(at(2025, 1, 1, 0), &weather, false, false, None);
        assert_eq!(row.get(names::WEATHER_CODE), Some(0.0));
        assert_eq!(row.get(names::SEASON), Some(1.0));
    }

    #[test]
    fn test_windspeed_alias_is_not_duplicated() {
        let row = FeatureBuilder::new().build(at(2025, 3, 3, 3), &clear(), false, true, None);
        assert_eq!(row.names().filter(|n| *n == "windspeed").count(), 1);
    }
}
