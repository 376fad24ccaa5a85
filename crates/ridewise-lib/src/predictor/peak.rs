//! Peak demand search over hours of a day or a run of days

use super::engine::{predict_daily, predict_hourly_curve};
use super::Regressor;
use crate::error::Result;
use crate::models::DayConditions;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakHour {
    pub date: NaiveDate,
    pub hour: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDay {
    pub start: NaiveDate,
    pub date: NaiveDate,
    pub total: f64,
}

/// Hour of `date` with the highest predicted demand; earliest hour wins ties
pub fn peak_hour(
    model: &dyn Regressor,
    date: NaiveDate,
    conditions: &DayConditions,
) -> Result<PeakHour> {
    let curve = predict_hourly_curve(model, date, conditions)?;
    let (hour, value) = curve
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (h, v)| {
            if *v > best.1 {
                (h, *v)
            } else {
                best
            }
        });
    Ok(PeakHour {
        date,
        hour: hour as u32,
        value,
    })
}

/// Day in `[start, start + days)` with the highest predicted total
///
/// `conditions_for` supplies the weather and calendar flags of each day.
pub fn peak_day<F>(
    model: &dyn Regressor,
    start: NaiveDate,
    days: u32,
    conditions_for: F,
) -> Result<Option<PeakDay>>
where
    F: Fn(NaiveDate) -> DayConditions,
{
    let mut best: Option<PeakDay> = None;
    for offset in 0..days {
        let date = start + Duration::days(offset as i64);
        let Some(base) = date.and_hms_opt(0, 0, 0) else {
            continue;
        };
        let daily = predict_daily(model, base, &conditions_for(date))?;
        if best.as_ref().map_or(true, |b| daily.total > b.total) {
            best = Some(PeakDay {
                start,
                date,
                total: daily.total,
            });
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureFrame, WeatherInputs};
    use crate::predictor::{LinearModel, ModelSchema, NativeModel, NativeRegressor};

    fn conditions() -> DayConditions {
        DayConditions {
            weather: WeatherInputs::new(20.0, 60.0, 12.0, "Clear/Few Clouds"),
            is_holiday: false,
            is_working_day: true,
            weekend_override: None,
        }
    }

    /// Demand rises with the hour until 14:00, then falls
    struct Humped;

    impl Regressor for Humped {
        fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
            let hours = frame.column("hr").unwrap_or_default();
            Ok(hours.iter().map(|h| 100.0 - (h - 14.0).abs() * 5.0).collect())
        }

        fn schema(&self) -> Option<&ModelSchema> {
            None
        }
    }

    #[test]
    fn test_peak_hour_found() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 25).unwrap();
        let peak = peak_hour(&Humped, date, &conditions()).unwrap();
        assert_eq!(peak.hour, 14);
        assert_eq!(peak.value, 100.0);
    }

    #[test]
    fn test_peak_day_uses_per_day_conditions() {
        // Demand grows with temperature
        let model = NativeRegressor::new(NativeModel::Linear(LinearModel {
            feature_names: Some(vec!["temp".into()]),
            intercept: 0.0,
            coefficients: vec![10.0],
        }))
        .unwrap();
        let start = NaiveDate::from_ymd_opt(2025, 11, 24).unwrap();
        let hot_day = NaiveDate::from_ymd_opt(2025, 11, 27).unwrap();
        let peak = peak_day(&model, start, 7, |d| {
            let mut c = conditions();
            c.weather.temperature = if d == hot_day { 35.0 } else { 15.0 };
            c
        })
        .unwrap()
        .unwrap();
        assert_eq!(peak.date, hot_day);
        assert_eq!(peak.total, 350.0);
        assert_eq!(peak.start, start);
    }

    #[test]
    fn test_peak_day_ties_keep_earliest() {
        let model = NativeRegressor::new(NativeModel::Linear(LinearModel {
            feature_names: None,
            intercept: 10.0,
            coefficients: vec![],
        }))
        .unwrap();
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let peak = peak_day(&model, start, 3, |_| conditions()).unwrap().unwrap();
        assert_eq!(peak.date, start);
    }

    #[test]
    fn test_peak_day_empty_range() {
        let model = Humped;
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(peak_day(&model, start, 0, |_| conditions()).unwrap().is_none());
    }
}
