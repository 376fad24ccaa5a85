//! Prediction engines
//!
//! Each request builds its own rows and aligned frame; the shared model is
//! only ever read. Failures propagate once, there is no retry.

use super::features::{names, FeatureBuilder};
use super::profile::DemandProfileSynthesizer;
use super::schema::SchemaAligner;
use super::Regressor;
use crate::error::{Error, Result};
use crate::models::{DailyPrediction, DayConditions, FeatureRow, HourlyPrediction, HOURS_PER_DAY};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Predict a single hour from a prepared feature row
pub fn predict_hourly(model: &dyn Regressor, row: &FeatureRow) -> Result<HourlyPrediction> {
    let alignment = SchemaAligner::align_row(row, model.schema());

    let value = first_value(model.predict(&alignment.frame)?)?;
    Ok(HourlyPrediction {
        value: value.max(0.0),
        imputed: alignment.imputed,
    })
}

/// Predict a daily total and expand it over 24 hours
///
/// The row is built at `base`; the daily model is hour-independent.
pub fn predict_daily(
    model: &dyn Regressor,
    base: NaiveDateTime,
    conditions: &DayConditions,
) -> Result<DailyPrediction> {
    let row = FeatureBuilder::new().build_for(base, conditions);
    let alignment = SchemaAligner::align_row(&row, model.schema());

    let total = first_value(model.predict(&alignment.frame)?)?.max(0.0);
    let is_weekend = row.get(names::IS_WEEKEND).unwrap_or(0.0) == 1.0;
    let curve = DemandProfileSynthesizer::expand(total, is_weekend);

    Ok(DailyPrediction {
        total,
        average: curve.average,
        by_hour: curve.by_hour,
        imputed: alignment.imputed,
    })
}

/// Predict every hour of `date` with an hourly model in one batch
pub fn predict_hourly_curve(
    model: &dyn Regressor,
    date: NaiveDate,
    conditions: &DayConditions,
) -> Result<Vec<f64>> {
    let builder = FeatureBuilder::new();
    let rows: Vec<FeatureRow> = (0..HOURS_PER_DAY as u32)
        .filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
        .map(|t| builder.build_for(date.and_time(t), conditions))
        .collect();

    let alignment = SchemaAligner::align(&rows, model.schema());
    let values = model.predict(&alignment.frame)?;
    if values.len() != rows.len() {
        return Err(Error::prediction(format!(
            "model returned {} values for {} rows",
            values.len(),
            rows.len()
        )));
    }
    Ok(values.into_iter().map(|v| v.max(0.0)).collect())
}

fn first_value(values: Vec<f64>) -> Result<f64> {
    values
        .into_iter()
        .next()
        .ok_or_else(|| Error::prediction("model returned no predictions"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureFrame, WeatherInputs};
    use crate::predictor::{DemandProfile, LinearModel, ModelSchema, NativeModel, NativeRegressor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Returns a fixed value per row
    struct Constant {
        value: f64,
        schema: Option<ModelSchema>,
    }

    impl Regressor for Constant {
        fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
            Ok(vec![self.value; frame.n_rows()])
        }

        fn schema(&self) -> Option<&ModelSchema> {
            self.schema.as_ref()
        }
    }

    struct Failing;

    impl Regressor for Failing {
        fn predict(&self, _frame: &FeatureFrame) -> Result<Vec<f64>> {
            Err(Error::prediction("boom"))
        }

        fn schema(&self) -> Option<&ModelSchema> {
            None
        }
    }

    fn conditions(weekend_override: Option<bool>) -> DayConditions {
        DayConditions {
            weather: WeatherInputs::new(20.0, 60.0, 12.0, "Clear/Few Clouds"),
            is_holiday: false,
            is_working_day: true,
            weekend_override,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hour_model() -> NativeRegressor {
        NativeRegressor::new(NativeModel::Linear(LinearModel {
            feature_names: Some(vec!["hr".into(), "temp".into(), "visibility".into()]),
            intercept: -50.0,
            coefficients: vec![10.0, 1.0, 100.0],
        }))
        .unwrap()
    }

    #[test]
    fn test_hourly_imputes_missing_schema_column() {
        let model = hour_model();
        let target = date(2025, 11, 25).and_hms_opt(17, 0, 0).unwrap();
        let row = FeatureBuilder::new().build_for(target, &conditions(None));
        let pred = predict_hourly(&model, &row).unwrap();
        assert_eq!(pred.imputed, vec!["visibility".to_string()]);
        // -50 + 10*17 + 20
        assert!((pred.value - 140.0).abs() < 1e-9);
    }

    /// Counts WARN events seen while installed
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_imputation_does_not_warn_inside_the_pipeline() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber =
            tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));

        let model = hour_model();
        let target = date(2025, 11, 25).and_hms_opt(17, 0, 0).unwrap();
        let row = FeatureBuilder::new().build_for(target, &conditions(None));
        let (hourly, daily) = tracing::subscriber::with_default(subscriber, || {
            (
                predict_hourly(&model, &row).unwrap(),
                predict_daily(&model, target, &conditions(None)).unwrap(),
            )
        });

        assert_eq!(hourly.imputed, vec!["visibility".to_string()]);
        assert_eq!(daily.imputed, vec!["visibility".to_string()]);
        // The server's schema_imputation event is the single warning
        assert_eq!(warnings.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_hourly_clamps_negative_output() {
        let model = hour_model();
        let target = date(2025, 11, 25).and_hms_opt(0, 0, 0).unwrap();
        let row = FeatureBuilder::new().build_for(target, &conditions(None));
        let pred = predict_hourly(&model, &row).unwrap();
        assert_eq!(pred.value, 0.0);
    }

    #[test]
    fn test_daily_curve_sums_to_total() {
        let model = Constant { value: 500.0, schema: None };
        let base = date(2025, 11, 29).and_hms_opt(0, 0, 0).unwrap();
        let daily = predict_daily(&model, base, &conditions(None)).unwrap();
        assert_eq!(daily.total, 500.0);
        assert_eq!(daily.by_hour.len(), 24);
        let sum: f64 = daily.by_hour.iter().sum();
        assert!((sum - 500.0).abs() <= 1e-6 * 500.0);
        assert!((daily.average - sum / 24.0).abs() < 1e-9);
        // Saturday uses the weekend shape
        let expected = DemandProfile::weekend().weights()[12] * 500.0;
        assert!((daily.by_hour[12] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_daily_override_selects_weekday_profile() {
        let model = Constant { value: 100.0, schema: None };
        let base = date(2025, 11, 29).and_hms_opt(0, 0, 0).unwrap();
        let daily = predict_daily(&model, base, &conditions(Some(false))).unwrap();
        let expected = DemandProfile::weekday().weights()[17] * 100.0;
        assert!((daily.by_hour[17] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_daily_negative_total_clamped() {
        let model = Constant { value: -42.0, schema: None };
        let base = date(2025, 11, 25).and_hms_opt(0, 0, 0).unwrap();
        let daily = predict_daily(&model, base, &conditions(None)).unwrap();
        assert_eq!(daily.total, 0.0);
        assert!(daily.by_hour.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_hourly_curve_has_24_clamped_values() {
        let model = hour_model();
        let curve = predict_hourly_curve(&model, date(2025, 11, 25), &conditions(None)).unwrap();
        assert_eq!(curve.len(), 24);
        assert!(curve.iter().all(|v| *v >= 0.0));
        assert!((curve[23] - (-50.0 + 230.0 + 20.0)).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_error_propagates() {
        let row = FeatureRow::new();
        assert!(matches!(predict_hourly(&Failing, &row), Err(Error::Prediction(_))));
        let base = date(2025, 11, 25).and_hms_opt(0, 0, 0).unwrap();
        assert!(predict_daily(&Failing, base, &conditions(None)).is_err());
    }
}
