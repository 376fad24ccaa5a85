//! Prediction CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, DailyPrediction, HourlyPrediction, PredictRequest};
use crate::output::{
    demand_bar, format_bikes, format_list, print_field, print_heading, print_json, print_rows,
    print_warning, OutputFormat,
};
use crate::PredictArgs;

const BAR_WIDTH: usize = 30;

/// Row for the 24-hour demand table
#[derive(Tabled)]
struct HourRow {
    #[tabled(rename = "Hour")]
    hour: String,
    #[tabled(rename = "Bikes")]
    bikes: String,
    #[tabled(rename = "")]
    bar: String,
}

impl PredictArgs {
    /// Request body for these flags
    pub fn to_request(&self, target_hour: Option<u32>) -> PredictRequest {
        PredictRequest {
            model_path: self.model_path.clone(),
            loader: self.loader.clone(),
            target_date: self.date.clone(),
            target_hour,
            temperature_c: self.temperature,
            humidity_pct: self.humidity,
            windspeed_kph: self.windspeed,
            weather_condition: self.weather.clone(),
            is_holiday: self.holiday,
            is_working_day: !self.non_working,
            day_type: if self.weekend { "Weekend" } else { "Weekday" }.to_string(),
        }
    }
}

fn hour_rows(curve: &[f64], highlight: Option<usize>) -> Vec<HourRow> {
    let max = curve.iter().copied().fold(0.0, f64::max);
    curve
        .iter()
        .enumerate()
        .map(|(hour, value)| {
            let label = format!("{:02}:00", hour);
            HourRow {
                hour: if Some(hour) == highlight {
                    label.bold().to_string()
                } else {
                    label
                },
                bikes: format_bikes(*value),
                bar: demand_bar(*value, max, BAR_WIDTH).cyan().to_string(),
            }
        })
        .collect()
}

fn report_imputed(imputed: &[String]) {
    if !imputed.is_empty() {
        print_warning(&format!(
            "Filled missing model features with 0: {}",
            format_list(imputed)
        ));
    }
}

/// Predict bikes for a single hour
pub async fn predict_hourly(
    client: &ApiClient,
    args: &PredictArgs,
    hour: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let request = args.to_request(hour);
    let result: HourlyPrediction = client.post("api/predict_hourly", &request).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_heading("Hourly Prediction");
            if let Some(date) = &args.date {
                print_field("Date", date);
            }
            if let Some(hour) = hour {
                print_field("Hour", format!("{:02}:00", hour));
            }
            print_field(
                "Predicted bikes",
                result.rounded.to_string().green().bold(),
            );
            print_field("Raw prediction", format_bikes(result.prediction));
            report_imputed(&result.imputed);
            println!();

            println!("{}", "Demand by Hour".bold());
            println!("{}", "-".repeat(50));
            print_rows(hour_rows(&result.by_hour_24, hour.map(|h| h as usize)));
        }
    }

    Ok(())
}

/// Predict total bikes for a day
pub async fn predict_daily(
    client: &ApiClient,
    args: &PredictArgs,
    format: OutputFormat,
) -> Result<()> {
    let request = args.to_request(None);
    let result: DailyPrediction = client.post("api/predict_daily", &request).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_heading("Daily Prediction");
            if let Some(date) = &args.date {
                print_field("Date", date);
            }
            print_field(
                "Total bikes",
                result.rounded_total.to_string().green().bold(),
            );
            print_field("Hourly average", format_bikes(result.average));
            report_imputed(&result.imputed);
            println!();

            println!("{}", "Demand by Hour".bold());
            println!("{}", "-".repeat(50));
            print_rows(hour_rows(&result.by_hour, None));
        }
    }

    Ok(())
}
