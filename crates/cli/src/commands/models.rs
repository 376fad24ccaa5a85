//! Model and health CLI commands

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeZone};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use ridewise_lib::chat::chat_conditions;
use ridewise_lib::predictor::{peak_day, peak_hour, PeakDay, PeakHour};
use ridewise_lib::{LoadStrategy, ModelArtifact, ModelLoader, Regressor};

use crate::client::{ApiClient, ArtifactInfo, HealthResponse, ReadinessResponse};
use crate::output::{
    color_status, format_bikes, format_bytes, format_list, print_field, print_heading, print_info,
    print_json, print_rows, OutputFormat,
};

/// Row for the component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Local inspection result
#[derive(Debug, Serialize)]
struct InspectReport {
    #[serde(flatten)]
    info: ArtifactInfo,
    version: String,
    schema: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peak_hour: Option<PeakHour>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peak_day: Option<PeakDay>,
}

fn print_artifact(info: &ArtifactInfo) {
    print_field("Path", info.path.display());
    print_field("Format", info.format.as_str().cyan());
    print_field("Checksum", &info.checksum);
    print_field("Size", format_bytes(info.size_bytes as u64));
    let loaded_at = Local
        .timestamp_opt(info.loaded_at, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| info.loaded_at.to_string());
    print_field("Loaded", loaded_at.dimmed());
}

/// Show the artifact the server uses for `kind`
pub async fn show_model(client: &ApiClient, kind: &str, format: OutputFormat) -> Result<()> {
    let info: ArtifactInfo = client.get(&format!("api/models/{}", kind)).await?;

    match format {
        OutputFormat::Json => print_json(&info)?,
        OutputFormat::Table => {
            print_heading(&format!("{} Model", capitalize(kind)));
            print_artifact(&info);
            print_field(
                "Features",
                info.feature_names
                    .as_deref()
                    .map(format_list)
                    .unwrap_or_else(|| "unknown (positional input)".to_string()),
            );
        }
    }

    Ok(())
}

/// Load a model file locally and describe it
pub fn inspect_model(
    path: &str,
    loader: &str,
    peak_days: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let strategy: LoadStrategy = loader.parse().map_err(anyhow::Error::msg)?;
    let artifact = ModelLoader::load(path, strategy)
        .with_context(|| format!("Failed to inspect {}", path))?;

    let report = build_report(&artifact, peak_days, Local::now().date_naive())?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            print_heading("Model Artifact");
            print_artifact(&report.info);
            print_field("Version", &report.version);
            match &report.schema {
                Some(names) => {
                    print_field("Schema", format!("{} features", names.len()));
                    for name in names {
                        println!("  - {}", name);
                    }
                }
                None => print_info("No feature schema; inputs are positional"),
            }

            if let Some(peak) = &report.peak_hour {
                println!();
                print_field(
                    "Peak hour",
                    format!(
                        "{} {:02}:00 ({} bikes)",
                        peak.date,
                        peak.hour,
                        format_bikes(peak.value)
                    ),
                );
            }
            if let Some(peak) = &report.peak_day {
                print_field(
                    "Peak day",
                    format!("{} ({} bikes)", peak.date, format_bikes(peak.total)),
                );
            }
        }
    }

    Ok(())
}

/// Describe `artifact`, searching `peak_days` days from `start` when asked
fn build_report(
    artifact: &ModelArtifact,
    peak_days: Option<u32>,
    start: NaiveDate,
) -> Result<InspectReport> {
    let (peak_hour, peak_day) = match peak_days {
        Some(days) => (
            Some(peak_hour(artifact, start, &chat_conditions(start))?),
            peak_day(artifact, start, days, chat_conditions)?,
        ),
        None => (None, None),
    };

    Ok(InspectReport {
        info: artifact.info().clone(),
        version: artifact.version().to_string(),
        schema: artifact.schema().map(|s| s.names().to_vec()),
        peak_hour,
        peak_day,
    })
}

/// Show service health and readiness
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (_, HealthResponse) = client.probe("healthz").await?;
    let (_, readiness): (_, ReadinessResponse) = client.probe("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "health": health,
            "readiness": readiness,
        }))?,
        OutputFormat::Table => {
            print_heading("Service Health");
            print_field("Status", color_status(health.status.as_str()));
            let ready = if readiness.ready { "ready" } else { "not ready" };
            print_field("Readiness", color_status(ready));
            if let Some(reason) = &readiness.reason {
                print_field("Reason", reason);
            }
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(component.status.as_str()),
                    message: component.message.clone().unwrap_or_default(),
                })
                .collect();
            print_rows(rows);
        }
    }

    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
