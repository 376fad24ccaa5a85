//! RideWise CLI
//!
//! A command-line tool for requesting demand predictions, chatting with
//! the assistant and inspecting model artifacts.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{chat, models, predict};

const DEFAULT_API_URL: &str = "http://localhost:5000";

/// RideWise CLI
#[derive(Parser)]
#[command(name = "ridewise")]
#[command(author, version, about = "CLI for RideWise bike demand predictions", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via RIDEWISE_API_URL env var)
    #[arg(long, env = "RIDEWISE_API_URL")]
    pub api_url: Option<String>,

    /// Output format (defaults to the config file value, then table)
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Request demand predictions
    #[command(subcommand)]
    Predict(PredictCommands),

    /// Ask the assistant a free-text question
    Chat {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,

        /// Classifier hint: hourly or daily
        #[arg(long)]
        hint_kind: Option<String>,

        /// Classifier hint date (YYYY-MM-DD)
        #[arg(long)]
        hint_date: Option<String>,

        /// Classifier hint hour
        #[arg(long)]
        hint_hour: Option<i64>,
    },

    /// Show the artifact the server loaded for a model kind
    Models {
        /// Model kind (hourly or daily)
        kind: String,
    },

    /// Load a model file locally and describe it
    Inspect {
        /// Path to the model artifact
        path: String,

        /// Loader strategy (auto, json, bincode, onnx)
        #[arg(long, default_value = "auto")]
        loader: String,

        /// Also search this many days from today for peak demand
        #[arg(long)]
        peak_days: Option<u32>,
    },

    /// Show service health
    Health,
}

#[derive(Subcommand)]
pub enum PredictCommands {
    /// Predict bikes rented in one hour
    Hourly {
        /// Hour of day (0-23)
        #[arg(long)]
        hour: Option<u32>,

        #[command(flatten)]
        inputs: PredictArgs,
    },

    /// Predict total bikes rented over a day
    Daily {
        #[command(flatten)]
        inputs: PredictArgs,
    },
}

/// Flags shared by both prediction commands
#[derive(Args, Debug, Clone, Default)]
pub struct PredictArgs {
    /// Target date (YYYY-MM-DD, defaults to today on the server)
    #[arg(long)]
    pub date: Option<String>,

    /// Temperature in Celsius
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Relative humidity in percent
    #[arg(long)]
    pub humidity: Option<f64>,

    /// Wind speed in km/h
    #[arg(long)]
    pub windspeed: Option<f64>,

    /// Weather condition label, e.g. "Clear/Few Clouds"
    #[arg(long)]
    pub weather: Option<String>,

    /// Treat the day as a public holiday
    #[arg(long)]
    pub holiday: bool,

    /// Treat the day as a non-working day
    #[arg(long)]
    pub non_working: bool,

    /// Treat the day as a weekend
    #[arg(long)]
    pub weekend: bool,

    /// Server-side model path override
    #[arg(long)]
    pub model_path: Option<String>,

    /// Server-side loader strategy override
    #[arg(long)]
    pub loader: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::Config::load()?;

    let api_url = cli
        .api_url
        .or_else(|| settings.api_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let format = cli
        .format
        .or_else(|| settings.output_format())
        .unwrap_or_default();

    // Inspection is local; every other command talks to the API
    let connect = || client::ApiClient::new(&api_url);

    match cli.command {
        Commands::Predict(predict_cmd) => match predict_cmd {
            PredictCommands::Hourly { hour, inputs } => {
                predict::predict_hourly(&connect()?, &inputs, hour, format).await?;
            }
            PredictCommands::Daily { inputs } => {
                predict::predict_daily(&connect()?, &inputs, format).await?;
            }
        },
        Commands::Chat {
            message,
            hint_kind,
            hint_date,
            hint_hour,
        } => {
            let hint = chat::hint_from_flags(hint_kind, hint_date, hint_hour);
            chat::send_message(&connect()?, &message.join(" "), hint, format).await?;
        }
        Commands::Models { kind } => {
            models::show_model(&connect()?, &kind, format).await?;
        }
        Commands::Inspect {
            path,
            loader,
            peak_days,
        } => {
            models::inspect_model(&path, &loader, peak_days, format)?;
        }
        Commands::Health => {
            models::show_health(&connect()?, format).await?;
        }
    }

    Ok(())
}
