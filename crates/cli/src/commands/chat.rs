//! Chat CLI command

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, ChatRequest, ChatResponse, IntentHint};
use crate::output::{print_json, OutputFormat};

/// Hint from the `--hint-*` flags; `None` when none were given
pub fn hint_from_flags(
    kind: Option<String>,
    date: Option<String>,
    hour: Option<i64>,
) -> Option<IntentHint> {
    if kind.is_none() && date.is_none() && hour.is_none() {
        return None;
    }
    Some(IntentHint { kind, date, hour })
}

/// Send one message to the assistant
pub async fn send_message(
    client: &ApiClient,
    message: &str,
    hint: Option<IntentHint>,
    format: OutputFormat,
) -> Result<()> {
    let request = ChatRequest {
        message: message.to_string(),
        hint,
    };
    let response: ChatResponse = client.post("api/chat", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            println!("{} {}", "you:".dimmed(), message);
            println!("{} {}", "ridewise:".cyan().bold(), response.reply);
        }
    }

    Ok(())
}
