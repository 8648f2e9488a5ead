use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ifrrpc_channel::CallOutcome;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One line of command output: something a peer sent, or how a call ended.
#[derive(Debug, Serialize)]
pub struct Event<'a> {
    pub event: &'a str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    pub payload: Value,
    pub timestamp: String,
}

impl<'a> Event<'a> {
    pub fn new(event: &'a str, method: &'a str, payload: Value) -> Self {
        Self {
            event,
            method,
            id: None,
            payload,
            timestamp: now_unix_seconds(),
        }
    }

    pub fn outcome(method: &'a str, id: &'a str, outcome: CallOutcome) -> Self {
        let event = outcome.as_str();
        Self {
            event,
            method,
            id: Some(id),
            payload: outcome.into_value().unwrap_or(Value::Null),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_event(event: &Event<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "METHOD", "ID", "PAYLOAD"])
                .add_row(vec![
                    event.event.to_string(),
                    event.method.to_string(),
                    event.id.unwrap_or("-").to_string(),
                    event.payload.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match event.id {
            Some(id) => println!(
                "{} method={} id={} payload={}",
                event.event, event.method, id, event.payload
            ),
            None => println!(
                "{} method={} payload={}",
                event.event, event.method, event.payload
            ),
        },
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
