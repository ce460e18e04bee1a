//! Output formatters for merged events
//!
//! Supports text and JSON output formats.

use std::path::Path;

use event_engine::LogFileSpec;
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format '{}'. Use 'text' or 'json'", s)),
        }
    }
}

/// Format one merged event; JSON output is one object per line
pub fn format_event(file: &Path, line: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => line.to_string(),
        OutputFormat::Json => format_event_json(file, line),
    }
}

fn format_event_json(file: &Path, line: &str) -> String {
    #[derive(Serialize)]
    struct JsonEvent<'a> {
        file: &'a Path,
        event: &'a str,
    }

    serde_json::to_string(&JsonEvent { file, event: line }).unwrap_or_else(|_| "{}".to_string())
}

/// Format the log files a collection gathered
pub fn format_log_files(specs: &[LogFileSpec], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_log_files_text(specs),
        OutputFormat::Json => format_log_files_json(specs),
    }
}

fn format_log_files_text(specs: &[LogFileSpec]) -> String {
    let mut output = String::new();
    output.push_str(&format!("Log files ({}):\n", specs.len()));
    for spec in specs {
        output.push_str(&format!("  {} [{}] {}\n", spec.name, spec.format, spec.path.display()));
    }
    output
}

fn format_log_files_json(specs: &[LogFileSpec]) -> String {
    #[derive(Serialize)]
    struct JsonLogFiles<'a> {
        count: usize,
        files: &'a [LogFileSpec],
    }

    serde_json::to_string(&JsonLogFiles {
        count: specs.len(),
        files: specs,
    })
    .unwrap_or_else(|_| "{}".to_string())
}
