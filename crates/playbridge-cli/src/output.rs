//! Output formatting for CLI

use serde::Serialize;

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Print `data` as pretty JSON, or hand it to `text` for the text format
pub fn print_output<T: Serialize>(data: &T, format: &str, text: impl FnOnce(&T)) {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Text => text(data),
    }
}
