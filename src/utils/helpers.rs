/// Helper utilities for the backup CLI

use chrono::{DateTime, Local};

use crate::utils::TIMESTAMP_FORMAT;

/// Format a local time as a bundle timestamp (`YYYYMMDD-HHMMSS`)
pub fn format_backup_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Bundle timestamp for the current local time
pub fn backup_timestamp_now() -> String {
    format_backup_timestamp(Local::now())
}

/// Format bytes to human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Parse a transfer-mode style flag ("True"/"False", "1"/"0", "yes"/"no")
pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Quote a string for a POSIX shell
///
/// A leading `~/` is kept outside the quotes so a remote home-relative path
/// still expands.
pub fn shell_quote(value: &str) -> String {
    match value.strip_prefix("~/") {
        Some("") => "~/".to_string(),
        Some(rest) => format!("~/{}", shell_words::quote(rest)),
        None => shell_words::quote(value).into_owned(),
    }
}
