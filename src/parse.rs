//! Parsing utilities for human-readable configuration values
//!
//! Unlike a silent fallback, these return `None` on garbage so the config
//! loader can refuse to start with a misspelled value.

use std::time::Duration;

/// Parse human-readable size string (e.g., "10MB", "1GB", "512KB")
///
/// # Supported formats
/// - `"1GB"` - gigabytes
/// - `"10MB"` - megabytes
/// - `"512KB"` - kilobytes
/// - `"1024B"` or `"1024"` - bytes
pub fn parse_size(s: &str) -> Option<usize> {
    let s = s.trim().to_uppercase();
    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1)
    } else {
        (s.as_str(), 1)
    };

    num_str
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
}

/// Parse duration string (e.g., "30s", "5m", "24h", "100ms", "7d")
///
/// # Supported formats
/// - `"7d"` - days
/// - `"24h"` - hours
/// - `"5m"` - minutes
/// - `"30s"` or `"30"` - seconds
/// - `"100ms"` - milliseconds
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim().to_lowercase();
    let (num_str, multiplier): (&str, u64) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60 * 1000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60 * 1000)
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 24 * 60 * 60 * 1000)
    } else {
        (s.as_str(), 1000)
    };

    num_str
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .map(Duration::from_millis)
}

/// Parse a boolean flag the way env vars are usually written.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
