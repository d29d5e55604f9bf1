use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Format a decimal amount with thousand separators and 2 decimal places.
/// e.g. `1234567.89` → `"$1,234,567.89"`
pub(crate) fn format_amount(val: Decimal) -> String {
    let abs = val.abs();
    let formatted = format!("{abs:.2}");
    let mut parts = formatted.split('.');
    let int_part = parts.next().unwrap_or("0");
    let dec_part = parts.next().unwrap_or("00");

    let with_commas: String = int_part
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(",");

    if val < Decimal::ZERO {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

pub(crate) fn format_percent(val: Decimal) -> String {
    format!("{val:.1}%")
}

/// Truncate a string to `max` visible characters, appending "…" if truncated.
/// Safe for multi-byte UTF-8 characters.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let char_count = s.chars().count();
    if char_count <= max {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{truncated}…")
}

/// Parse a user-typed amount, tolerating `$` and thousands separators.
pub(crate) fn parse_amount(s: &str) -> Result<Decimal> {
    let cleaned = s.replace(['$', ','], "").trim().to_string();
    if cleaned.is_empty() {
        anyhow::bail!("Amount is required");
    }
    Decimal::from_str(&cleaned).with_context(|| format!("Failed to parse '{s}' as an amount"))
}

pub(crate) fn parse_id(s: &str, what: &str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .with_context(|| format!("Invalid {what} id: '{s}'"))
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod format_tests;
