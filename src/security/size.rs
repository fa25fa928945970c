//! Human-readable byte sizes.

use thiserror::Error;

/// Default request body ceiling: 10 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Format `bytes` using the largest unit that keeps the value >= 1.
///
/// The value is `round(bytes / 1024^i)` with `i = floor(log1024(bytes))`,
/// so 1536 formats as "2 KB" and 0 as "0 Bytes".
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    let mut divisor: u64 = 1;
    while exponent + 1 < UNITS.len() && bytes / divisor >= 1024 {
        divisor *= 1024;
        exponent += 1;
    }

    let value = (bytes as f64 / divisor as f64).round();
    format!("{} {}", value as u64, UNITS[exponent])
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeParseError {
    #[error("empty size")]
    Empty,
    #[error("'{0}' is not a number")]
    InvalidNumber(String),
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
    #[error("size does not fit in memory")]
    Overflow,
}

/// Parse sizes such as "10mb", "512 KB", "1.5gb" or a plain byte count.
///
/// Units are binary multiples and case-insensitive.
pub fn parse_size(input: &str) -> Result<usize, SizeParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SizeParseError::Empty);
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" => 1 << 10,
        "mb" => 1 << 20,
        "gb" => 1 << 30,
        "tb" => 1 << 40,
        other => return Err(SizeParseError::UnknownUnit(other.to_string())),
    };

    let bytes = if number.contains('.') {
        let value: f64 = number
            .parse()
            .map_err(|_| SizeParseError::InvalidNumber(number.to_string()))?;
        let scaled = (value * multiplier as f64).floor();
        if !scaled.is_finite() || scaled >= u64::MAX as f64 {
            return Err(SizeParseError::Overflow);
        }
        scaled as u64
    } else {
        let value: u64 = number
            .parse()
            .map_err(|_| SizeParseError::InvalidNumber(number.to_string()))?;
        value.checked_mul(multiplier).ok_or(SizeParseError::Overflow)?
    };

    usize::try_from(bytes).map_err(|_| SizeParseError::Overflow)
}
