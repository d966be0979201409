// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human sync frequencies to cron expressions.
//!
//! Accepted forms:
//!
//! - a five-field cron expression (`*/15 * * * *`)
//! - a macro: `@hourly`, `@daily`, `@weekly`, `@monthly`, `@yearly`
//! - a shorthand `N-minutes`, `N-hours`, `N-days` or `N-weeks`

use croner::Cron;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrequencyError {
    #[error("empty frequency")]
    Empty,
    #[error("invalid frequency '{0}': interval must be a positive integer")]
    InvalidInterval(String),
    #[error("invalid frequency '{0}': unknown unit")]
    UnknownUnit(String),
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
}

/// Convert a frequency string into a validated cron expression.
pub fn to_cron(frequency: &str) -> Result<String, FrequencyError> {
    let frequency = frequency.trim();
    if frequency.is_empty() {
        return Err(FrequencyError::Empty);
    }

    let expr = match frequency {
        "@hourly" => "0 * * * *".to_string(),
        "@daily" | "@midnight" => "0 0 * * *".to_string(),
        "@weekly" => "0 0 * * 0".to_string(),
        "@monthly" => "0 0 1 * *".to_string(),
        "@yearly" | "@annually" => "0 0 1 1 *".to_string(),
        f if f.split_whitespace().count() > 1 => f.split_whitespace().collect::<Vec<_>>().join(" "),
        f => shorthand_to_cron(f)?,
    };

    parse_cron(&expr)?;
    Ok(expr)
}

/// Parse a cron expression, mapping the parser error into ours.
pub fn parse_cron(expr: &str) -> Result<Cron, FrequencyError> {
    if expr.split_whitespace().count() != 5 {
        return Err(FrequencyError::InvalidCron {
            expr: expr.to_string(),
            reason: "expected 5 fields".to_string(),
        });
    }
    Cron::new(expr)
        .parse()
        .map_err(|e| FrequencyError::InvalidCron { expr: expr.to_string(), reason: e.to_string() })
}

fn shorthand_to_cron(frequency: &str) -> Result<String, FrequencyError> {
    let (count, unit) = frequency
        .split_once('-')
        .ok_or_else(|| FrequencyError::UnknownUnit(frequency.to_string()))?;
    let n: u32 = count
        .parse()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| FrequencyError::InvalidInterval(frequency.to_string()))?;

    let expr = match (unit.trim_end_matches('s'), n) {
        ("minute", 1) => "* * * * *".to_string(),
        ("minute", n) if n < 60 => format!("*/{} * * * *", n),
        ("hour", 1) => "0 * * * *".to_string(),
        ("hour", n) if n < 24 => format!("0 */{} * * *", n),
        ("day", 1) => "0 0 * * *".to_string(),
        ("day", n) if n < 31 => format!("0 0 */{} * *", n),
        ("week", 1) => "0 0 * * 0".to_string(),
        ("minute", _) | ("hour", _) | ("day", _) | ("week", _) => {
            return Err(FrequencyError::InvalidInterval(frequency.to_string()))
        }
        _ => return Err(FrequencyError::UnknownUnit(frequency.to_string())),
    };
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        cron       = { "*/15 * * * *", "*/15 * * * *" },
        spaced     = { "  0   2 * * 1 ", "0 2 * * 1" },
        hourly     = { "@hourly", "0 * * * *" },
        daily      = { "@daily", "0 0 * * *" },
        weekly     = { "@weekly", "0 0 * * 0" },
        minutes    = { "5-minutes", "*/5 * * * *" },
        one_minute = { "1-minute", "* * * * *" },
        hours      = { "6-hours", "0 */6 * * *" },
        days       = { "2-days", "0 0 */2 * *" },
        week       = { "1-weeks", "0 0 * * 0" },
    )]
    fn converts(input: &str, expected: &str) {
        assert_eq!(to_cron(input).unwrap(), expected);
    }

    #[yare::parameterized(
        empty         = { "" },
        zero          = { "0-minutes" },
        too_many_mins = { "90-minutes" },
        many_weeks    = { "3-weeks" },
        unknown_unit  = { "5-fortnights" },
        no_unit       = { "15" },
        bad_cron      = { "61 * * * *" },
        six_fields    = { "0 0 * * * *" },
    )]
    fn rejects(input: &str) {
        assert!(to_cron(input).is_err(), "{input} should be rejected");
    }
}
