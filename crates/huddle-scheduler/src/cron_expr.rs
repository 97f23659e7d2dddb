//! Five-field cron expressions.
//!
//! Expressions use the classic crontab layout (minute, hour, day of month,
//! month, day of week) with Sunday as 0 or 7. They are evaluated with the
//! `cron` crate, which expects a leading seconds field and numbers weekdays
//! from 1 = Sunday, so numeric weekdays are rewritten to names first.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Timelike};
use cron::Schedule;
use thiserror::Error;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Errors from parsing a cron expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },
}

impl CronError {
    fn invalid(expr: &str, reason: impl Into<String>) -> Self {
        CronError::InvalidExpression {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

/// A parsed five-field cron expression.
#[derive(Debug, Clone)]
pub struct CronExpr {
    source: String,
    schedule: Schedule,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::invalid(
                expr,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }

        let day_of_week =
            translate_day_of_week(fields[4]).map_err(|reason| CronError::invalid(expr, reason))?;
        let normalized = format!(
            "0 {} {} {} {} {}",
            fields[0], fields[1], fields[2], fields[3], day_of_week
        );

        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| CronError::invalid(expr, e.to_string()))?;

        Ok(Self {
            source: expr.trim().to_string(),
            schedule,
        })
    }

    /// Whether the expression matches the minute containing `instant`.
    pub fn is_due<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> bool {
        self.schedule.includes(truncate_to_minute(instant.clone()))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for CronExpr {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Whether `expr` is due at the minute containing `instant`.
pub fn is_due<Tz: TimeZone>(expr: &str, instant: &DateTime<Tz>) -> Result<bool, CronError> {
    Ok(CronExpr::parse(expr)?.is_due(instant))
}

/// Whether `expr` is a valid five-field cron expression.
pub fn is_valid(expr: &str) -> bool {
    CronExpr::parse(expr).is_ok()
}

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute<Tz: TimeZone>(instant: DateTime<Tz>) -> DateTime<Tz> {
    instant
        .with_second(0)
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(instant)
}

/// Rewrite weekday items (0-7 with Sunday = 0 or 7, or three-letter names,
/// freely mixed) as a list of day names.
fn translate_day_of_week(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = BTreeSet::new();

    for item in field.split(',') {
        if item.is_empty() {
            return Err("empty day-of-week item".to_string());
        }

        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step '{}'", step))?;
                if step == 0 {
                    return Err("step must be positive".to_string());
                }
                (range, Some(step))
            }
            None => (item, None),
        };

        let (start, end) = match range.split_once('-') {
            _ if range == "*" => (0, 6),
            Some((start, end)) => (parse_day(start)?, parse_day(end)?),
            None => {
                let day = parse_day(range)?;
                // "n/step" runs from n to the end of the week
                (day, if step.is_some() { 6.max(day) } else { day })
            }
        };
        if start > end {
            return Err(format!("invalid day-of-week range '{}'", range));
        }

        let step = step.unwrap_or(1) as usize;
        for day in (start..=end).step_by(step) {
            days.insert(day % 7);
        }
    }

    let names: Vec<&str> = days.into_iter().map(|d| DAY_NAMES[d as usize]).collect();
    Ok(names.join(","))
}

fn parse_day(s: &str) -> Result<u32, String> {
    if let Some(day) = DAY_NAMES.iter().position(|name| name.eq_ignore_ascii_case(s)) {
        return Ok(day as u32);
    }
    match s.parse::<u32>() {
        Ok(day) if day <= 7 => Ok(day),
        _ => Err(format!("invalid day of week '{}'", s)),
    }
}
