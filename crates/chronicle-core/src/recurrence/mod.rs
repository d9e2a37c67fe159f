//! Recurrence patterns and occurrence expansion.
//!
//! Patterns are `KEY=VALUE` pairs separated by `;`, e.g.
//! `FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE,FR`. Only `FREQ` and `INTERVAL` drive
//! expansion; other keys are kept as raw values for callers that want them.
//!
//! Expansion walks a cursor from `max(event.start, window_start)` to
//! `min(event.end, window_end)` inclusive, so the event's own end bounds the
//! series.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Event, EventId};

/// A pattern value: single token or comma-separated list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternValue {
    Single(String),
    List(Vec<String>),
}

impl PatternValue {
    fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::List(_) => None,
        }
    }
}

/// How far the cursor moves per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Parsed recurrence pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    parts: BTreeMap<String, PatternValue>,
}

impl RecurrencePattern {
    /// Parse a pattern string. Parts without `=` are skipped.
    pub fn parse(raw: &str) -> Self {
        let parts = raw
            .split(';')
            .filter_map(|part| part.split_once('='))
            .map(|(key, value)| {
                let value = if value.contains(',') {
                    PatternValue::List(value.split(',').map(str::to_string).collect())
                } else {
                    PatternValue::Single(value.to_string())
                };
                (key.trim().to_string(), value)
            })
            .collect();
        Self { parts }
    }

    /// Raw value for any key, including ones expansion ignores.
    pub fn get(&self, key: &str) -> Option<&PatternValue> {
        self.parts.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The `FREQ` value; missing or unknown values are errors.
    pub fn frequency(&self) -> Result<Frequency> {
        let raw = self
            .get("FREQ")
            .ok_or_else(|| Error::InvalidRecurrence("FREQ is required".to_string()))?;
        match raw.as_single().map(str::trim) {
            Some("DAILY") => Ok(Frequency::Daily),
            Some("WEEKLY") => Ok(Frequency::Weekly),
            Some("MONTHLY") => Ok(Frequency::Monthly),
            Some("YEARLY") => Ok(Frequency::Yearly),
            _ => Err(Error::InvalidRecurrence(format!(
                "unsupported FREQ {raw:?}"
            ))),
        }
    }

    /// The `INTERVAL` value, defaulting to 1. Must be a positive integer.
    pub fn interval(&self) -> Result<u32> {
        let Some(raw) = self.get("INTERVAL") else {
            return Ok(1);
        };
        raw.as_single()
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|interval| *interval > 0)
            .ok_or_else(|| {
                Error::InvalidRecurrence(format!("INTERVAL must be a positive integer, got {raw:?}"))
            })
    }
}

/// One concrete instance of a recurring event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Event the occurrence was expanded from
    pub event_id: EventId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Expand `event` into occurrences whose start lies in the inclusive window.
///
/// Returns an empty list for non-recurring events or events without a
/// pattern.
pub fn expand(
    event: &Event,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<Occurrence>> {
    let Some(raw) = event.recurrence_pattern.as_deref() else {
        return Ok(Vec::new());
    };
    if !event.is_recurring {
        return Ok(Vec::new());
    }

    let pattern = RecurrencePattern::parse(raw);
    if pattern.is_empty() {
        return Ok(Vec::new());
    }
    let frequency = pattern.frequency()?;
    let interval = pattern.interval()?;

    let duration = event.end_time - event.start_time;
    let end = event.end_time.min(window_end);
    let mut cursor = event.start_time.max(window_start);
    let mut occurrences = Vec::new();

    while cursor <= end {
        occurrences.push(Occurrence {
            event_id: event.id,
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time: cursor,
            end_time: cursor + duration,
        });
        cursor = advance(cursor, frequency, interval)?;
    }

    Ok(occurrences)
}

fn advance(cursor: DateTime<Utc>, frequency: Frequency, interval: u32) -> Result<DateTime<Utc>> {
    match frequency {
        Frequency::Daily => Ok(cursor + Duration::days(i64::from(interval))),
        Frequency::Weekly => Ok(cursor + Duration::weeks(i64::from(interval))),
        Frequency::Monthly => {
            let month_index = i64::from(cursor.month0()) + i64::from(interval);
            let year = i64::from(cursor.year()) + month_index / 12;
            let month = month_index % 12 + 1;
            with_date(cursor, year, month)
        }
        Frequency::Yearly => {
            let year = i64::from(cursor.year()) + i64::from(interval);
            with_date(cursor, year, i64::from(cursor.month()))
        }
    }
}

/// Move `cursor` to `year`/`month`, keeping the time of day and clamping the
/// day to the month's length.
fn with_date(cursor: DateTime<Utc>, year: i64, month: i64) -> Result<DateTime<Utc>> {
    let out_of_range = || Error::InvalidRecurrence(format!("date {year}-{month} is out of range"));
    let year = i32::try_from(year).map_err(|_| out_of_range())?;
    let month = u32::try_from(month).map_err(|_| out_of_range())?;

    let date = (1..=cursor.day())
        .rev()
        .find_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .ok_or_else(out_of_range)?;
    Ok(date.and_time(cursor.time()).and_utc())
}
