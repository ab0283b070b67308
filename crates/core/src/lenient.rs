//! Tolerant field decoding for the stored board document.
//!
//! The board file is shared with other writers. A field of the wrong shape
//! falls back to a default, and a malformed list entry is dropped, so one bad
//! value never costs the rest of the document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;
use crate::mission::ExecutionStatus;
use crate::Time;

/// Any shape; falls back to `T::default()` when the value does not fit.
pub(crate) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(&value).unwrap_or_else(|e| {
        warn!("Ignoring malformed value {}: {}", value, e);
        T::default()
    }))
}

/// A list whose malformed entries are dropped one by one.
pub(crate) fn skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values = match Value::deserialize(deserializer)? {
        Value::Array(values) => values,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!("Expected a list, ignoring {}", other);
            return Ok(Vec::new());
        }
    };
    Ok(values
        .iter()
        .filter_map(|value| match T::deserialize(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Dropping malformed entry {}: {}", value, e);
                None
            }
        })
        .collect())
}

/// Text; numbers and booleans are kept in their printed form.
pub(crate) fn text<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<String> + Default,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => T::from(s),
        Value::Number(n) => T::from(n.to_string()),
        Value::Bool(b) => T::from(b.to_string()),
        Value::Null => T::default(),
        other => {
            warn!("Expected text, ignoring {}", other);
            T::default()
        }
    })
}

/// Risk level from a number or numeric string, clamped to 0..=2.
pub(crate) fn risk_level<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let level = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    match level {
        Some(level) if level.is_finite() => Ok(level.clamp(0.0, 2.0) as u8),
        _ => {
            if !value.is_null() {
                warn!("Ignoring malformed risk level {}", value);
            }
            Ok(0)
        }
    }
}

/// Execution status through the forgiving parser; unknown names become pending.
pub(crate) fn status<'de, D>(deserializer: D) -> Result<ExecutionStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value.as_str().map(str::parse::<ExecutionStatus>) {
        Some(Ok(status)) => status,
        _ => {
            if !value.is_null() {
                warn!("Unknown execution status {}, treating as pending", value);
            }
            ExecutionStatus::default()
        }
    })
}

/// Evidence list; a lone string counts as one entry and non-text entries
/// are kept in their printed form.
pub(crate) fn strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entry = |value: Value| match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    };
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values.into_iter().filter_map(entry).collect(),
        Value::String(s) => vec![s],
        Value::Null => Vec::new(),
        other => {
            warn!("Expected a list of strings, ignoring {}", other);
            Vec::new()
        }
    })
}

/// Creation time; unreadable values fall back to now.
pub(crate) fn time_or_now<'de, D>(deserializer: D) -> Result<Time, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Time::deserialize(&value).unwrap_or_else(|_| {
        warn!("Ignoring malformed timestamp {}", value);
        chrono::Utc::now()
    }))
}
