use foundation::time::{Timestamp, parse_timestamp, timestamp_from_epoch_millis};
use serde_json::{Map, Value};

/// One result row.
pub type Record = Map<String, Value>;

/// Text form of a scalar cell; numbers and booleans are stringified.
pub fn record_str(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric cell, coercing numeric strings. Non-finite and non-numeric cells are `None`.
pub fn record_f64(record: &Record, key: &str) -> Option<f64> {
    value_f64(record.get(key)?)
}

pub fn value_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Timestamp cell: date strings or epoch milliseconds.
pub fn value_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => timestamp_from_epoch_millis(n.as_i64()?),
        _ => None,
    }
}

pub fn record_timestamp(record: &Record, key: &str) -> Option<Timestamp> {
    value_timestamp(record.get(key)?)
}

/// Objects nested under `entries_column`, or the row itself when that
/// column is not an array.
pub fn row_entries(row: &Record, entries_column: &str) -> Vec<Record> {
    match row.get(entries_column) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_object().cloned())
            .collect(),
        _ => vec![row.clone()],
    }
}
