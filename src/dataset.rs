// src/dataset.rs
//! JSON codec for tabular payloads.
//!
//! Decoding accepts row-oriented records (`[{"col": v}, ...]`) and
//! column-oriented tables keyed by row index (`{"col": {"0": v}}`). Encoding
//! always produces records.
use crate::error::DatasetError;
use crate::strata::Record;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse a serialized dataset.
pub fn decode(payload: &str) -> Result<Vec<Record>, DatasetError> {
    let parsed: Value = serde_json::from_str(payload)?;
    decode_value(parsed)
}

/// Interpret an already-parsed JSON value as a dataset.
pub fn decode_value(parsed: Value) -> Result<Vec<Record>, DatasetError> {
    let rows = match parsed {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(DatasetError::Shape(format!(
                    "record {} is a {}, expected an object",
                    i,
                    kind(&other)
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Value::Object(columns) => from_columns(columns)?,
        other => {
            return Err(DatasetError::Shape(format!(
                "expected an array of records or an object of columns, found a {}",
                kind(&other)
            )))
        }
    };
    debug!(rows = rows.len(), "decoded dataset");
    Ok(rows)
}

/// Pivot `{"col": {"idx": v}}` into records; cells absent for a row become null.
fn from_columns(columns: Map<String, Value>) -> Result<Vec<Record>, DatasetError> {
    let mut index: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut cells: Vec<(String, Map<String, Value>)> = Vec::with_capacity(columns.len());

    for (name, column) in columns {
        let by_row = match column {
            Value::Object(by_row) => by_row,
            other => {
                return Err(DatasetError::Shape(format!(
                    "column '{}' is a {}, expected an object keyed by row index",
                    name,
                    kind(&other)
                )))
            }
        };
        for key in by_row.keys() {
            if seen.insert(key.clone()) {
                index.push(key.clone());
            }
        }
        cells.push((name, by_row));
    }

    let rows = index
        .iter()
        .map(|idx| {
            cells
                .iter()
                .map(|(name, by_row)| (name.clone(), by_row.get(idx).cloned().unwrap_or(Value::Null)))
                .collect::<Record>()
        })
        .collect();
    Ok(rows)
}

/// Serialize records as a row-oriented JSON string.
pub fn encode(rows: &[Record]) -> Result<String, DatasetError> {
    Ok(serde_json::to_string(rows)?)
}
