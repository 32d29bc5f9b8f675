//! Record schemas and JSON to Arrow conversion
//!
//! Declared fields keep their declared type no matter what the data looks
//! like; any other field found in the records is inferred and appended so
//! that nothing raw is lost before exact-row deduplication. Nested arrays
//! and objects are kept as their JSON text.

use crate::error::{Error, Result};
use crate::types::columns;
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Schema of catalog (song) records
pub fn catalog_schema() -> Schema {
    Schema::new(vec![
        Field::new(columns::ARTIST_ID, DataType::Utf8, true),
        Field::new(columns::ARTIST_LATITUDE, DataType::Float64, true),
        Field::new(columns::ARTIST_LOCATION, DataType::Utf8, true),
        Field::new(columns::ARTIST_LONGITUDE, DataType::Float64, true),
        Field::new(columns::ARTIST_NAME, DataType::Utf8, true),
        Field::new(columns::DURATION, DataType::Float64, true),
        Field::new(columns::NUM_SONGS, DataType::Int64, true),
        Field::new(columns::SONG_ID, DataType::Utf8, true),
        Field::new(columns::TITLE, DataType::Utf8, true),
        Field::new(columns::YEAR, DataType::Int64, true),
    ])
}

/// Schema of usage event (log) records
pub fn event_schema() -> Schema {
    Schema::new(vec![
        Field::new(columns::ARTIST, DataType::Utf8, true),
        Field::new(columns::AUTH, DataType::Utf8, true),
        Field::new(columns::FIRST_NAME_RAW, DataType::Utf8, true),
        Field::new(columns::GENDER, DataType::Utf8, true),
        Field::new(columns::ITEM_IN_SESSION, DataType::Int64, true),
        Field::new(columns::LAST_NAME_RAW, DataType::Utf8, true),
        Field::new(columns::LENGTH, DataType::Float64, true),
        Field::new(columns::LEVEL, DataType::Utf8, true),
        Field::new(columns::LOCATION, DataType::Utf8, true),
        Field::new(columns::METHOD, DataType::Utf8, true),
        Field::new(columns::PAGE, DataType::Utf8, true),
        Field::new(columns::REGISTRATION, DataType::Float64, true),
        Field::new(columns::SESSION_ID_RAW, DataType::Int64, true),
        Field::new(columns::SONG, DataType::Utf8, true),
        Field::new(columns::STATUS, DataType::Int64, true),
        Field::new(columns::TS, DataType::Int64, true),
        Field::new(columns::USER_AGENT_RAW, DataType::Utf8, true),
        Field::new(columns::USER_ID_RAW, DataType::Int64, true),
    ])
}

/// Infer an Arrow schema from a set of JSON records
///
/// Fields come back sorted by name and typed as the narrowest of boolean,
/// integer, float or string that holds every value seen.
pub fn infer_schema(records: &[Value]) -> Schema {
    let mut seen: BTreeMap<&str, Option<DataType>> = BTreeMap::new();

    for (key, value) in records.iter().filter_map(Value::as_object).flatten() {
        let slot = seen.entry(key.as_str()).or_default();
        *slot = widen(slot.take(), scalar_type(value));
    }

    Schema::new(
        seen.into_iter()
            .map(|(name, data_type)| Field::new(name, data_type.unwrap_or(DataType::Utf8), true))
            .collect::<Vec<_>>(),
    )
}

/// Declared schema followed by every other inferred field
pub fn resolve_schema(declared: &Schema, records: &[Value]) -> Schema {
    let inferred = infer_schema(records);
    let extras = inferred
        .fields()
        .iter()
        .filter(|field| declared.field_with_name(field.name()).is_err())
        .cloned();

    let fields: Vec<_> = declared.fields().iter().cloned().chain(extras).collect();
    Schema::new(fields)
}

/// Convert JSON records to an Arrow RecordBatch with the given schema
///
/// Missing fields become nulls. Values are coerced to the column type where
/// it is unambiguous (numeric strings to numbers, scalars to strings);
/// anything else becomes null.
pub fn json_to_arrow(records: &[Value], schema: &Schema) -> Result<RecordBatch> {
    let schema = Arc::new(schema.clone());
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let values = records.iter().map(|record| record.get(field.name()));
            column_from_values(values, field.data_type())
        })
        .collect::<Result<Vec<_>>>()?;

    if columns.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    RecordBatch::try_new(schema, columns)
        .map_err(|e| Error::schema(format!("Failed to create RecordBatch: {e}")))
}

/// Column type a single value asks for; `None` for null
fn scalar_type(value: &Value) -> Option<DataType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(DataType::Boolean),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(DataType::Int64),
        Value::Number(_) => Some(DataType::Float64),
        Value::String(_) | Value::Array(_) | Value::Object(_) => Some(DataType::Utf8),
    }
}

/// Smallest type holding values of both `current` and `next`
fn widen(current: Option<DataType>, next: Option<DataType>) -> Option<DataType> {
    match (current, next) {
        (None, t) | (t, None) => t,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(DataType::Int64 | DataType::Float64), Some(DataType::Int64 | DataType::Float64)) => {
            Some(DataType::Float64)
        }
        _ => Some(DataType::Utf8),
    }
}

#[allow(clippy::cast_precision_loss)]
fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn column_from_values<'a>(
    values: impl Iterator<Item = Option<&'a Value>>,
    data_type: &DataType,
) -> Result<ArrayRef> {
    let column: ArrayRef = match data_type {
        DataType::Boolean => Arc::new(
            values
                .map(|v| v.and_then(value_as_bool))
                .collect::<BooleanArray>(),
        ),
        DataType::Int64 => Arc::new(
            values
                .map(|v| v.and_then(value_as_i64))
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            values
                .map(|v| v.and_then(value_as_f64))
                .collect::<Float64Array>(),
        ),
        DataType::Utf8 => Arc::new(
            values
                .map(|v| v.and_then(value_as_string))
                .collect::<StringArray>(),
        ),
        other => {
            return Err(Error::schema(format!(
                "Unsupported column type for JSON input: {other}"
            )))
        }
    };
    Ok(column)
}
