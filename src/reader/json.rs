//! JSON record reader
//!
//! Loads every `.json` file below a location into one Arrow table.

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::reader::schema::{json_to_arrow, resolve_schema};
use crate::storage::StorageLocation;
use arrow::datatypes::Schema;
use serde_json::Value;
use tracing::{debug, info};

const JSON_EXTENSION: &str = "json";

/// Parse the contents of one file into records
///
/// Accepts a single object, whitespace/newline separated objects, or arrays
/// of objects (flattened). Non-object values are rejected.
pub fn parse_json_records(data: &[u8], source: &str) -> Result<Vec<Value>> {
    let mut records = Vec::new();

    for value in serde_json::Deserializer::from_slice(data).into_iter::<Value>() {
        let value = value.map_err(|e| Error::input(source, format!("malformed JSON: {e}")))?;
        match value {
            Value::Object(_) => records.push(value),
            Value::Array(items) => {
                for item in items {
                    if !item.is_object() {
                        return Err(Error::input(source, "array element is not an object"));
                    }
                    records.push(item);
                }
            }
            other => {
                return Err(Error::input(
                    source,
                    format!("expected a JSON object, found {other}"),
                ))
            }
        }
    }

    Ok(records)
}

/// Read all JSON records below a location
pub async fn read_json_records(location: &StorageLocation) -> Result<Vec<Value>> {
    let files = location.list_files(JSON_EXTENSION).await?;
    if files.is_empty() {
        return Err(Error::NoInputFiles {
            location: location.url().to_string(),
        });
    }

    let mut records = Vec::new();
    for file in &files {
        let data = location.read(file).await?;
        let parsed = parse_json_records(&data, &location.display_path(file))?;
        debug!("Read {} records from {file}", parsed.len());
        records.extend(parsed);
    }

    info!(
        "Read {} records from {} files under {}",
        records.len(),
        files.len(),
        location.url()
    );
    Ok(records)
}

/// Read a location into a table with the declared schema
///
/// Declared columns come first with their declared types; any other field
/// seen in the data follows, inferred.
pub async fn read_json_table(location: &StorageLocation, declared: &Schema) -> Result<Frame> {
    let records = read_json_records(location).await?;
    records_to_frame(&records, declared)
}

/// Convert already parsed records into a table
pub fn records_to_frame(records: &[Value], declared: &Schema) -> Result<Frame> {
    let schema = resolve_schema(declared, records);
    let batch = json_to_arrow(records, &schema)?;
    Ok(Frame::new(batch))
}
