//! Left equality join with a deterministic tie-break

use super::engine::SqlEngine;
use crate::error::{Error, Result};
use crate::frame::Frame;
use arrow::array::{ArrayRef, UInt32Array};
use arrow::compute::take;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Description of a left join
///
/// ```ignore
/// let spec = JoinSpec::new()
///     .on("artist", "artist_name")
///     .column("song_id", "song_id")
///     .tie_break("song_id");
/// ```
#[derive(Debug, Clone, Default)]
pub struct JoinSpec {
    /// `(left, right)` key column pairs, compared for equality
    on: Vec<(String, String)>,
    /// `(right source, output alias)` columns carried into the result
    columns: Vec<(String, String)>,
    /// Right columns ordering candidate matches; the smallest wins
    tie_break: Vec<String>,
}

impl JoinSpec {
    /// Create an empty join spec
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition `left.<left> == right.<right>`
    #[must_use]
    pub fn on(mut self, left: &str, right: &str) -> Self {
        self.on.push((left.to_string(), right.to_string()));
        self
    }

    /// Carry a right-hand column into the result under `alias`
    #[must_use]
    pub fn column(mut self, source: &str, alias: &str) -> Self {
        self.columns.push((source.to_string(), alias.to_string()));
        self
    }

    /// Order multiple matches by this right-hand column (ascending, nulls last)
    #[must_use]
    pub fn tie_break(mut self, column: &str) -> Self {
        self.tie_break.push(column.to_string());
        self
    }
}

impl Frame {
    /// Left join against `right`
    ///
    /// Every left row appears exactly once. When several right rows match,
    /// the one ordered first by the tie-break columns is used, then the
    /// earliest in input order. Unmatched rows get nulls in the carried
    /// columns. Null keys never match, on either side.
    pub fn left_join(&self, sql: &SqlEngine, right: &Frame, spec: &JoinSpec) -> Result<Frame> {
        if spec.on.is_empty() {
            return Err(Error::schema("Join requires at least one key column"));
        }

        let left_keys = key_columns(self, spec.on.iter().map(|(l, _)| l.as_str()))?;
        let right_keys = key_columns(right, spec.on.iter().map(|(_, r)| r.as_str()))?;

        for ((left_name, right_name), (l, r)) in
            spec.on.iter().zip(left_keys.iter().zip(&right_keys))
        {
            if l.data_type() != r.data_type() {
                return Err(Error::schema(format!(
                    "Join key type mismatch: {left_name} is {}, {right_name} is {}",
                    l.data_type(),
                    r.data_type()
                )));
            }
        }

        let ties = key_columns(right, spec.tie_break.iter().map(String::as_str))?;
        let indices = if self.is_empty() {
            UInt32Array::from(Vec::<u32>::new())
        } else {
            UInt32Array::from(sql.best_matches(&left_keys, &right_keys, &ties)?)
        };

        let left_schema = self.schema();
        let mut fields: Vec<Field> = left_schema
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        let mut arrays: Vec<ArrayRef> = self.batch().columns().to_vec();

        for (source, alias) in &spec.columns {
            if left_schema.index_of(alias).is_ok() {
                return Err(Error::schema(format!(
                    "Join output column '{alias}' already exists on the left side"
                )));
            }
            let column = right.column(source)?;
            arrays.push(take(column.as_ref(), &indices, None)?);
            fields.push(Field::new(alias, column.data_type().clone(), true));
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(Frame::new(batch))
    }
}

fn key_columns<'a>(
    frame: &Frame,
    names: impl Iterator<Item = &'a str>,
) -> Result<Vec<ArrayRef>> {
    names.map(|name| frame.column(name).cloned()).collect()
}
