//! Frame: an immutable Arrow table with relational operators
//!
//! Every operator returns a new frame; the input is never modified.

use super::engine::SqlEngine;
use crate::error::{Error, Result};
use arrow::array::{Array, ArrayRef, StringArray, UInt32Array};
use arrow::compute::kernels::cmp::eq;
use arrow::compute::{filter_record_batch, take_record_batch};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// An in-memory table
#[derive(Debug, Clone)]
pub struct Frame {
    batch: RecordBatch,
}

impl Frame {
    /// Wrap a record batch
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Check if the frame has no rows
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// Schema of the frame
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Underlying record batch
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Column by name
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| Error::column_not_found(name))
    }

    /// Keep the named columns, in the given order
    pub fn select(&self, columns: &[&str]) -> Result<Frame> {
        let aliased: Vec<(&str, &str)> = columns.iter().map(|c| (*c, *c)).collect();
        self.select_as(&aliased)
    }

    /// Keep `(source, alias)` columns, renaming each source to its alias
    pub fn select_as(&self, columns: &[(&str, &str)]) -> Result<Frame> {
        let schema = self.batch.schema();
        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());

        for (source, alias) in columns {
            let index = schema
                .index_of(source)
                .map_err(|_| Error::column_not_found(*source))?;
            let field = schema.field(index);
            fields.push(Field::new(*alias, field.data_type().clone(), field.is_nullable()));
            arrays.push(Arc::clone(self.batch.column(index)));
        }

        self.rebuild(fields, arrays)
    }

    /// Append a column, or replace the column of the same name
    pub fn with_column(&self, name: &str, array: ArrayRef) -> Result<Frame> {
        if array.len() != self.num_rows() {
            return Err(Error::schema(format!(
                "Column '{name}' has {} rows, frame has {}",
                array.len(),
                self.num_rows()
            )));
        }

        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut arrays: Vec<ArrayRef> = self.batch.columns().to_vec();
        let field = Field::new(name, array.data_type().clone(), true);

        match schema.index_of(name) {
            Ok(index) => {
                fields[index] = field;
                arrays[index] = array;
            }
            Err(_) => {
                fields.push(field);
                arrays.push(array);
            }
        }

        self.rebuild(fields, arrays)
    }

    /// Keep rows whose string column equals `value`
    ///
    /// Rows where the column is null are dropped.
    pub fn filter_eq(&self, column: &str, value: &str) -> Result<Frame> {
        let array = self.column(column)?;
        let mask = eq(array, &StringArray::new_scalar(value))?;
        Ok(Self::new(filter_record_batch(&self.batch, &mask)?))
    }

    /// Remove duplicate rows, comparing every column
    ///
    /// The first occurrence of each distinct row is kept and input order is
    /// preserved, so the result is reproducible for a given input order.
    /// Nulls compare equal to each other here.
    pub fn distinct(&self, sql: &SqlEngine) -> Result<Frame> {
        if self.batch.num_columns() == 0 || self.num_rows() < 2 {
            return Ok(self.clone());
        }

        let keep = sql.first_occurrences(self.batch.columns())?;
        if keep.len() == self.num_rows() {
            return Ok(self.clone());
        }
        self.take(&UInt32Array::from(keep))
    }

    /// Rows selected by position; a null index yields an all-null row
    pub fn take(&self, indices: &UInt32Array) -> Result<Frame> {
        Ok(Self::new(take_record_batch(&self.batch, indices)?))
    }

    fn rebuild(&self, fields: Vec<Field>, arrays: Vec<ArrayRef>) -> Result<Frame> {
        let schema = Arc::new(Schema::new(fields));
        let batch = if arrays.is_empty() {
            RecordBatch::try_new_with_options(
                schema,
                arrays,
                &arrow::record_batch::RecordBatchOptions::new()
                    .with_row_count(Some(self.num_rows())),
            )?
        } else {
            RecordBatch::try_new(schema, arrays)?
        };
        Ok(Self::new(batch))
    }
}
