//! DuckDB-backed relational engine
//!
//! Frames are loaded into an in-memory DuckDB database and the engine
//! answers with row positions; the frames themselves are reshaped with
//! Arrow kernels so column types never round-trip through SQL.

use crate::error::{Error, Result};
use arrow::array::{ArrayRef, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use duckdb::Connection;
use std::fmt;
use std::sync::Arc;

/// Hidden column carrying each row's input position
const ROW_COLUMN: &str = "__row";

/// Rows per appended chunk; DuckDB data chunks hold at most 2048 rows
const CHUNK_ROWS: usize = 2048;

/// In-memory SQL engine used for distinct and join
pub struct SqlEngine {
    conn: Connection,
}

impl fmt::Debug for SqlEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlEngine").finish_non_exhaustive()
    }
}

impl SqlEngine {
    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::engine(format!("Failed to create DuckDB connection: {e}")))?;
        Ok(Self { conn })
    }

    /// Position of the first row of every distinct combination of `columns`
    ///
    /// Positions come back in input order. `GROUP BY` puts nulls in one
    /// group, so null values compare equal here.
    pub fn first_occurrences(&self, columns: &[ArrayRef]) -> Result<Vec<u32>> {
        let keys: Vec<String> = (0..columns.len()).map(|i| format!("c{i}")).collect();
        self.load("__distinct", keys.iter().map(String::as_str).zip(columns))?;

        let sql = format!(
            "SELECT min({row}) AS first FROM \"__distinct\" GROUP BY {keys} ORDER BY first",
            row = quote(ROW_COLUMN),
            keys = quoted_list(&keys),
        );
        let positions = self.positions(&sql, |row| row.get::<_, i64>(0))?;
        self.drop_table("__distinct")?;

        positions.into_iter().map(to_position).collect()
    }

    /// For every left row, the position of its best matching right row
    ///
    /// Rows match when every key pair is equal; a null key never matches.
    /// Among several matches the smallest by `tie_break` (ascending, nulls
    /// last) wins, then the earliest in input order.
    pub fn best_matches(
        &self,
        left_keys: &[ArrayRef],
        right_keys: &[ArrayRef],
        tie_break: &[ArrayRef],
    ) -> Result<Vec<Option<u32>>> {
        let left_rows = left_keys.first().map_or(0, |a| a.len());
        let mut matches = vec![None; left_rows];
        if right_keys.first().map_or(0, |a| a.len()) == 0 {
            return Ok(matches);
        }

        let keys: Vec<String> = (0..left_keys.len()).map(|i| format!("k{i}")).collect();
        let ties: Vec<String> = (0..tie_break.len()).map(|i| format!("t{i}")).collect();

        self.load("__left", keys.iter().map(String::as_str).zip(left_keys))?;
        self.load(
            "__right",
            keys.iter()
                .chain(&ties)
                .map(String::as_str)
                .zip(right_keys.iter().chain(tie_break)),
        )?;

        let on = keys
            .iter()
            .map(|k| format!("l.{k} = r.{k}", k = quote(k)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let order = ties
            .iter()
            .map(|t| format!("r.{} ASC NULLS LAST, ", quote(t)))
            .collect::<String>();
        let sql = format!(
            "SELECT l.{row}, r.{row} FROM \"__left\" l JOIN \"__right\" r ON {on} \
             QUALIFY row_number() OVER (PARTITION BY l.{row} ORDER BY {order}r.{row} ASC) = 1",
            row = quote(ROW_COLUMN),
        );
        let pairs = self.positions(&sql, |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        self.drop_table("__left")?;
        self.drop_table("__right")?;

        for (left, right) in pairs {
            let slot = matches
                .get_mut(to_position(left)? as usize)
                .ok_or_else(|| Error::engine(format!("Join returned unknown row {left}")))?;
            *slot = Some(to_position(right)?);
        }
        Ok(matches)
    }

    /// Create `table` with a row position column followed by `columns`
    fn load<'a>(
        &self,
        table: &str,
        columns: impl Iterator<Item = (&'a str, &'a ArrayRef)>,
    ) -> Result<()> {
        let mut fields = Vec::new();
        let mut arrays = Vec::new();
        let mut ddl = vec![format!("{} BIGINT", quote(ROW_COLUMN))];

        for (name, array) in columns {
            let (array, sql_type) = sql_column(name, array)?;
            ddl.push(format!("{} {sql_type}", quote(name)));
            fields.push(Field::new(name, array.data_type().clone(), true));
            arrays.push(array);
        }

        let rows = arrays.first().map_or(0, |a| a.len());
        let positions: Vec<i64> = (0..rows as i64).collect();
        fields.insert(0, Field::new(ROW_COLUMN, DataType::Int64, false));
        arrays.insert(0, Arc::new(Int64Array::from(positions)));
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;

        self.conn
            .execute_batch(&format!(
                "CREATE OR REPLACE TABLE {} ({})",
                quote(table),
                ddl.join(", ")
            ))
            .map_err(|e| Error::engine(format!("Failed to create table {table}: {e}")))?;

        // The appender flushes when dropped
        let mut appender = self
            .conn
            .appender(table)
            .map_err(|e| Error::engine(format!("Failed to open appender for {table}: {e}")))?;
        let mut offset = 0;
        while offset < rows {
            let len = CHUNK_ROWS.min(rows - offset);
            appender
                .append_record_batch(batch.slice(offset, len))
                .map_err(|e| Error::engine(format!("Failed to load rows into {table}: {e}")))?;
            offset += len;
        }
        Ok(())
    }

    fn positions<T>(
        &self,
        sql: &str,
        read: impl FnMut(&duckdb::Row<'_>) -> duckdb::Result<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Error::engine(format!("Failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map([], read)
            .map_err(|e| Error::engine(format!("Query failed: {e}")))?;
        rows.collect::<duckdb::Result<Vec<T>>>()
            .map_err(|e| Error::engine(format!("Failed to read query result: {e}")))
    }

    fn drop_table(&self, table: &str) -> Result<()> {
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {}", quote(table)))
            .map_err(|e| Error::engine(format!("Failed to drop table {table}: {e}")))
    }
}

/// Column as loaded into DuckDB, with its SQL type
///
/// Timestamps are compared as their raw integer values.
fn sql_column(name: &str, array: &ArrayRef) -> Result<(ArrayRef, &'static str)> {
    let sql_type = match array.data_type() {
        DataType::Boolean => "BOOLEAN",
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::Float64 => "DOUBLE",
        DataType::Utf8 => "VARCHAR",
        DataType::Timestamp(_, _) => return Ok((cast(array, &DataType::Int64)?, "BIGINT")),
        other => {
            return Err(Error::schema(format!(
                "Column '{name}' has type {other}, which the query engine does not compare"
            )))
        }
    };
    Ok((Arc::clone(array), sql_type))
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn quoted_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote(n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_position(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::engine(format!("Row position {value} out of range")))
}
