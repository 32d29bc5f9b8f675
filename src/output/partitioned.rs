//! Hive-style partitioned table writer
//!
//! Tables are laid out as `<root>/<table>/<col>=<value>/.../part-00000.parquet`
//! with a `_SUCCESS` marker next to the partition directories. Writing a
//! table replaces whatever was stored under its prefix before.

use super::writer::{encode_parquet, ParquetWriterConfig};
use crate::error::Result;
use crate::frame::Frame;
use crate::storage::StorageLocation;
use crate::types::Table;
use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Data file name inside each partition directory
pub const PART_FILE: &str = "part-00000.parquet";

/// Marker written after every data file of a table
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Directory value used for null partition values
pub const NULL_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Outcome of writing one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableWriteSummary {
    /// Table name
    pub table: String,
    /// Location of the table directory
    pub location: String,
    /// Rows written across all files
    pub rows: usize,
    /// Number of Parquet files written
    pub files: usize,
    /// Partition directories, relative to the table directory
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<String>,
}

/// One partition of a table: its directory segments and its rows
#[derive(Debug, Clone)]
pub struct Partition {
    /// `col=value` directory segments, outermost first
    pub dirs: Vec<String>,
    /// Rows of this partition, without the partition columns
    pub frame: Frame,
}

impl Partition {
    /// Partition directory relative to the table directory
    pub fn path(&self) -> String {
        self.dirs.join("/")
    }
}

/// Split a frame into partitions by the values of `partition_by`
///
/// Partitions come back sorted by their rendered values. The partition
/// columns are removed from each partition's rows.
pub fn split_partitions(frame: &Frame, partition_by: &[&str]) -> Result<Vec<Partition>> {
    let keys: Vec<&ArrayRef> = partition_by
        .iter()
        .map(|name| frame.column(name))
        .collect::<Result<_>>()?;

    let options = FormatOptions::default();
    let formatters: Vec<ArrayFormatter<'_>> = keys
        .iter()
        .map(|array| ArrayFormatter::try_new(array.as_ref(), &options))
        .collect::<std::result::Result<_, _>>()?;

    let mut groups: BTreeMap<Vec<String>, Vec<u32>> = BTreeMap::new();
    for row in 0..frame.num_rows() {
        let values = keys
            .iter()
            .zip(&formatters)
            .map(|(array, formatter)| {
                if array.is_null(row) {
                    NULL_PARTITION.to_string()
                } else {
                    formatter.value(row).to_string()
                }
            })
            .collect();
        groups.entry(values).or_default().push(row as u32);
    }

    let data_columns: Vec<String> = frame
        .column_names()
        .into_iter()
        .filter(|name| !partition_by.contains(&name.as_str()))
        .collect();
    let data_columns: Vec<&str> = data_columns.iter().map(String::as_str).collect();
    let data = frame.select(&data_columns)?;

    groups
        .into_iter()
        .map(|(values, rows)| {
            let dirs = partition_by
                .iter()
                .zip(values)
                .map(|(column, value)| format!("{column}={value}"))
                .collect();
            let frame = data.take(&UInt32Array::from(rows))?;
            Ok(Partition { dirs, frame })
        })
        .collect()
}

/// Writes star-schema tables below an output root
#[derive(Debug, Clone)]
pub struct TableWriter {
    root: StorageLocation,
    config: ParquetWriterConfig,
}

impl TableWriter {
    /// Create a writer for tables under `root`
    pub fn new(root: StorageLocation, config: ParquetWriterConfig) -> Self {
        Self { root, config }
    }

    /// Output root
    pub fn root(&self) -> &StorageLocation {
        &self.root
    }

    /// Write one of the star-schema tables with its own partitioning
    pub async fn write(&self, table: Table, frame: &Frame) -> Result<TableWriteSummary> {
        self.write_partitioned(table.name(), frame, table.partition_columns())
            .await
    }

    /// Replace the table `name` with the rows of `frame`
    pub async fn write_partitioned(
        &self,
        name: &str,
        frame: &Frame,
        partition_by: &[&str],
    ) -> Result<TableWriteSummary> {
        let target = self.root.child(name);

        let removed = target.delete_all().await?;
        if removed > 0 {
            debug!("Removed {removed} existing objects under {}", target.url());
        }

        let mut summary = TableWriteSummary {
            table: name.to_string(),
            location: target.url().to_string(),
            rows: frame.num_rows(),
            files: 0,
            partitions: Vec::new(),
        };

        if partition_by.is_empty() {
            let data = encode_parquet(frame.batch(), &self.config)?;
            let written = target.write(&[PART_FILE], data).await?;
            debug!("Wrote {} rows to {written}", frame.num_rows());
            summary.files = 1;
        } else {
            for partition in split_partitions(frame, partition_by)? {
                let data = encode_parquet(partition.frame.batch(), &self.config)?;
                let mut segments: Vec<&str> = partition.dirs.iter().map(String::as_str).collect();
                segments.push(PART_FILE);
                let written = target.write(&segments, data).await?;
                debug!("Wrote {} rows to {written}", partition.frame.num_rows());

                summary.files += 1;
                summary.partitions.push(partition.path());
            }
        }

        target.write(&[SUCCESS_MARKER], Bytes::new()).await?;

        info!(
            "Wrote table {name}: {} rows, {} files to {}",
            summary.rows, summary.files, summary.location
        );
        Ok(summary)
    }
}
