//! Output module
//!
//! Encodes tables as Parquet and lays them out under the output root.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Encoding Arrow RecordBatches as Parquet files in memory
//! - Splitting tables into Hive-style partitions
//! - Overwriting a table directory in any supported object store

mod partitioned;
mod writer;

pub use partitioned::{
    split_partitions, Partition, TableWriteSummary, TableWriter, NULL_PARTITION, PART_FILE,
    SUCCESS_MARKER,
};
pub use writer::{encode_parquet, ParquetWriter, ParquetWriterConfig};

#[cfg(test)]
mod tests;
