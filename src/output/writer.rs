//! Parquet encoder
//!
//! Files are encoded into memory and handed to the object store as a whole.

use crate::config::WriterConfig;
use crate::error::{Error, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::{EnabledStatistics, WriterProperties};

/// Encoding settings shared by every file of a run
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    pub compression: Compression,
    pub max_row_group_size: usize,
    /// Statistics level written for each column
    pub statistics: EnabledStatistics,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self::from(&WriterConfig::default())
    }
}

impl From<&WriterConfig> for ParquetWriterConfig {
    fn from(config: &WriterConfig) -> Self {
        Self {
            compression: config.compression.into(),
            max_row_group_size: config.row_group_size,
            statistics: EnabledStatistics::Page,
        }
    }
}

impl ParquetWriterConfig {
    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.max_row_group_size)
            .set_statistics_enabled(self.statistics)
            .build()
    }
}

/// Parquet writer over an in-memory buffer
pub struct ParquetWriter {
    writer: ArrowWriter<Vec<u8>>,
}

impl ParquetWriter {
    pub fn new(schema: SchemaRef, config: &ParquetWriterConfig) -> Result<Self> {
        let writer = ArrowWriter::try_new(Vec::new(), schema, Some(config.properties()))
            .map_err(|e| Error::output(format!("Failed to create Parquet writer: {e}")))?;
        Ok(Self { writer })
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.writer
            .write(batch)
            .map_err(|e| Error::output(format!("Failed to write batch: {e}")))
    }

    /// Write the footer and return the file contents
    pub fn finish(self) -> Result<Bytes> {
        let buffer = self
            .writer
            .into_inner()
            .map_err(|e| Error::output(format!("Failed to close Parquet writer: {e}")))?;
        Ok(Bytes::from(buffer))
    }
}

/// Encode one batch as a complete Parquet file
///
/// An empty batch still yields a valid file carrying the schema.
pub fn encode_parquet(batch: &RecordBatch, config: &ParquetWriterConfig) -> Result<Bytes> {
    let mut writer = ParquetWriter::new(batch.schema(), config)?;
    if batch.num_rows() > 0 {
        writer.write(batch)?;
    }
    writer.finish()
}
