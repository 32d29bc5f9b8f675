//! Execution context
//!
//! The session both pipelines share: storage credentials, the embedded
//! query engine, the requested engine packages and the writer settings,
//! all injected once from the startup configuration.

use crate::config::{CredentialsConfig, EtlConfig};
use crate::error::Result;
use crate::frame::{Frame, SqlEngine};
use crate::output::{ParquetWriterConfig, TableWriter};
use crate::reader::read_json_table;
use crate::storage::{AccessMode, StorageLocation};
use arrow::datatypes::Schema;
use tracing::{debug, info};

/// Shared session for one job run
#[derive(Debug)]
pub struct ExecutionContext {
    credentials: CredentialsConfig,
    sql: SqlEngine,
    extra_packages: Vec<String>,
    writer: ParquetWriterConfig,
    playback_page: String,
}

impl ExecutionContext {
    /// Bootstrap a session from configuration
    pub fn new(config: &EtlConfig) -> Result<Self> {
        if config.credentials.has_keys() {
            debug!("Using explicit storage credentials");
        }
        // The embedded engine ships what the job needs; packages are recorded only
        for package in &config.extra_packages {
            info!("Engine package requested: {package}");
        }

        Ok(Self {
            credentials: config.credentials.clone(),
            sql: SqlEngine::open_in_memory()?,
            extra_packages: config.extra_packages.clone(),
            writer: ParquetWriterConfig::from(&config.writer),
            playback_page: config.playback_page.clone(),
        })
    }

    /// Query engine for distinct and join
    pub fn sql(&self) -> &SqlEngine {
        &self.sql
    }

    /// Page tag that marks playback events
    pub fn playback_page(&self) -> &str {
        &self.playback_page
    }

    /// Engine packages requested at bootstrap
    pub fn extra_packages(&self) -> &[String] {
        &self.extra_packages
    }

    /// Open a source location; it must exist
    pub fn open_input(&self, url: &str) -> Result<StorageLocation> {
        StorageLocation::parse(url, &self.credentials, AccessMode::Read)
    }

    /// Open the output root and return a writer for tables below it
    pub fn open_output(&self, url: &str) -> Result<TableWriter> {
        let root = StorageLocation::parse(url, &self.credentials, AccessMode::Write)?;
        if root.is_cloud() {
            info!("Writing tables to {} ({})", root.url(), root.scheme());
        } else {
            debug!("Writing tables to {} ({})", root.url(), root.scheme());
        }
        Ok(self.writer_for(root))
    }

    /// Table writer for an already opened location
    pub fn writer_for(&self, root: StorageLocation) -> TableWriter {
        TableWriter::new(root, self.writer.clone())
    }

    /// Load every record below `location` into a table
    pub async fn read_json(&self, location: &StorageLocation, schema: &Schema) -> Result<Frame> {
        read_json_table(location, schema).await
    }
}
