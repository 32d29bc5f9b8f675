//! Pipeline module
//!
//! The two pipelines of the job and the orchestration that runs them.
//!
//! # Overview
//!
//! - [`catalog`]: catalog records → `songs`, `artists`
//! - [`events`]: event records (+ catalog records) → `users`, `time`, `songplays`
//! - [`calendar`]: timestamp decomposition used by the event pipeline
//!
//! Every input is read and every table derived before the output root is
//! opened, so an unreadable or malformed input leaves the previous output
//! untouched. Tables are then written catalog first.

pub mod calendar;
pub mod catalog;
pub mod events;

pub use calendar::{decompose, CalendarColumns, CalendarParts};
pub use catalog::{build_catalog_tables, write_catalog_tables, CatalogTables};
pub use events::{build_event_tables, write_event_tables, EventTables};

use crate::config::EtlConfig;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::output::TableWriteSummary;
use crate::reader::{catalog_schema, event_schema};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// Which pipelines a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobScope {
    /// Catalog pipeline, then event pipeline
    All,
    /// Catalog pipeline only
    Catalog,
    /// Event pipeline only
    Events,
}

impl JobScope {
    fn runs_catalog(self) -> bool {
        matches!(self, JobScope::All | JobScope::Catalog)
    }

    fn runs_events(self) -> bool {
        matches!(self, JobScope::All | JobScope::Events)
    }
}

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub scope: JobScope,
    pub output: String,
    pub tables: Vec<TableWriteSummary>,
    pub duration_ms: u64,
}

impl JobReport {
    /// Summary of one table, if it was written
    pub fn table(&self, name: &str) -> Option<&TableWriteSummary> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Total rows written across all tables
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// A configured batch job
#[derive(Debug)]
pub struct EtlJob {
    ctx: ExecutionContext,
    song_data: String,
    log_data: String,
    output: String,
}

impl EtlJob {
    /// Build a job from a validated configuration
    pub fn new(config: &EtlConfig) -> Result<Self> {
        config.validate()?;
        let song_data = config
            .song_data_location()
            .ok_or_else(|| Error::missing_field("input.song_data"))?;
        let log_data = config
            .log_data_location()
            .ok_or_else(|| Error::missing_field("input.log_data"))?;

        Ok(Self {
            ctx: ExecutionContext::new(config)?,
            song_data,
            log_data,
            output: config.output_location()?.to_string(),
        })
    }

    /// Execution context shared by the pipelines
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Run the selected pipelines in sequence
    ///
    /// Inputs are read and tables derived before anything is written, so a
    /// missing, empty or malformed source aborts the run with no table
    /// touched.
    pub async fn run(&self, scope: JobScope) -> Result<JobReport> {
        let started = Instant::now();
        info!("Starting {scope:?} run, output {}", self.output);

        let (catalog, events) = self.read_inputs(scope).await?;
        let catalog_tables = if scope.runs_catalog() {
            Some(build_catalog_tables(self.ctx.sql(), &catalog)?)
        } else {
            None
        };
        let event_tables = match &events {
            Some(events) => Some(build_event_tables(
                self.ctx.sql(),
                events,
                &catalog,
                self.ctx.playback_page(),
            )?),
            None => None,
        };

        let writer = self.ctx.open_output(&self.output)?;
        let mut tables: Vec<TableWriteSummary> = Vec::new();
        if let Some(catalog_tables) = &catalog_tables {
            tables.extend(write_catalog_tables(&writer, catalog_tables).await?);
        }
        if let Some(event_tables) = &event_tables {
            tables.extend(write_event_tables(&writer, event_tables).await?);
        }

        let report = JobReport {
            scope,
            output: writer.root().url().to_string(),
            tables,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Finished run: {} tables, {} rows in {} ms",
            report.tables.len(),
            report.total_rows(),
            report.duration_ms
        );
        Ok(report)
    }

    /// Catalog records, plus event records when the event pipeline runs
    ///
    /// The catalog is needed either way: the event pipeline joins against it.
    async fn read_inputs(&self, scope: JobScope) -> Result<(Frame, Option<Frame>)> {
        let song_data = self.ctx.open_input(&self.song_data)?;
        let log_data = if scope.runs_events() {
            Some(self.ctx.open_input(&self.log_data)?)
        } else {
            None
        };

        let catalog = self.ctx.read_json(&song_data, &catalog_schema()).await?;
        let events = match &log_data {
            Some(log_data) => Some(self.ctx.read_json(log_data, &event_schema()).await?),
            None => None,
        };
        Ok((catalog, events))
    }
}
