//! CLI module
//!
//! Command-line interface for running the job.
//!
//! # Commands
//!
//! - `run` - Catalog pipeline, then event pipeline
//! - `catalog` - Songs and artists only
//! - `events` - Users, time and songplays only
//! - `validate` - Check the configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands, LocationArgs, OutputFormat};
pub use runner::{summary_message, Runner};
