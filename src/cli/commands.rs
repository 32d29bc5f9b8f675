//! CLI commands and argument parsing

use crate::config::ConfigOverrides;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Song play analytics ETL
#[derive(Parser, Debug)]
#[command(name = "songplay-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub locations: LocationArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Values that override the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct LocationArgs {
    /// Input root containing song_data/ and log_data/
    #[arg(long, global = true)]
    pub input: Option<String>,

    /// Catalog records location
    #[arg(long, global = true)]
    pub song_data: Option<String>,

    /// Event records location
    #[arg(long, global = true)]
    pub log_data: Option<String>,

    /// Output root (local path or cloud URL)
    /// Supports: /path, s3://bucket/path, s3a://bucket/path, r2://bucket/path, gs://bucket/path, az://container/path
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Storage access key
    #[arg(long, global = true)]
    pub access_key: Option<String>,

    /// Storage secret key
    #[arg(long, global = true)]
    pub secret_key: Option<String>,

    /// Storage region
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// S3-compatible endpoint
    #[arg(long, global = true)]
    pub endpoint: Option<String>,
}

impl From<&LocationArgs> for ConfigOverrides {
    fn from(args: &LocationArgs) -> Self {
        Self {
            input: args.input.clone(),
            song_data: args.song_data.clone(),
            log_data: args.log_data.clone(),
            output: args.output.clone(),
            access_key: args.access_key.clone(),
            secret_key: args.secret_key.clone(),
            region: args.region.clone(),
            endpoint: args.endpoint.clone(),
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the catalog pipeline, then the event pipeline
    Run,

    /// Build songs and artists only
    Catalog,

    /// Build users, time and songplays only
    Events,

    /// Validate the configuration and print it with secrets masked
    Validate,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
