//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{ConfigOverrides, EtlConfig};
use crate::error::Result;
use crate::pipeline::{EtlJob, JobReport, JobScope};
use serde_json::{json, Value};
use tracing::debug;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match self.cli.command {
            Commands::Run => self.execute(JobScope::All).await,
            Commands::Catalog => self.execute(JobScope::Catalog).await,
            Commands::Events => self.execute(JobScope::Events).await,
            Commands::Validate => self.validate(),
        }
    }

    /// Load the configuration file, if any, and apply flag overrides
    pub fn load_config(&self) -> Result<EtlConfig> {
        let config = match &self.cli.config {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                EtlConfig::from_file(path)?
            }
            None => EtlConfig::default(),
        };
        Ok(config.with_overrides(ConfigOverrides::from(&self.cli.locations)))
    }

    /// Run the job for the given scope
    async fn execute(&self, scope: JobScope) -> Result<()> {
        let config = self.load_config()?;
        let job = EtlJob::new(&config)?;

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!("Starting {} run", scope_name(scope))
            }
        }));

        let report = job.run(scope).await?;
        self.output_message(&summary_message(&report));
        Ok(())
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let config = self.load_config()?;
        config.validate()?;

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": "Configuration is valid"
            }
        }));
        self.output_message(&json!({
            "type": "CONFIG",
            "config": config.redacted(),
            "song_data": config.song_data_location(),
            "log_data": config.log_data_location(),
        }));

        Ok(())
    }

    /// Output a message to stdout
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn scope_name(scope: JobScope) -> &'static str {
    match scope {
        JobScope::All => "full",
        JobScope::Catalog => "catalog",
        JobScope::Events => "events",
    }
}

/// Final `RUN_SUMMARY` message for a report
pub fn summary_message(report: &JobReport) -> Value {
    json!({
        "type": "RUN_SUMMARY",
        "summary": report,
    })
}
