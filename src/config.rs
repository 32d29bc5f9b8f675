//! Job configuration
//!
//! The configuration is loaded once at startup from YAML (and/or CLI flags)
//! and handed explicitly to the execution context. Nothing below reads
//! process environment variables.

use crate::error::{Error, Result, ResultExt};
use crate::types::{Compression, DEFAULT_PLAYBACK_PAGE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const REDACTED: &str = "********";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete job configuration loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Where the raw catalog and event records live
    #[serde(default)]
    pub input: InputConfig,

    /// Output root; each table lands in a sub-path of it
    #[serde(default)]
    pub output: Option<String>,

    /// Storage credentials
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Engine capabilities requested at session bootstrap
    #[serde(default)]
    pub extra_packages: Vec<String>,

    /// Parquet writer settings
    #[serde(default)]
    pub writer: WriterConfig,

    /// Page tag identifying playback events
    #[serde(default = "default_playback_page")]
    pub playback_page: String,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            output: None,
            credentials: CredentialsConfig::default(),
            extra_packages: Vec::new(),
            writer: WriterConfig::default(),
            playback_page: default_playback_page(),
        }
    }
}

fn default_playback_page() -> String {
    DEFAULT_PLAYBACK_PAGE.to_string()
}

// ============================================================================
// Input Config
// ============================================================================

/// Input locations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Common root holding `song_data/` and `log_data/`
    #[serde(default)]
    pub root: Option<String>,

    /// Catalog records location (overrides `<root>/song_data`)
    #[serde(default)]
    pub song_data: Option<String>,

    /// Event records location (overrides `<root>/log_data`)
    #[serde(default)]
    pub log_data: Option<String>,
}

// ============================================================================
// Credentials Config
// ============================================================================

/// Credentials for the storage backend hosting input and output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Access key id (S3/R2) or storage account name (Azure)
    #[serde(default)]
    pub access_key: Option<String>,

    /// Secret access key (S3/R2) or account key (Azure)
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Bucket region
    #[serde(default)]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint (R2, MinIO)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// GCS service account key file
    #[serde(default)]
    pub service_account_path: Option<String>,
}

impl CredentialsConfig {
    /// Check if a key pair was supplied
    pub fn has_keys(&self) -> bool {
        self.access_key.is_some() && self.secret_key.is_some()
    }
}

// ============================================================================
// Writer Config
// ============================================================================

/// Parquet writer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Compression codec
    #[serde(default)]
    pub compression: Compression,

    /// Maximum rows per row group
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            row_group_size: default_row_group_size(),
        }
    }
}

fn default_row_group_size() -> usize {
    1024 * 1024
}

// ============================================================================
// Overrides
// ============================================================================

/// Values supplied on the command line; each one wins over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<String>,
    pub song_data: Option<String>,
    pub log_data: Option<String>,
    pub output: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

// ============================================================================
// Loading and validation
// ============================================================================

impl EtlConfig {
    /// Load a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if overrides.input.is_some() {
            self.input.root = overrides.input;
        }
        if overrides.song_data.is_some() {
            self.input.song_data = overrides.song_data;
        }
        if overrides.log_data.is_some() {
            self.input.log_data = overrides.log_data;
        }
        if overrides.output.is_some() {
            self.output = overrides.output;
        }
        if overrides.access_key.is_some() {
            self.credentials.access_key = overrides.access_key;
        }
        if overrides.secret_key.is_some() {
            self.credentials.secret_key = overrides.secret_key;
        }
        if overrides.region.is_some() {
            self.credentials.region = overrides.region;
        }
        if overrides.endpoint.is_some() {
            self.credentials.endpoint = overrides.endpoint;
        }
        self
    }

    /// Resolved catalog records location
    pub fn song_data_location(&self) -> Option<String> {
        self.input
            .song_data
            .clone()
            .or_else(|| self.input.root.as_deref().map(|r| join_location(r, "song_data")))
    }

    /// Resolved event records location
    pub fn log_data_location(&self) -> Option<String> {
        self.input
            .log_data
            .clone()
            .or_else(|| self.input.root.as_deref().map(|r| join_location(r, "log_data")))
    }

    /// Output root, or an error if none was configured
    pub fn output_location(&self) -> Result<&str> {
        self.output
            .as_deref()
            .filter(|o| !o.is_empty())
            .ok_or_else(|| Error::missing_field("output"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.output_location()?;

        if self.song_data_location().is_none() {
            return Err(Error::missing_field("input.song_data"));
        }
        if self.log_data_location().is_none() {
            return Err(Error::missing_field("input.log_data"));
        }

        match (&self.credentials.access_key, &self.credentials.secret_key) {
            (Some(_), None) => {
                return Err(Error::invalid_value(
                    "credentials.secret_key",
                    "required when access_key is set",
                ))
            }
            (None, Some(_)) => {
                return Err(Error::invalid_value(
                    "credentials.access_key",
                    "required when secret_key is set",
                ))
            }
            _ => {}
        }

        if self.writer.row_group_size == 0 {
            return Err(Error::invalid_value(
                "writer.row_group_size",
                "must be greater than zero",
            ));
        }

        if self.playback_page.trim().is_empty() {
            return Err(Error::invalid_value("playback_page", "must not be empty"));
        }

        Ok(())
    }

    /// Copy of the configuration with secrets masked, for display
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.credentials.access_key.is_some() {
            copy.credentials.access_key = Some(REDACTED.to_string());
        }
        if copy.credentials.secret_key.is_some() {
            copy.credentials.secret_key = Some(REDACTED.to_string());
        }
        copy
    }
}

/// Join a child segment onto a location URL or path
pub fn join_location(base: &str, child: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        child.trim_start_matches('/')
    )
}
