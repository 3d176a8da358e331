//! Dumper settings
//!
//! Settings come from an optional TOML file and are overridden by whatever
//! was given on the command line.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use topspeed_engine::Policy;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Text,
    Json,
}

/// Contents of a config file; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub password: Option<String>,
    pub policy: Option<Policy>,
    pub format: Option<Format>,
    pub log_level: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

/// Settings after merging the file with command-line overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub password: Option<String>,
    pub policy: Policy,
    pub format: Format,
    pub log_level: String,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Default)]
pub struct Overrides {
    pub password: Option<String>,
    pub policy: Option<Policy>,
    pub format: Option<Format>,
    pub log_level: Option<String>,
}

impl Settings {
    pub fn resolve(file: FileConfig, cli: Overrides) -> Self {
        Settings {
            password: cli.password.or(file.password),
            policy: cli.policy.or(file.policy).unwrap_or_default(),
            format: cli.format.or(file.format).unwrap_or_default(),
            log_level: cli
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| "warn".to_string()),
        }
    }
}
