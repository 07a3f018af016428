//! Command-line interface parsing
//!
//! Flags select the variant and output mode and override the settings read
//! from the optional config file.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::config::{ConfigError, Settings};
use crate::variant::VariantKind;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No cache directory given and none could be determined
    #[error("cannot determine a cache directory, pass --cache-dir")]
    NoCacheDir,
}

/// covidash - COVID-19 incidence, tendency and vaccination progress
#[derive(Parser, Debug)]
#[command(name = "covidash")]
#[command(about = "COVID-19 incidence, tendency and vaccination progress in the terminal")]
#[command(version)]
pub struct Cli {
    /// Which entities and sources to show
    #[arg(long, value_enum, default_value_t = VariantKind::Dashboard)]
    pub variant: VariantKind,

    /// TOML file with settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Always refetch, use a separate cache namespace and log at debug level
    #[arg(long)]
    pub debug: bool,

    /// Print the summary as text and exit instead of opening the dashboard
    #[arg(long)]
    pub plain: bool,

    /// Directory for cached source data
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum age of cached data in minutes
    #[arg(long, value_name = "MINUTES")]
    pub cache_minutes: Option<u64>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Settings from the config file (or defaults) with flags applied on top
    pub fn settings(&self) -> Result<Settings, CliError> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if self.debug {
            settings.debug = true;
        }
        if let Some(minutes) = self.cache_minutes {
            settings.cache_invalidation_minutes = minutes;
        }
        if let Some(dir) = &self.cache_dir {
            settings.cache_dir = Some(dir.clone());
        }

        settings.validate()?;
        Ok(settings)
    }
}
