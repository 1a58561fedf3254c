//! Command-line interface for Modelwatch.

use crate::config::ModelwatchConfig;
use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Modelwatch - model serving with drift, latency and resource monitoring.
#[derive(Parser)]
#[command(name = "modelwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (JSON)
    #[arg(short, long, env = "MODELWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MODELWATCH_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Serve models and run the monitor until interrupted
    Serve {
        /// Port of the metrics and health endpoint
        #[arg(long, env = "MODELWATCH_METRICS_PORT")]
        metrics_port: Option<u16>,

        /// Model catalog file
        #[arg(long, env = "MODELWATCH_CATALOG")]
        catalog: Option<PathBuf>,

        /// Use the local development preset when no config file is given
        #[arg(long)]
        dev: bool,
    },

    /// Validate a configuration file and print the effective configuration
    CheckConfig,

    /// Show version information
    Version,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Load the config file (or a preset) and apply global overrides.
    pub fn load_config(&self, dev: bool) -> Result<ModelwatchConfig> {
        let mut config = match &self.config {
            Some(path) => ModelwatchConfig::from_file(path)?,
            None if dev => ModelwatchConfig::development(),
            None => ModelwatchConfig::default(),
        };
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        Ok(config)
    }
}
