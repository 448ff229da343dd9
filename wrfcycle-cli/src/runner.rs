//! CLI runner for common setup.
//!
//! Loads the configuration once, initializes logging and builds the job
//! backend shared by every stage.

use std::path::{Path, PathBuf};

use tracing::info;
use wrfcycle::config::{config_file_path, ConfigFile};
use wrfcycle::job::{BatchSettings, RoutingBackend};
use wrfcycle::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
    config_path: PathBuf,
}

impl CliRunner {
    /// Load the configuration from `config_path` (or the default location)
    /// and start logging to the configured file.
    pub fn new(config_path: Option<PathBuf>, debug: bool) -> Result<Self, CliError> {
        let config_path = config_path.unwrap_or_else(config_file_path);
        let config = load_config(&config_path)?;

        let logging_guard = init_logging(&config.logging.file, debug)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
            config_path,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("wrfcycle v{}", wrfcycle::VERSION);
        info!(config = %self.config_path.display(), "wrfcycle CLI: {} command", command);
    }

    /// Check every configured path before anything is staged.
    pub fn validate(&self) -> Result<(), CliError> {
        self.config.validate()?;
        Ok(())
    }

    /// Backend running stages with a job script through the scheduler and
    /// the rest as local processes.
    pub fn backend(&self) -> RoutingBackend {
        RoutingBackend::new(BatchSettings::from(&self.config.scheduler))
    }
}

/// Load a configuration file, failing if an explicitly named file is missing.
pub fn load_config(path: &Path) -> Result<ConfigFile, CliError> {
    if !path.exists() && path != config_file_path() {
        return Err(CliError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    }
    Ok(ConfigFile::load_from(path)?)
}
