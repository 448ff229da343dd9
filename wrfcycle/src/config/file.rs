//! Configuration file handling for ~/.wrfcycle/config.ini.
//!
//! Loads and saves the cycle configuration with defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::defaults::*;
use super::settings::*;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.wrfcycle/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.wrfcycle/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file at `path` if it doesn't exist.
    pub fn ensure_exists_at(path: &Path) -> Result<(), ConfigFileError> {
        if !path.exists() {
            Self::default().save_to(path)?;
        }
        Ok(())
    }

    /// Forecast namelist path.
    pub fn forecast_namelist(&self) -> PathBuf {
        self.forecast
            .namelist
            .clone()
            .unwrap_or_else(|| self.filesystem.wrf_run_dir.join("namelist.input"))
    }

    /// Assimilation namelist template path.
    pub fn assimilation_namelist(&self) -> PathBuf {
        self.assimilation
            .namelist
            .clone()
            .unwrap_or_else(|| self.filesystem.wrfda_dir.join(DA_NAMELIST_TEMPLATE))
    }

    /// Check that every path the cycle needs exists.
    ///
    /// Run once after loading, before any job is submitted.
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        let fs = &self.filesystem;
        require_dir("filesystem", "wrf_dir", &fs.wrf_dir)?;
        require_dir("filesystem", "wrf_run_dir", &fs.wrf_run_dir)?;
        require_dir("filesystem", "wrfda_dir", &fs.wrfda_dir)?;
        require_dir("filesystem", "obs_dir", &fs.obs_dir)?;
        if fs.work_dir.as_os_str().is_empty() {
            return Err(invalid("filesystem", "work_dir", "", "must be set"));
        }
        if fs.obs_filename.is_empty() {
            return Err(invalid("filesystem", "obs_filename", "", "must be set"));
        }
        if let Some(radar) = &fs.radar_file {
            require_file("filesystem", "radar_file", radar)?;
        }

        require_file("filesystem", "wrf_dir", &fs.wrf_dir.join(WRF_EXE))?;
        for exe in [
            OBSPROC_EXE,
            OBSPROC_NAMELIST_TEMPLATE,
            DA_WRFVAR_EXE,
            DA_UPDATE_BC_EXE,
        ] {
            require_file("filesystem", "wrfda_dir", &fs.wrfda_dir.join(exe))?;
        }

        require_file("forecast", "namelist", &self.forecast_namelist())?;
        require_file("assimilation", "namelist", &self.assimilation_namelist())?;

        if matches!(self.assimilation.cv_type, 5 | 7) {
            let count = self.assimilation.be_dat.len();
            if count != 1 && count != 12 {
                return Err(invalid(
                    "assimilation",
                    "be_dat",
                    &format!("{count} entries"),
                    "cv_type 5/7 needs one file or twelve (one per month)",
                ));
            }
            for path in &self.assimilation.be_dat {
                require_file("assimilation", "be_dat", path)?;
            }
        }

        if self.retry.table.is_empty() {
            return Err(invalid("retry", "time_steps", "", "needs at least one entry"));
        }

        let scripts = [
            ("obsproc", &self.scheduler.obsproc),
            ("updatebc", &self.scheduler.updatebc),
            ("wrfvar", &self.scheduler.wrfvar),
            ("wrf", &self.scheduler.wrf),
        ];
        for (key, script) in scripts {
            if let Some(path) = script {
                require_file("scheduler", key, path)?;
            }
        }

        if let Some(command) = &self.bias_correction.command {
            require_file("bias_correction", "command", command)?;
        }

        Ok(())
    }
}

fn require_dir(section: &str, key: &str, path: &Path) -> Result<(), ConfigFileError> {
    if path.as_os_str().is_empty() {
        return Err(invalid(section, key, "", "must be set"));
    }
    if !path.is_dir() {
        return Err(invalid(
            section,
            key,
            &path.display().to_string(),
            "directory does not exist",
        ));
    }
    Ok(())
}

fn require_file(section: &str, key: &str, path: &Path) -> Result<(), ConfigFileError> {
    if !path.is_file() {
        return Err(invalid(
            section,
            key,
            &path.display().to_string(),
            "file does not exist",
        ));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Get the path to the config directory (~/.wrfcycle).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wrfcycle")
}

/// Get the path to the config file (~/.wrfcycle/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
