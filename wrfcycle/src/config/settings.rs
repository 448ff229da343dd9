//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use crate::retry::RelaxationTable;

/// Complete cycle configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Model, assimilation and working directory locations
    pub filesystem: FilesystemSettings,
    /// Cycle shape: domain count, boundary interval, chaining
    pub cycle: CycleSettings,
    /// Forecast model settings
    pub forecast: ForecastSettings,
    /// Variational assimilation settings
    pub assimilation: AssimilationSettings,
    /// Batch scheduler commands and per-stage job scripts
    pub scheduler: SchedulerSettings,
    /// Forecast relaxation table
    pub retry: RetrySettings,
    /// Optional bias-correction tool
    pub bias_correction: BiasCorrectionSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Filesystem locations.
#[derive(Debug, Clone)]
pub struct FilesystemSettings {
    /// Model build directory (contains `main/wrf.exe`)
    pub wrf_dir: PathBuf,
    /// Forecast run directory holding `namelist.input`, `wrfinput_d0N`, `wrfbdy_d01`
    pub wrf_run_dir: PathBuf,
    /// Assimilation build directory (contains `var/da`, `var/obsproc`)
    pub wrfda_dir: PathBuf,
    /// Root for per-stage working directories
    pub work_dir: PathBuf,
    /// Directory containing the LITTLE_R observation files
    pub obs_dir: PathBuf,
    /// Observation file name inside `obs_dir`
    pub obs_filename: String,
    /// Optional radar observation file, assimilated on domain 1 only
    pub radar_file: Option<PathBuf>,
}

/// Cycle shape.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Number of nested domains. `None` reads `max_dom` from the forecast namelist.
    pub domains: Option<usize>,
    /// Lateral boundary interval in seconds.
    pub boundary_interval: u64,
    /// Submit boundary update and assimilation for all domains before
    /// awaiting any, chaining each domain's jobs by dependency.
    pub chain_domains: bool,
    /// Wall-clock bound per stage, in seconds. `None` waits indefinitely.
    pub stage_timeout_secs: Option<u64>,
}

/// Forecast model settings.
#[derive(Debug, Clone)]
pub struct ForecastSettings {
    /// Forecast namelist. `None` uses `<wrf_run_dir>/namelist.input`.
    pub namelist: Option<PathBuf>,
    /// Treat a run whose `rsl.error.0000` lacks the success marker as failed.
    pub check_restart: bool,
}

/// Variational assimilation settings.
#[derive(Debug, Clone)]
pub struct AssimilationSettings {
    /// Assimilation namelist template. `None` uses the tutorial namelist
    /// shipped with the assimilation system.
    pub namelist: Option<PathBuf>,
    /// Background error control variable option: 3, 5 or 7.
    pub cv_type: u8,
    /// Background error files for cv 5/7: one file, or one per month.
    pub be_dat: Vec<PathBuf>,
    /// Only update the lower boundary; promote the first guess instead of the analysis.
    pub low_only: bool,
}

/// Batch scheduler settings.
///
/// A stage with no script configured runs locally.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Submission command (default: sbatch)
    pub submit_command: String,
    /// Active job query command (default: squeue)
    pub queue_command: String,
    /// Accounting query command (default: sacct)
    pub accounting_command: String,
    /// Interval between active job queries, in milliseconds
    pub poll_interval_ms: u64,
    /// Job script for the observation preprocessor
    pub obsproc: Option<PathBuf>,
    /// Job script for boundary updates
    pub updatebc: Option<PathBuf>,
    /// Job script for variational assimilation
    pub wrfvar: Option<PathBuf>,
    /// Job script for the forecast model
    pub wrf: Option<PathBuf>,
}

/// Forecast relaxation settings.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Ordered relaxation entries tried after the baseline run fails.
    pub table: RelaxationTable,
}

/// Bias correction settings.
#[derive(Debug, Clone, Default)]
pub struct BiasCorrectionSettings {
    /// External bias-correction tool. `None` disables bias correction.
    pub command: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
