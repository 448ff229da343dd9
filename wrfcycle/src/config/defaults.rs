//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::settings::*;
use crate::retry::RelaxationTable;

// =============================================================================
// Cycle defaults
// =============================================================================

/// Default lateral boundary interval, in seconds.
pub const DEFAULT_BOUNDARY_INTERVAL_SECS: u64 = 3600;

/// Default background error option.
pub const DEFAULT_CV_TYPE: u8 = 3;

// =============================================================================
// Install layout, relative to wrf_dir / wrfda_dir
// =============================================================================

/// Forecast model executable under `wrf_dir`.
pub const WRF_EXE: &str = "main/wrf.exe";

/// Observation preprocessor directory under `wrfda_dir`; holds its static tables.
pub const OBSPROC_DIR: &str = "var/obsproc";

/// Observation preprocessor executable under `wrfda_dir`.
pub const OBSPROC_EXE: &str = "var/obsproc/src/obsproc.exe";

/// Observation preprocessor namelist template under `wrfda_dir`.
pub const OBSPROC_NAMELIST_TEMPLATE: &str = "var/obsproc/namelist.obsproc.3dvar.wrfvar-tut";

/// Variational assimilation executable under `wrfda_dir`.
pub const DA_WRFVAR_EXE: &str = "var/da/da_wrfvar.exe";

/// Boundary update executable under `wrfda_dir`.
pub const DA_UPDATE_BC_EXE: &str = "var/da/da_update_bc.exe";

/// Default assimilation namelist template under `wrfda_dir`.
pub const DA_NAMELIST_TEMPLATE: &str = "var/test/tutorial/namelist.input";

/// cv3 background error statistics under `wrfda_dir`.
pub const BE_DAT_CV3: &str = "var/run/be.dat.cv3";

/// Land use table under `wrfda_dir`.
pub const LANDUSE_TBL: &str = "run/LANDUSE.TBL";

// =============================================================================
// Scheduler defaults
// =============================================================================

/// Default batch submission command.
pub const DEFAULT_SUBMIT_COMMAND: &str = "sbatch";

/// Default active job query command.
pub const DEFAULT_QUEUE_COMMAND: &str = "squeue";

/// Default accounting query command.
pub const DEFAULT_ACCOUNTING_COMMAND: &str = "sacct";

/// Default interval between active job queries.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// =============================================================================
// Relaxation table defaults
// =============================================================================

/// Default relaxation time steps, in seconds.
pub const DEFAULT_RELAXATION_TIME_STEPS: [i64; 4] = [10, 8, 12, 6];

/// Default parent time step ratios, one list per relaxation entry.
pub const DEFAULT_RELAXATION_RATIOS: [[i64; 3]; 4] = [[1, 5, 5], [1, 5, 5], [1, 6, 6], [1, 5, 5]];

// =============================================================================
// ConfigFile::default()
// =============================================================================

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = super::file::config_directory();

        Self {
            filesystem: FilesystemSettings {
                wrf_dir: PathBuf::new(),
                wrf_run_dir: PathBuf::new(),
                wrfda_dir: PathBuf::new(),
                work_dir: config_dir.join("work"),
                obs_dir: PathBuf::new(),
                obs_filename: String::new(),
                radar_file: None,
            },
            cycle: CycleSettings {
                domains: None,
                boundary_interval: DEFAULT_BOUNDARY_INTERVAL_SECS,
                chain_domains: false,
                stage_timeout_secs: None,
            },
            forecast: ForecastSettings {
                namelist: None,
                check_restart: true,
            },
            assimilation: AssimilationSettings {
                namelist: None,
                cv_type: DEFAULT_CV_TYPE,
                be_dat: Vec::new(),
                low_only: false,
            },
            scheduler: SchedulerSettings {
                submit_command: DEFAULT_SUBMIT_COMMAND.to_string(),
                queue_command: DEFAULT_QUEUE_COMMAND.to_string(),
                accounting_command: DEFAULT_ACCOUNTING_COMMAND.to_string(),
                poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
                obsproc: None,
                updatebc: None,
                wrfvar: None,
                wrf: None,
            },
            retry: RetrySettings {
                table: RelaxationTable::default(),
            },
            bias_correction: BiasCorrectionSettings::default(),
            logging: LoggingSettings {
                file: config_dir.join("logs").join("wrfcycle.log"),
            },
        }
    }
}
