//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::{Path, PathBuf};

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub fn to_config_string(config: &ConfigFile) -> String {
    let radar_file = optional_path(config.filesystem.radar_file.as_ref());
    let domains = config
        .cycle
        .domains
        .map(|n| n.to_string())
        .unwrap_or_default();
    let stage_timeout = config
        .cycle
        .stage_timeout_secs
        .map(|n| n.to_string())
        .unwrap_or_default();
    let be_dat = config
        .assimilation
        .be_dat
        .iter()
        .map(|p| path_to_string(p))
        .collect::<Vec<_>>()
        .join(", ");
    let time_steps = config
        .retry
        .table
        .entries()
        .iter()
        .map(|e| e.time_step.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let ratios = config
        .retry
        .table
        .entries()
        .iter()
        .map(|e| {
            e.parent_time_step_ratio
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(":")
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"[filesystem]
; Model build directory (must contain main/wrf.exe)
wrf_dir = {}
; Forecast run directory (namelist.input, wrfinput_d0N, wrfbdy_d01)
wrf_run_dir = {}
; Assimilation build directory (must contain var/da and var/obsproc)
wrfda_dir = {}
; Root for per-stage working directories (obsproc/, wrfda/d0N/)
work_dir = {}
; Directory holding LITTLE_R observation files
obs_dir = {}
; Observation file name inside obs_dir
obs_filename = {}
; Optional radar observations, assimilated on domain 1 only
radar_file = {}

[cycle]
; Number of nested domains (empty: max_dom from the forecast namelist)
domains = {}
; Lateral boundary interval in seconds (default: 3600)
boundary_interval = {}
; Submit boundary update and assimilation for every domain up front,
; chaining each domain's jobs by scheduler dependency (default: false)
chain_domains = {}
; Wall-clock bound per stage in seconds (empty or 0: no bound)
stage_timeout_secs = {}

[forecast]
; Forecast namelist (empty: <wrf_run_dir>/namelist.input, read through
; namelist.input.template, which later cycles keep using)
namelist = {}
; Fail a run whose rsl.error.0000 lacks "SUCCESS COMPLETE WRF" (default: true)
check_restart = {}

[assimilation]
; Assimilation namelist template (empty: var/test/tutorial/namelist.input)
namelist = {}
; Background error option: 3, 5 or 7 (default: 3)
cv_type = {}
; Background error files for cv_type 5/7: one path, or twelve (one per month)
be_dat = {}
; Only update the lower boundary; promote the first guess (default: false)
low_only = {}

[scheduler]
; Batch scheduler commands
submit_command = {}
queue_command = {}
accounting_command = {}
; Interval between active job queries in milliseconds (default: 1000)
poll_interval_ms = {}
; Per-stage job scripts. Empty runs the stage locally.
obsproc = {}
updatebc = {}
wrfvar = {}
wrf = {}

[retry]
; Relaxation entries tried in order after the forecast fails.
; After the last entry fails, the cycle falls back to the first guess.
time_steps = {}
; One colon-separated parent_time_step_ratio list per time step
parent_time_step_ratios = {}

[bias_correction]
; External bias-correction tool (empty: disabled)
; Invoked as: <command> <domain> <analysis time> <analysis file>
command = {}

[logging]
; Log file path (default: ~/.wrfcycle/logs/wrfcycle.log)
file = {}
"#,
        path_to_string(&config.filesystem.wrf_dir),
        path_to_string(&config.filesystem.wrf_run_dir),
        path_to_string(&config.filesystem.wrfda_dir),
        path_to_string(&config.filesystem.work_dir),
        path_to_string(&config.filesystem.obs_dir),
        config.filesystem.obs_filename,
        radar_file,
        domains,
        config.cycle.boundary_interval,
        config.cycle.chain_domains,
        stage_timeout,
        optional_path(config.forecast.namelist.as_ref()),
        config.forecast.check_restart,
        optional_path(config.assimilation.namelist.as_ref()),
        config.assimilation.cv_type,
        be_dat,
        config.assimilation.low_only,
        config.scheduler.submit_command,
        config.scheduler.queue_command,
        config.scheduler.accounting_command,
        config.scheduler.poll_interval_ms,
        optional_path(config.scheduler.obsproc.as_ref()),
        optional_path(config.scheduler.updatebc.as_ref()),
        optional_path(config.scheduler.wrfvar.as_ref()),
        optional_path(config.scheduler.wrf.as_ref()),
        time_steps,
        ratios,
        optional_path(config.bias_correction.command.as_ref()),
        path_to_string(&config.logging.file),
    )
}

fn optional_path(path: Option<&PathBuf>) -> String {
    path.map(|p| path_to_string(p)).unwrap_or_default()
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
