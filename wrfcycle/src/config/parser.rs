//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::retry::RelaxationTable;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [filesystem] section
    if let Some(section) = ini.section(Some("filesystem")) {
        if let Some(v) = non_empty(section.get("wrf_dir")) {
            config.filesystem.wrf_dir = expand_tilde(v);
        }
        if let Some(v) = non_empty(section.get("wrf_run_dir")) {
            config.filesystem.wrf_run_dir = expand_tilde(v);
        }
        if let Some(v) = non_empty(section.get("wrfda_dir")) {
            config.filesystem.wrfda_dir = expand_tilde(v);
        }
        if let Some(v) = non_empty(section.get("work_dir")) {
            config.filesystem.work_dir = expand_tilde(v);
        }
        if let Some(v) = non_empty(section.get("obs_dir")) {
            config.filesystem.obs_dir = expand_tilde(v);
        }
        if let Some(v) = non_empty(section.get("obs_filename")) {
            config.filesystem.obs_filename = v.to_string();
        }
        if let Some(v) = non_empty(section.get("radar_file")) {
            config.filesystem.radar_file = Some(expand_tilde(v));
        }
    }

    // [cycle] section
    if let Some(section) = ini.section(Some("cycle")) {
        if let Some(v) = non_empty(section.get("domains")) {
            let domains = v.parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(|| {
                invalid("cycle", "domains", v, "must be a positive integer")
            })?;
            config.cycle.domains = Some(domains);
        }
        if let Some(v) = non_empty(section.get("boundary_interval")) {
            config.cycle.boundary_interval = v.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| {
                invalid("cycle", "boundary_interval", v, "must be a positive integer (seconds)")
            })?;
        }
        if let Some(v) = section.get("chain_domains") {
            config.cycle.chain_domains = parse_bool(v);
        }
        if let Some(v) = non_empty(section.get("stage_timeout_secs")) {
            let secs = v.parse::<u64>().map_err(|_| {
                invalid("cycle", "stage_timeout_secs", v, "must be a positive integer (seconds)")
            })?;
            // 0 disables the bound
            config.cycle.stage_timeout_secs = (secs > 0).then_some(secs);
        }
    }

    // [forecast] section
    if let Some(section) = ini.section(Some("forecast")) {
        if let Some(v) = non_empty(section.get("namelist")) {
            config.forecast.namelist = Some(expand_tilde(v));
        }
        if let Some(v) = section.get("check_restart") {
            config.forecast.check_restart = parse_bool(v);
        }
    }

    // [assimilation] section
    if let Some(section) = ini.section(Some("assimilation")) {
        if let Some(v) = non_empty(section.get("namelist")) {
            config.assimilation.namelist = Some(expand_tilde(v));
        }
        if let Some(v) = non_empty(section.get("cv_type")) {
            config.assimilation.cv_type = match v {
                "3" => 3,
                "5" => 5,
                "7" => 7,
                _ => {
                    return Err(invalid("assimilation", "cv_type", v, "must be 3, 5 or 7"));
                }
            };
        }
        if let Some(v) = non_empty(section.get("be_dat")) {
            config.assimilation.be_dat = v
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(expand_tilde)
                .collect();
        }
        if let Some(v) = section.get("low_only") {
            config.assimilation.low_only = parse_bool(v);
        }
    }

    // [scheduler] section
    if let Some(section) = ini.section(Some("scheduler")) {
        if let Some(v) = non_empty(section.get("submit_command")) {
            config.scheduler.submit_command = v.to_string();
        }
        if let Some(v) = non_empty(section.get("queue_command")) {
            config.scheduler.queue_command = v.to_string();
        }
        if let Some(v) = non_empty(section.get("accounting_command")) {
            config.scheduler.accounting_command = v.to_string();
        }
        if let Some(v) = non_empty(section.get("poll_interval_ms")) {
            config.scheduler.poll_interval_ms = v.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| {
                invalid("scheduler", "poll_interval_ms", v, "must be a positive integer (milliseconds)")
            })?;
        }
        config.scheduler.obsproc = non_empty(section.get("obsproc")).map(expand_tilde);
        config.scheduler.updatebc = non_empty(section.get("updatebc")).map(expand_tilde);
        config.scheduler.wrfvar = non_empty(section.get("wrfvar")).map(expand_tilde);
        config.scheduler.wrf = non_empty(section.get("wrf")).map(expand_tilde);
    }

    // [retry] section
    if let Some(section) = ini.section(Some("retry")) {
        let current = config.retry.table.entries();
        let mut time_steps: Vec<i64> = current.iter().map(|e| e.time_step).collect();
        let mut ratios: Vec<Vec<i64>> = current
            .iter()
            .map(|e| e.parent_time_step_ratio.clone())
            .collect();

        if let Some(v) = section.get("time_steps") {
            time_steps = parse_time_steps(v)?;
        }
        if let Some(v) = section.get("parent_time_step_ratios") {
            ratios = parse_ratios(v)?;
        }

        config.retry.table = RelaxationTable::from_columns(&time_steps, &ratios).ok_or_else(|| {
            invalid(
                "retry",
                "parent_time_step_ratios",
                &format!("{} entries", ratios.len()),
                &format!("must have one entry per time step ({})", time_steps.len()),
            )
        })?;
    }

    // [bias_correction] section
    if let Some(section) = ini.section(Some("bias_correction")) {
        config.bias_correction.command = non_empty(section.get("command")).map(expand_tilde);
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section.get("file")) {
            config.logging.file = expand_tilde(v);
        }
    }

    Ok(config)
}

/// Parse `10, 8, 12, 6`.
fn parse_time_steps(value: &str) -> Result<Vec<i64>, ConfigFileError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().ok().filter(|n| *n > 0).ok_or_else(|| {
                invalid("retry", "time_steps", value, "expected comma-separated positive integers")
            })
        })
        .collect()
}

/// Parse `1:5:5, 1:5:5, 1:6:6`.
fn parse_ratios(value: &str) -> Result<Vec<Vec<i64>>, ConfigFileError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            entry
                .split(':')
                .map(|n| n.trim().parse::<i64>().ok().filter(|n| *n > 0))
                .collect::<Option<Vec<i64>>>()
                .ok_or_else(|| {
                    invalid(
                        "retry",
                        "parent_time_step_ratios",
                        value,
                        "expected comma-separated ratio lists like '1:5:5'",
                    )
                })
        })
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a boolean string value.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_filesystem_section() {
        let config = load(
            r#"
[filesystem]
wrf_dir = /opt/WRF
wrf_run_dir = /scratch/run
wrfda_dir = /opt/WRFDA
work_dir = /scratch/work
obs_dir = /data/obs
obs_filename = obs.little_r
radar_file = /data/radar.3dvar
"#,
        )
        .unwrap();

        assert_eq!(config.filesystem.wrf_dir, PathBuf::from("/opt/WRF"));
        assert_eq!(config.filesystem.work_dir, PathBuf::from("/scratch/work"));
        assert_eq!(config.filesystem.obs_filename, "obs.little_r");
        assert_eq!(
            config.filesystem.radar_file,
            Some(PathBuf::from("/data/radar.3dvar"))
        );
    }

    #[test]
    fn test_cycle_section() {
        let config = load(
            r#"
[cycle]
domains = 3
boundary_interval = 10800
chain_domains = true
stage_timeout_secs = 7200
"#,
        )
        .unwrap();

        assert_eq!(config.cycle.domains, Some(3));
        assert_eq!(config.cycle.boundary_interval, 10800);
        assert!(config.cycle.chain_domains);
        assert_eq!(config.cycle.stage_timeout_secs, Some(7200));
    }

    #[test]
    fn test_zero_stage_timeout_disables_bound() {
        let config = load("[cycle]\nstage_timeout_secs = 0\n").unwrap();
        assert_eq!(config.cycle.stage_timeout_secs, None);
    }

    #[test]
    fn test_invalid_domains() {
        let err = load("[cycle]\ndomains = 0\n").unwrap_err();
        assert!(err.to_string().contains("cycle.domains"));
    }

    #[test]
    fn test_invalid_cv_type() {
        let err = load("[assimilation]\ncv_type = 4\n").unwrap_err();
        assert!(err.to_string().contains("must be 3, 5 or 7"));
    }

    #[test]
    fn test_be_dat_list() {
        let config = load("[assimilation]\ncv_type = 7\nbe_dat = /be/jan.dat, /be/feb.dat\n").unwrap();
        assert_eq!(config.assimilation.cv_type, 7);
        assert_eq!(
            config.assimilation.be_dat,
            vec![PathBuf::from("/be/jan.dat"), PathBuf::from("/be/feb.dat")]
        );
    }

    #[test]
    fn test_scheduler_scripts() {
        let config = load(
            r#"
[scheduler]
poll_interval_ms = 500
wrfvar = /jobs/wrfvar.sh
wrf =
"#,
        )
        .unwrap();

        assert_eq!(config.scheduler.poll_interval_ms, 500);
        assert_eq!(config.scheduler.submit_command, DEFAULT_SUBMIT_COMMAND);
        assert_eq!(config.scheduler.wrfvar, Some(PathBuf::from("/jobs/wrfvar.sh")));
        assert!(config.scheduler.wrf.is_none());
        assert!(config.scheduler.obsproc.is_none());
    }

    #[test]
    fn test_retry_table() {
        let config = load(
            r#"
[retry]
time_steps = 30, 20
parent_time_step_ratios = 1:3, 1:4
"#,
        )
        .unwrap();

        let table = &config.retry.table;
        assert_eq!(table.len(), 2);
        assert_eq!(table.entry(2).unwrap().time_step, 20);
        assert_eq!(table.entry(2).unwrap().parent_time_step_ratio, vec![1, 4]);
    }

    #[test]
    fn test_retry_table_length_mismatch() {
        let err = load("[retry]\ntime_steps = 30, 20\n").unwrap_err();
        assert!(err.to_string().contains("one entry per time step"));
    }

    #[test]
    fn test_retry_table_rejects_garbage() {
        assert!(load("[retry]\ntime_steps = fast\n").is_err());
        assert!(load("[retry]\nparent_time_step_ratios = 1-5-5\n").is_err());
    }

    #[test]
    fn test_parse_bool_values() {
        assert!(parse_bool("true"));
        assert!(parse_bool("Yes"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/work");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("work"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
