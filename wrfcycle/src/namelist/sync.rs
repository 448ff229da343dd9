//! Fixed-key namelist synchronization.
//!
//! Each function copies a known set of keys from the forecast namelist (or
//! the cycle) into another namelist. Nothing else is edited.

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};

use super::{Namelist, NamelistError, Value};
use crate::time::{model_time, split_duration};

/// Half-width of the observation time window around the analysis time.
pub const OBS_WINDOW_MINUTES: i64 = 15;

/// `(forecast domains key, obsproc record8 key)` pairs.
const OBSPROC_NEST_KEYS: [(&str, &str); 7] = [
    ("i_parent_start", "nesti"),
    ("j_parent_start", "nestj"),
    ("e_we", "nestix"),
    ("e_sn", "nestjx"),
    ("parent_id", "numc"),
    ("dx", "dis"),
    ("max_dom", "maxnes"),
];

/// Grid keys copied per domain into the assimilation namelist.
pub const DA_DOMAIN_KEYS: [&str; 5] = ["e_we", "e_sn", "e_vert", "dx", "dy"];

/// Physics keys copied per domain into the assimilation namelist.
pub const DA_PHYSICS_KEYS: [&str; 10] = [
    "mp_physics",
    "ra_lw_physics",
    "ra_sw_physics",
    "radt",
    "sf_sfclay_physics",
    "sf_surface_physics",
    "bl_pbl_physics",
    "cu_physics",
    "cudt",
    "num_soil_layers",
];

/// Observation time window `(min, max)` for an analysis time.
pub fn observation_window(analysis: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let half = Duration::minutes(OBS_WINDOW_MINUTES);
    (analysis - half, analysis + half)
}

/// Sync the observation preprocessor namelist with the forecast nest layout.
pub fn sync_obsproc(
    obsproc: &mut Namelist,
    forecast: &Namelist,
    analysis: NaiveDateTime,
    obs_filename: &str,
) -> Result<(), NamelistError> {
    obsproc.set_scalar("record1", "obs_gts_filename", obs_filename);

    for (source, target) in OBSPROC_NEST_KEYS {
        let values = required(forecast, "domains", source)?.to_vec();
        obsproc.set("record8", target, values);
    }

    let (min, max) = observation_window(analysis);
    obsproc.set_scalar("record2", "time_analysis", model_time(&analysis));
    obsproc.set_scalar("record2", "time_window_min", model_time(&min));
    obsproc.set_scalar("record2", "time_window_max", model_time(&max));
    Ok(())
}

/// Sync an assimilation namelist for one domain.
///
/// Grid keys are required. Physics keys are copied when the forecast
/// namelist sets them; a scalar applies to every domain. `cv_options` 5 and
/// 7 also enable the outer-loop settings those background error models need.
pub fn sync_wrfda(
    da: &mut Namelist,
    forecast: &Namelist,
    domain: usize,
    analysis: NaiveDateTime,
    cv_options: u8,
) -> Result<(), NamelistError> {
    for key in DA_DOMAIN_KEYS {
        let value = forecast
            .get_for_domain("domains", key, domain)
            .cloned()
            .ok_or_else(|| NamelistError::MissingKey {
                group: "domains".to_string(),
                key: format!("{key}({domain})"),
            })?;
        da.set("domains", key, vec![value]);
    }

    for key in DA_PHYSICS_KEYS {
        if let Some(value) = forecast.get_for_domain("physics", key, domain) {
            da.set("physics", key, vec![value.clone()]);
        }
    }

    let (min, max) = observation_window(analysis);
    da.set_scalar("wrfvar18", "analysis_date", model_time(&analysis));
    da.set_scalar("wrfvar21", "time_window_min", model_time(&min));
    da.set_scalar("wrfvar22", "time_window_max", model_time(&max));

    if matches!(cv_options, 5 | 7) {
        da.set_scalar("wrfvar7", "cv_options", i64::from(cv_options));
        da.set_scalar("wrfvar6", "max_ext_its", 2i64);
        da.set_scalar("wrfvar5", "check_max_iv", true);
    } else {
        da.set_scalar("wrfvar7", "cv_options", 3i64);
    }

    let stamp = [
        ("year", i64::from(analysis.year())),
        ("month", i64::from(analysis.month())),
        ("day", i64::from(analysis.day())),
        ("hour", i64::from(analysis.hour())),
    ];
    for (field, value) in stamp {
        da.set_scalar("time_control", &format!("start_{field}"), value);
        da.set_scalar("time_control", &format!("end_{field}"), value);
    }
    Ok(())
}

/// Apply one relaxation entry to the forecast namelist.
pub fn apply_relaxation(forecast: &mut Namelist, time_step: i64, parent_time_step_ratio: &[i64]) {
    forecast.set_scalar("domains", "time_step", time_step);
    forecast.set(
        "domains",
        "parent_time_step_ratio",
        parent_time_step_ratio.iter().copied().map(Value::Int).collect(),
    );
}

/// Rewrite the forecast `time_control` group for a run from `start` to `end`.
///
/// Start/end fields are written once per domain (`max_dom`).
pub fn sync_time_control(
    forecast: &mut Namelist,
    start: NaiveDateTime,
    end: NaiveDateTime,
    boundary_interval_secs: u64,
) -> Result<(), NamelistError> {
    let max_dom = forecast.get_int("domains", "max_dom")?;
    if max_dom < 1 {
        return Err(NamelistError::InvalidValue {
            group: "domains".to_string(),
            key: "max_dom".to_string(),
            value: max_dom.to_string(),
            reason: "must be a positive integer".to_string(),
        });
    }
    let per_domain = |v: i64| vec![Value::Int(v); max_dom as usize];

    forecast.set("time_control", "start_year", per_domain(i64::from(start.year())));
    forecast.set("time_control", "start_month", per_domain(i64::from(start.month())));
    forecast.set("time_control", "start_day", per_domain(i64::from(start.day())));
    forecast.set("time_control", "start_hour", per_domain(i64::from(start.hour())));
    forecast.set("time_control", "end_year", per_domain(i64::from(end.year())));
    forecast.set("time_control", "end_month", per_domain(i64::from(end.month())));
    forecast.set("time_control", "end_day", per_domain(i64::from(end.day())));
    forecast.set("time_control", "end_hour", per_domain(i64::from(end.hour())));

    let interval = i64::try_from(boundary_interval_secs).unwrap_or(i64::MAX);
    forecast.set_scalar("time_control", "interval_seconds", interval);

    let (days, hours, minutes, seconds) = split_duration(end - start);
    forecast.set_scalar("time_control", "run_days", days);
    forecast.set_scalar("time_control", "run_hours", hours);
    forecast.set_scalar("time_control", "run_minutes", minutes);
    forecast.set_scalar("time_control", "run_seconds", seconds);
    Ok(())
}

fn required<'a>(nml: &'a Namelist, group: &str, key: &str) -> Result<&'a [Value], NamelistError> {
    nml.get(group, key).ok_or_else(|| NamelistError::MissingKey {
        group: group.to_string(),
        key: key.to_string(),
    })
}
