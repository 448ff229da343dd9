//! Control namelists written into stage working directories.

use std::fmt;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::cycle::DomainId;
use crate::namelist::Namelist;
use crate::time::model_time;

/// Which boundary a `da_update_bc.exe` run updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Lower,
    Lateral,
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryKind::Lower => write!(f, "lower"),
            BoundaryKind::Lateral => write!(f, "lateral"),
        }
    }
}

/// Land use category of water in the default land use table.
const WATER_CATEGORY: i64 = 16;

const GROUP: &str = "control_param";

/// `parame.in` for a boundary update in `workdir`.
///
/// The lower update rewrites the first guess (`./fg`) from the domain's
/// initial conditions. The lateral update only runs for domain 1 and
/// rewrites `./wrfbdy_d01` against the analysis.
pub fn update_bc_control(kind: BoundaryKind, domain: DomainId, workdir: &Path, wrfinput: &Path) -> Namelist {
    let mut nml = Namelist::new();
    match kind {
        BoundaryKind::Lower => {
            nml.set_scalar(GROUP, "da_file", "./fg");
            nml.set_scalar(GROUP, "wrf_input", wrfinput.display().to_string());
            nml.set_scalar(GROUP, "domain_id", domain.get() as i64);
            nml.set_scalar(GROUP, "cycling", true);
            nml.set_scalar(GROUP, "debug", true);
            nml.set_scalar(GROUP, "update_low_bdy", true);
            nml.set_scalar(GROUP, "update_lsm", true);
            nml.set_scalar(GROUP, "var4d_lbc", false);
            nml.set_scalar(GROUP, "iswater", WATER_CATEGORY);
        }
        BoundaryKind::Lateral => {
            let analysis = workdir.join(super::layout::ANALYSIS);
            nml.set_scalar(GROUP, "da_file", analysis.display().to_string());
            nml.set_scalar(GROUP, "wrf_bdy_file", "./wrfbdy_d01");
            nml.set_scalar(GROUP, "domain_id", domain.get() as i64);
            nml.set_scalar(GROUP, "cycling", true);
            nml.set_scalar(GROUP, "debug", true);
            nml.set_scalar(GROUP, "update_low_bdy", false);
            nml.set_scalar(GROUP, "update_lateral_bdy", true);
            nml.set_scalar(GROUP, "update_lsm", false);
            nml.set_scalar(GROUP, "var4d_lbc", false);
        }
    }
    nml
}

/// `da_control.nml`: the domain and the first guess / background pair the
/// assimilation of that domain starts from.
pub fn da_control(
    domain: DomainId,
    analysis: &NaiveDateTime,
    first_guess: &Path,
    background: &Path,
) -> Namelist {
    let parent = domain.parent().map_or(0, |p| p.get() as i64);
    let mut nml = Namelist::new();
    nml.set_scalar("da_control", "domain_id", domain.get() as i64);
    nml.set_scalar("da_control", "parent_id", parent);
    nml.set_scalar("da_control", "analysis_date", model_time(analysis));
    nml.set_scalar("da_control", "first_guess", first_guess.display().to_string());
    nml.set_scalar("da_control", "background", background.display().to_string());
    nml
}
