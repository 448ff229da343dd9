//! Working directory and run directory layout.
//!
//! ```text
//! <work_dir>/obsproc/          observation preprocessing
//! <work_dir>/wrfda/d01/        boundary updates and assimilation, domain 1
//! <work_dir>/wrfda/d02/        ...
//! <run_dir>/wrfinput_d01       forecast initial conditions
//! <run_dir>/wrffg_d01          preserved first guess
//! <run_dir>/wrfbdy_d01         lateral boundary conditions
//! <run_dir>/namelist.input.template
//!                              forecast namelist as first seen, before retries
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::cycle::{DomainId, PipelineStage};
use crate::time::model_time;

pub const FIRST_GUESS: &str = "fg";
pub const ANALYSIS: &str = "wrfvar_output";
pub const BOUNDARY: &str = "wrfbdy_d01";
pub const UPDATE_BC_CONTROL: &str = "parame.in";
pub const DA_CONTROL: &str = "da_control.nml";
pub const DA_NAMELIST: &str = "namelist.input";
pub const FORECAST_TEMPLATE: &str = "namelist.input.template";
pub const OBSPROC_NAMELIST: &str = "namelist.obsproc";
pub const OBSERVATIONS: &str = "ob.ascii";
pub const RADAR_OBSERVATIONS: &str = "ob.radar";
pub const BACKGROUND_ERROR: &str = "be.dat";
pub const LANDUSE_TABLE: &str = "LANDUSE.TBL";
pub const STATISTICS: &str = "statistics";
pub const RSL_OUT: &str = "rsl.out.0000";

/// Paths used by a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkLayout {
    work_dir: PathBuf,
    run_dir: PathBuf,
}

impl WorkLayout {
    pub fn new(work_dir: impl Into<PathBuf>, run_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            run_dir: run_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// The forecast run directory.
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn obsproc_dir(&self) -> PathBuf {
        self.work_dir.join("obsproc")
    }

    pub fn wrfda_dir(&self, domain: DomainId) -> PathBuf {
        self.work_dir.join("wrfda").join(domain.suffix())
    }

    /// Working directory of a stage.
    pub fn stage_dir(&self, domain: DomainId, stage: PipelineStage) -> PathBuf {
        match stage {
            PipelineStage::ObservationPreprocess => self.obsproc_dir(),
            PipelineStage::BoundaryUpdateLower
            | PipelineStage::VariationalAssimilation
            | PipelineStage::BiasCorrection
            | PipelineStage::BoundaryUpdateLateral => self.wrfda_dir(domain),
            PipelineStage::ForecastIntegration => self.run_dir.clone(),
        }
    }

    /// Forecast initial conditions.
    pub fn wrfinput(&self, domain: DomainId) -> PathBuf {
        self.run_dir.join(format!("wrfinput_{}", domain.suffix()))
    }

    /// First guess kept for the fallback run.
    pub fn preserved_first_guess(&self, domain: DomainId) -> PathBuf {
        self.run_dir.join(format!("wrffg_{}", domain.suffix()))
    }

    /// Previous forecast output written in wrfinput format, if the last
    /// cycle produced one.
    pub fn cycled_first_guess(&self, domain: DomainId, time: &NaiveDateTime) -> PathBuf {
        self.run_dir
            .join(format!("wrfvar_input_{}_{}", domain.suffix(), model_time(time)))
    }

    /// Untouched copy of the run directory's forecast namelist.
    pub fn forecast_template(&self) -> PathBuf {
        self.run_dir.join(FORECAST_TEMPLATE)
    }

    pub fn boundary(&self) -> PathBuf {
        self.run_dir.join(BOUNDARY)
    }

    pub fn obsproc_output(&self, time: &NaiveDateTime) -> PathBuf {
        self.obsproc_dir()
            .join(format!("obs_gts_{}.3DVAR", model_time(time)))
    }
}
