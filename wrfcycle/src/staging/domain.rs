//! Per-domain, per-stage preparation and promotion.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime};
use tracing::{debug, info};

use super::control::{da_control, update_bc_control, BoundaryKind};
use super::layout::*;
use super::promotion::{promote_copy, recreate_dir, remove_prefixed, replace_symlink, silent_remove};
use super::{StagingError, StagingManifest};
use crate::config::{
    ConfigFile, BE_DAT_CV3, DA_UPDATE_BC_EXE, DA_WRFVAR_EXE, LANDUSE_TBL, OBSPROC_DIR,
    OBSPROC_EXE, OBSPROC_NAMELIST_TEMPLATE, WRF_EXE,
};
use crate::cycle::{Cycle, DomainId, PipelineStage};
use crate::namelist::sync::{sync_obsproc, sync_time_control, sync_wrfda};
use crate::namelist::Namelist;
use crate::time::model_time;

/// Observation error tables obsproc reads from its working directory.
const OBSPROC_TABLES: [&str; 7] = [
    "DIR.txt",
    "HEIGHT.txt",
    "PRES.txt",
    "RH.txt",
    "TEMP.txt",
    "UV.txt",
    "obserr.txt",
];

/// Materializes stage working directories for one cycle and moves stage
/// outputs to where the next stage reads them.
#[derive(Debug, Clone)]
pub struct DomainStaging {
    layout: WorkLayout,
    wrf_dir: PathBuf,
    wrfda_dir: PathBuf,
    obs_dir: PathBuf,
    obs_filename: String,
    radar_file: Option<PathBuf>,
    forecast_namelist: PathBuf,
    da_template: PathBuf,
    cv_type: u8,
    be_dat: Vec<PathBuf>,
    boundary_interval: u64,
    analysis: NaiveDateTime,
    forecast_end: NaiveDateTime,
}

impl DomainStaging {
    pub fn new(config: &ConfigFile, cycle: &Cycle) -> Self {
        let fs = &config.filesystem;
        Self {
            layout: WorkLayout::new(&fs.work_dir, &fs.wrf_run_dir),
            wrf_dir: fs.wrf_dir.clone(),
            wrfda_dir: fs.wrfda_dir.clone(),
            obs_dir: fs.obs_dir.clone(),
            obs_filename: fs.obs_filename.clone(),
            radar_file: fs.radar_file.clone(),
            forecast_namelist: config.forecast_namelist(),
            da_template: config.assimilation_namelist(),
            cv_type: config.assimilation.cv_type,
            be_dat: config.assimilation.be_dat.clone(),
            boundary_interval: config.cycle.boundary_interval,
            analysis: cycle.start(),
            forecast_end: cycle.end(),
        }
    }

    pub fn layout(&self) -> &WorkLayout {
        &self.layout
    }

    pub fn workdir(&self, domain: DomainId, stage: PipelineStage) -> PathBuf {
        self.layout.stage_dir(domain, stage)
    }

    /// Forecast namelist each cycle starts from.
    ///
    /// Forecast retries rewrite `<run_dir>/namelist.input`. When that file is
    /// also the configured namelist, its contents are kept once as
    /// `namelist.input.template` and every later cycle reads the copy.
    pub fn forecast_template(&self) -> Result<PathBuf, StagingError> {
        let working = self.layout.run_dir().join(DA_NAMELIST);
        if self.forecast_namelist != working {
            return Ok(self.forecast_namelist.clone());
        }
        let template = self.layout.forecast_template();
        if !template.is_file() {
            require(&working)?;
            promote_copy(&working, &template)?;
            info!(template = %template.display(), "Kept forecast namelist template");
        }
        Ok(template)
    }

    /// Background error statistics to link and the `cv_options` they imply.
    ///
    /// cv5/cv7 need a configured file, either one for all months or one per
    /// month. Anything else uses the cv3 statistics shipped with WRFDA.
    pub fn background_error(&self) -> (u8, PathBuf) {
        if matches!(self.cv_type, 5 | 7) {
            let selected = match self.be_dat.len() {
                1 => self.be_dat.first(),
                12 => self.be_dat.get(self.analysis.month0() as usize),
                _ => None,
            };
            if let Some(path) = selected {
                return (self.cv_type, path.clone());
            }
        }
        (3, self.wrfda_dir.join(BE_DAT_CV3))
    }

    /// Create or refresh the working directory of `stage` for `domain`.
    ///
    /// Preparing the same stage twice yields the same directory contents.
    pub fn prepare(&self, domain: DomainId, stage: PipelineStage) -> Result<PathBuf, StagingError> {
        let workdir = self.workdir(domain, stage);
        match stage {
            PipelineStage::ObservationPreprocess => self.prepare_obsproc(&workdir)?,
            PipelineStage::BoundaryUpdateLower => self.prepare_lower(domain, &workdir)?,
            PipelineStage::VariationalAssimilation => self.prepare_wrfvar(domain, &workdir)?,
            PipelineStage::BiasCorrection => require(&workdir.join(ANALYSIS))?,
            PipelineStage::BoundaryUpdateLateral => self.prepare_lateral(domain, &workdir)?,
            PipelineStage::ForecastIntegration => self.prepare_forecast(&workdir)?,
        }
        debug!(domain = %domain, stage = %stage, workdir = %workdir.display(), "Prepared");
        Ok(workdir)
    }

    /// Move the outputs of a finished `stage` to where they are consumed.
    pub fn promote(&self, domain: DomainId, stage: PipelineStage) -> Result<(), StagingError> {
        let workdir = self.workdir(domain, stage);
        match stage {
            PipelineStage::ObservationPreprocess => {
                expect_output(&self.layout.obsproc_output(&self.analysis))
            }
            PipelineStage::BoundaryUpdateLower => self.promote_lower(domain, &workdir),
            PipelineStage::VariationalAssimilation => expect_output(&workdir.join(ANALYSIS)),
            PipelineStage::BoundaryUpdateLateral => self.promote_lateral(&workdir),
            PipelineStage::BiasCorrection | PipelineStage::ForecastIntegration => Ok(()),
        }
    }

    /// Replace the domain's initial conditions with the cycle's analysis, or
    /// with the boundary-updated first guess when `low_only` is set.
    pub fn promote_analysis(&self, domain: DomainId, low_only: bool) -> Result<(), StagingError> {
        let workdir = self.layout.wrfda_dir(domain);
        let source = if low_only {
            workdir.join(FIRST_GUESS)
        } else {
            workdir.join(ANALYSIS)
        };
        let destination = self.layout.wrfinput(domain);
        promote_copy(&source, &destination)?;
        info!(domain = %domain, source = %source.display(), "Promoted initial conditions");
        Ok(())
    }

    /// Replace the domain's initial conditions with the preserved first guess.
    pub fn restore_first_guess(&self, domain: DomainId) -> Result<(), StagingError> {
        let preserved = self.layout.preserved_first_guess(domain);
        promote_copy(&preserved, &self.layout.wrfinput(domain))?;
        info!(domain = %domain, "Restored first guess as initial conditions");
        Ok(())
    }

    fn prepare_obsproc(&self, workdir: &Path) -> Result<(), StagingError> {
        recreate_dir(workdir)?;
        let tables = self.wrfda_dir.join(OBSPROC_DIR);
        let mut manifest = StagingManifest::new();
        for table in OBSPROC_TABLES {
            manifest = manifest.symlink(tables.join(table), workdir.join(table));
        }
        manifest
            .symlink(self.wrfda_dir.join(OBSPROC_EXE), workdir.join("obsproc.exe"))
            .copy(
                self.obs_dir.join(&self.obs_filename),
                workdir.join(&self.obs_filename),
            )
            .apply()?;

        let template = self.wrfda_dir.join(OBSPROC_NAMELIST_TEMPLATE);
        let mut obsproc = Namelist::read(&template)?;
        let forecast = Namelist::read(&self.forecast_template()?)?;
        sync_obsproc(&mut obsproc, &forecast, self.analysis, &self.obs_filename)?;
        obsproc.write(&workdir.join(OBSPROC_NAMELIST))?;
        Ok(())
    }

    fn prepare_lower(&self, domain: DomainId, workdir: &Path) -> Result<(), StagingError> {
        recreate_dir(workdir)?;
        let cycled = self.layout.cycled_first_guess(domain, &self.analysis);
        let first_guess = if cycled.is_file() {
            cycled
        } else {
            self.layout.wrfinput(domain)
        };
        StagingManifest::new()
            .symlink(
                self.wrfda_dir.join(DA_UPDATE_BC_EXE),
                workdir.join("da_update_bc.exe"),
            )
            .copy(self.layout.boundary(), workdir.join(BOUNDARY))
            .copy(&first_guess, workdir.join(FIRST_GUESS))
            .apply()?;

        let control = update_bc_control(
            BoundaryKind::Lower,
            domain,
            workdir,
            &self.layout.wrfinput(domain),
        );
        control.write(&workdir.join(UPDATE_BC_CONTROL))?;
        debug!(domain = %domain, first_guess = %first_guess.display(), "Staged first guess");
        Ok(())
    }

    fn prepare_wrfvar(&self, domain: DomainId, workdir: &Path) -> Result<(), StagingError> {
        require(&workdir.join(FIRST_GUESS))?;
        silent_remove(&workdir.join(ANALYSIS))?;
        silent_remove(&workdir.join(STATISTICS))?;
        silent_remove(&workdir.join(RADAR_OBSERVATIONS))?;
        remove_prefixed(workdir, "rsl.")?;

        let (cv_options, be_dat) = self.background_error();
        let mut manifest = StagingManifest::new()
            .symlink(self.wrfda_dir.join(DA_WRFVAR_EXE), workdir.join("da_wrfvar.exe"))
            .symlink(be_dat, workdir.join(BACKGROUND_ERROR))
            .symlink(self.wrfda_dir.join(LANDUSE_TBL), workdir.join(LANDUSE_TABLE))
            .symlink(
                self.layout.obsproc_output(&self.analysis),
                workdir.join(OBSERVATIONS),
            );
        if let (true, Some(radar)) = (domain.is_outer(), &self.radar_file) {
            manifest = manifest.copy(radar, workdir.join(RADAR_OBSERVATIONS));
        }
        manifest.apply()?;

        let mut da = Namelist::read(&self.da_template)?;
        let forecast = Namelist::read(&self.forecast_template()?)?;
        sync_wrfda(&mut da, &forecast, domain.get(), self.analysis, cv_options)?;
        da.write(&workdir.join(DA_NAMELIST))?;
        Ok(())
    }

    fn prepare_lateral(&self, domain: DomainId, workdir: &Path) -> Result<(), StagingError> {
        require(&workdir.join(BOUNDARY))?;
        require(&workdir.join(ANALYSIS))?;
        let control = update_bc_control(
            BoundaryKind::Lateral,
            domain,
            workdir,
            &self.layout.wrfinput(domain),
        );
        control.write(&workdir.join(UPDATE_BC_CONTROL))?;
        Ok(())
    }

    fn prepare_forecast(&self, run_dir: &Path) -> Result<(), StagingError> {
        let wrf_exe = self.wrf_dir.join(WRF_EXE);
        require(&wrf_exe)?;
        replace_symlink(&wrf_exe, &run_dir.join("wrf.exe"))?;

        let mut forecast = Namelist::read(&self.forecast_template()?)?;
        sync_time_control(
            &mut forecast,
            self.analysis,
            self.forecast_end,
            self.boundary_interval,
        )?;
        forecast.write(&run_dir.join(DA_NAMELIST))?;
        Ok(())
    }

    fn promote_lower(&self, domain: DomainId, workdir: &Path) -> Result<(), StagingError> {
        let first_guess = workdir.join(FIRST_GUESS);
        promote_copy(&first_guess, &self.layout.preserved_first_guess(domain))?;

        let control = da_control(
            domain,
            &self.analysis,
            &first_guess,
            &self.layout.wrfinput(domain),
        );
        control.write(&workdir.join(DA_CONTROL))?;
        Ok(())
    }

    fn promote_lateral(&self, workdir: &Path) -> Result<(), StagingError> {
        promote_copy(&workdir.join(BOUNDARY), &self.layout.boundary())?;

        let stamp = model_time(&self.analysis);
        let diagnostics = [
            (RSL_OUT, format!("wrfda_rsl_out_{stamp}")),
            (STATISTICS, format!("wrfda_statistics_{stamp}")),
        ];
        let mut manifest = StagingManifest::new();
        for (name, target) in diagnostics {
            let source = workdir.join(name);
            if source.is_file() {
                manifest = manifest.rename(source, self.layout.run_dir().join(target));
            } else {
                debug!(path = %source.display(), "No assimilation diagnostics to keep");
            }
        }
        if let Err(e) = manifest.apply() {
            debug!(error = %e, "Failed to keep assimilation diagnostics");
        }
        Ok(())
    }
}

fn require(path: &Path) -> Result<(), StagingError> {
    if path.exists() {
        Ok(())
    } else {
        Err(StagingError::MissingSource {
            path: path.to_path_buf(),
        })
    }
}

fn expect_output(path: &Path) -> Result<(), StagingError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(StagingError::MissingOutput {
            path: path.to_path_buf(),
        })
    }
}
