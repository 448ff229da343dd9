//! Cycle orchestration.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::report::{CycleOutcome, CycleReport, PlannedStage, PromotionKind};
use super::{Cycle, CycleError, DomainId, PipelineStage, StageFailure};
use crate::bias::{BiasCorrector, NoBiasCorrection};
use crate::config::ConfigFile;
use crate::job::{await_with_timeout, BackendKind, JobBackend, JobHandle, JobOutcome, JobRequest};
use crate::namelist::{Namelist, NamelistError};
use crate::retry::{ForecastReport, ForecastRunner};
use crate::staging::layout::ANALYSIS;
use crate::staging::DomainStaging;

/// A submitted chained-mode job awaiting collection.
type ChainedJob = (PipelineStage, DomainId, JobHandle);

/// Number of domains a cycle covers: `[cycle] domains` when set, otherwise
/// `max_dom` from the forecast namelist.
pub fn configured_domains(config: &ConfigFile) -> Result<usize, NamelistError> {
    if let Some(domains) = config.cycle.domains {
        return Ok(domains);
    }
    let forecast = Namelist::read(&config.forecast_namelist())?;
    let max_dom = forecast.get_int("domains", "max_dom")?;
    usize::try_from(max_dom)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| NamelistError::InvalidValue {
            group: "domains".to_string(),
            key: "max_dom".to_string(),
            value: max_dom.to_string(),
            reason: "must be a positive integer".to_string(),
        })
}

/// Drives the stages of one cycle over all domains.
///
/// The analysis runs observation preprocessing once, then per domain the
/// lower boundary update and the variational assimilation, then bias
/// correction, the lateral boundary update of domain 1, and finally promotes
/// every domain's analysis into the run directory. The forecast follows,
/// with retries.
pub struct CycleOrchestrator<'a, B, C = NoBiasCorrection> {
    config: &'a ConfigFile,
    cycle: Cycle,
    backend: &'a B,
    bias: C,
    staging: DomainStaging,
    low_only: bool,
}

impl<'a, B: JobBackend> CycleOrchestrator<'a, B> {
    pub fn new(config: &'a ConfigFile, cycle: Cycle, backend: &'a B) -> Self {
        let staging = DomainStaging::new(config, &cycle);
        Self {
            config,
            cycle,
            backend,
            bias: NoBiasCorrection,
            staging,
            low_only: config.assimilation.low_only,
        }
    }
}

impl<'a, B: JobBackend, C: BiasCorrector> CycleOrchestrator<'a, B, C> {
    pub fn with_bias_corrector<D: BiasCorrector>(self, bias: D) -> CycleOrchestrator<'a, B, D> {
        CycleOrchestrator {
            config: self.config,
            cycle: self.cycle,
            backend: self.backend,
            bias,
            staging: self.staging,
            low_only: self.low_only,
        }
    }

    /// Only update the lower boundary and start the forecast from the
    /// updated first guess.
    pub fn low_only(mut self, low_only: bool) -> Self {
        self.low_only = low_only;
        self
    }

    pub fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    pub fn staging(&self) -> &DomainStaging {
        &self.staging
    }

    /// Run the analysis and then the forecast.
    pub async fn run(&self) -> Result<CycleReport, CycleError> {
        let mut report = self.run_analysis().await?;
        let forecast = self.run_forecast(&mut report).await?;
        report.outcome = Some(if self.low_only || forecast.used_fallback() {
            CycleOutcome::CompletedWithoutAssimilation
        } else {
            CycleOutcome::CompletedWithAssimilation
        });
        Ok(report)
    }

    /// Run the analysis stages and promote the results into the run
    /// directory.
    pub async fn run_analysis(&self) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();
        info!(
            start = %self.cycle.start(),
            domains = self.cycle.domains().len(),
            low_only = self.low_only,
            "Starting analysis"
        );

        if !self.low_only {
            self.run_stage(&mut report, PipelineStage::ObservationPreprocess, DomainId::OUTER)
                .await?;
        }

        if self.config.cycle.chain_domains && !self.low_only {
            self.run_chained(&mut report).await?;
        } else {
            for &domain in self.cycle.domains() {
                self.run_stage(&mut report, PipelineStage::BoundaryUpdateLower, domain)
                    .await?;
                self.record_first_guess(&mut report, domain);
            }
            if !self.low_only {
                for &domain in self.cycle.domains() {
                    self.run_stage(&mut report, PipelineStage::VariationalAssimilation, domain)
                        .await?;
                }
            }
        }

        if !self.low_only {
            self.correct_bias(&mut report).await;
            self.run_stage(&mut report, PipelineStage::BoundaryUpdateLateral, DomainId::OUTER)
                .await?;
            report.record_promotion(
                PromotionKind::LateralBoundary,
                DomainId::OUTER,
                self.staging.layout().boundary(),
            );
        }

        for &domain in self.cycle.domains() {
            self.staging
                .promote_analysis(domain, self.low_only)
                .map_err(|e| self.error(PipelineStage::VariationalAssimilation, Some(domain), e))?;
            report.record_promotion(
                PromotionKind::InitialConditions,
                domain,
                self.staging.layout().wrfinput(domain),
            );
        }
        info!(promotions = report.promotions.len(), "Analysis complete");
        Ok(report)
    }

    /// Run the forecast with retries, recording its runs in `report`.
    pub async fn run_forecast(&self, report: &mut CycleReport) -> Result<ForecastReport, CycleError> {
        let timeout = self.stage_timeout();
        let forecast = ForecastRunner::new(
            self.backend,
            &self.staging,
            self.cycle.domains(),
            &self.config.retry.table,
        )
        .with_script(self.script(PipelineStage::ForecastIntegration))
        .check_restart(self.config.forecast.check_restart)
        .with_timeout(timeout)
        .run()
        .await;

        let forecast = forecast?;
        for attempt in &forecast.attempts {
            report.record_run(PipelineStage::ForecastIntegration, None, attempt.outcome);
            if let Some(run) = report.runs.last_mut() {
                run.retry = Some(attempt.state);
            }
        }
        for (domain, destination) in &forecast.restored {
            report.record_promotion(
                PromotionKind::FallbackInitialConditions,
                *domain,
                destination.clone(),
            );
        }
        Ok(forecast)
    }

    /// Stages the analysis would run, without touching the filesystem.
    pub fn plan(&self, include_forecast: bool) -> Vec<PlannedStage> {
        let mut plan = Vec::new();
        let mut add = |stage: PipelineStage, domain: DomainId| {
            plan.push(PlannedStage {
                stage,
                domain: stage.is_per_domain().then_some(domain),
                workdir: self.staging.workdir(domain, stage),
                backend: self.backend_kind(stage),
            });
        };

        if !self.low_only {
            add(PipelineStage::ObservationPreprocess, DomainId::OUTER);
        }
        for &domain in self.cycle.domains() {
            add(PipelineStage::BoundaryUpdateLower, domain);
        }
        if !self.low_only {
            for &domain in self.cycle.domains() {
                add(PipelineStage::VariationalAssimilation, domain);
            }
            if self.config.bias_correction.command.is_some() {
                for &domain in self.cycle.domains() {
                    add(PipelineStage::BiasCorrection, domain);
                }
            }
            add(PipelineStage::BoundaryUpdateLateral, DomainId::OUTER);
        }
        if include_forecast {
            add(PipelineStage::ForecastIntegration, DomainId::OUTER);
        }
        plan
    }

    /// Submit the boundary update and the assimilation of every domain
    /// up front, each assimilation depending on its domain's update, then
    /// collect the results in domain order.
    ///
    /// On the first failure, every job already submitted is waited for
    /// before the error is returned.
    async fn run_chained(&self, report: &mut CycleReport) -> Result<(), CycleError> {
        let mut pending = VecDeque::with_capacity(2 * self.cycle.domains().len());
        if let Err(e) = self.submit_chains(&mut pending).await {
            self.drain(pending).await;
            return Err(e);
        }

        while let Some((stage, domain, handle)) = pending.pop_front() {
            if let Err(e) = self.finish(report, stage, domain, handle).await {
                self.drain(pending).await;
                return Err(e);
            }
            if stage == PipelineStage::BoundaryUpdateLower {
                self.record_first_guess(report, domain);
            }
        }
        Ok(())
    }

    async fn submit_chains(&self, pending: &mut VecDeque<ChainedJob>) -> Result<(), CycleError> {
        for &domain in self.cycle.domains() {
            let lower_dir = self.prepare(PipelineStage::BoundaryUpdateLower, domain)?;
            let lower = self
                .submit(PipelineStage::BoundaryUpdateLower, domain, &lower_dir, None)
                .await?;
            pending.push_back((PipelineStage::BoundaryUpdateLower, domain, lower));

            let wrfvar_dir = self.prepare(PipelineStage::VariationalAssimilation, domain)?;
            let lower = pending.back().map(|(_, _, handle)| handle);
            let wrfvar = self
                .submit(PipelineStage::VariationalAssimilation, domain, &wrfvar_dir, lower)
                .await?;
            pending.push_back((PipelineStage::VariationalAssimilation, domain, wrfvar));
        }
        Ok(())
    }

    /// Wait for chained jobs left behind by a failure. Their outcomes are
    /// only logged.
    async fn drain(&self, pending: VecDeque<ChainedJob>) {
        for (stage, domain, handle) in pending {
            match await_with_timeout(self.backend, handle, self.stage_timeout()).await {
                Ok(Some(outcome)) => {
                    debug!(stage = %stage, domain = %domain, outcome = ?outcome, "Chained job settled")
                }
                Ok(None) => warn!(stage = %stage, domain = %domain, "Chained job still running"),
                Err(e) => warn!(stage = %stage, domain = %domain, error = %e, "Could not wait for chained job"),
            }
        }
    }

    /// Bias-correct every domain, outermost first. Failures are logged and
    /// leave the analysis uncorrected.
    async fn correct_bias(&self, report: &mut CycleReport) {
        for &domain in self.cycle.domains() {
            let analysis = self.staging.layout().wrfda_dir(domain).join(ANALYSIS);
            if let Err(e) = self
                .bias
                .correct(domain, self.cycle.start(), &analysis)
                .await
            {
                warn!(domain = %domain, error = %e, "Bias correction failed, keeping uncorrected analysis");
                report
                    .warnings
                    .push(format!("bias correction for {domain}: {e}"));
            }
        }
    }

    async fn run_stage(
        &self,
        report: &mut CycleReport,
        stage: PipelineStage,
        domain: DomainId,
    ) -> Result<(), CycleError> {
        let workdir = self.prepare(stage, domain)?;
        let handle = self.submit(stage, domain, &workdir, None).await?;
        self.finish(report, stage, domain, handle).await
    }

    fn prepare(&self, stage: PipelineStage, domain: DomainId) -> Result<PathBuf, CycleError> {
        self.staging
            .prepare(domain, stage)
            .map_err(|e| self.error(stage, Some(domain), e))
    }

    async fn submit(
        &self,
        stage: PipelineStage,
        domain: DomainId,
        workdir: &Path,
        depends_on: Option<&JobHandle>,
    ) -> Result<JobHandle, CycleError> {
        let request = JobRequest::new(stage.executable(), workdir.join(stage.executable()), workdir)
            .with_script(self.script(stage))
            .with_captured_output();
        info!(stage = %stage, domain = %domain, "Submitting");
        self.backend
            .submit(&request, depends_on)
            .await
            .map_err(|e| self.error(stage, Some(domain), e))
    }

    /// Wait for a stage's job and promote its outputs.
    async fn finish(
        &self,
        report: &mut CycleReport,
        stage: PipelineStage,
        domain: DomainId,
        handle: JobHandle,
    ) -> Result<(), CycleError> {
        let timeout = self.stage_timeout();
        let outcome = await_with_timeout(self.backend, handle, timeout)
            .await
            .map_err(|e| self.error(stage, Some(domain), e))?;
        let Some(outcome) = outcome else {
            report.record_run(stage, self.domain_of(stage, domain), JobOutcome::Failed);
            let limit = timeout.unwrap_or_default();
            return Err(self.error(stage, Some(domain), StageFailure::TimedOut(limit)));
        };

        report.record_run(stage, self.domain_of(stage, domain), outcome);
        if !outcome.is_success() {
            return Err(self.error(stage, Some(domain), StageFailure::JobFailed));
        }
        self.staging
            .promote(domain, stage)
            .map_err(|e| self.error(stage, Some(domain), e))?;
        info!(stage = %stage, domain = %domain, "Stage complete");
        Ok(())
    }

    fn record_first_guess(&self, report: &mut CycleReport, domain: DomainId) {
        report.record_promotion(
            PromotionKind::PreservedFirstGuess,
            domain,
            self.staging.layout().preserved_first_guess(domain),
        );
    }

    /// Job script for `stage`; `None` runs the executable locally.
    fn script(&self, stage: PipelineStage) -> Option<PathBuf> {
        let scheduler = &self.config.scheduler;
        match stage {
            PipelineStage::ObservationPreprocess => scheduler.obsproc.clone(),
            PipelineStage::BoundaryUpdateLower | PipelineStage::BoundaryUpdateLateral => {
                scheduler.updatebc.clone()
            }
            PipelineStage::VariationalAssimilation => scheduler.wrfvar.clone(),
            PipelineStage::ForecastIntegration => scheduler.wrf.clone(),
            PipelineStage::BiasCorrection => None,
        }
    }

    fn backend_kind(&self, stage: PipelineStage) -> BackendKind {
        if self.script(stage).is_some() {
            BackendKind::Batch
        } else {
            BackendKind::Local
        }
    }

    fn stage_timeout(&self) -> Option<Duration> {
        self.config.cycle.stage_timeout_secs.map(Duration::from_secs)
    }

    fn domain_of(&self, stage: PipelineStage, domain: DomainId) -> Option<DomainId> {
        match stage {
            PipelineStage::ObservationPreprocess | PipelineStage::ForecastIntegration => None,
            _ => Some(domain),
        }
    }

    fn error(
        &self,
        stage: PipelineStage,
        domain: Option<DomainId>,
        kind: impl Into<StageFailure>,
    ) -> CycleError {
        let domain = domain.and_then(|d| self.domain_of(stage, d));
        let workdir = domain
            .map(|d| self.staging.workdir(d, stage))
            .unwrap_or_else(|| self.staging.workdir(DomainId::OUTER, stage));
        CycleError::new(stage, domain, workdir, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ScriptedBackend;
    use crate::staging::layout::BOUNDARY;
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use std::path::PathBuf;

    fn cycle(domains: usize) -> Cycle {
        let start = NaiveDate::from_ymd_opt(2014, 3, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        Cycle::new(start, ChronoDuration::hours(3), domains).unwrap()
    }

    fn config() -> ConfigFile {
        let mut config = ConfigFile::default();
        config.filesystem.work_dir = PathBuf::from("/work");
        config.filesystem.wrf_run_dir = PathBuf::from("/run");
        config
    }

    #[test]
    fn test_plan_lists_stages_in_order() {
        let config = config();
        let backend = ScriptedBackend::new();
        let orchestrator = CycleOrchestrator::new(&config, cycle(2), &backend);

        let stages: Vec<_> = orchestrator
            .plan(true)
            .into_iter()
            .map(|p| (p.stage, p.domain.map(|d| d.get())))
            .collect();
        assert_eq!(
            stages,
            vec![
                (PipelineStage::ObservationPreprocess, None),
                (PipelineStage::BoundaryUpdateLower, Some(1)),
                (PipelineStage::BoundaryUpdateLower, Some(2)),
                (PipelineStage::VariationalAssimilation, Some(1)),
                (PipelineStage::VariationalAssimilation, Some(2)),
                (PipelineStage::BoundaryUpdateLateral, None),
                (PipelineStage::ForecastIntegration, None),
            ]
        );
        assert!(backend.submissions().is_empty());
    }

    #[test]
    fn test_plan_marks_scripted_stages_as_batch() {
        let mut config = config();
        config.scheduler.wrfvar = Some(PathBuf::from("/jobs/wrfvar.sh"));
        let backend = ScriptedBackend::new();
        let orchestrator = CycleOrchestrator::new(&config, cycle(1), &backend);

        let plan = orchestrator.plan(false);
        let wrfvar = plan
            .iter()
            .find(|p| p.stage == PipelineStage::VariationalAssimilation)
            .unwrap();
        assert_eq!(wrfvar.backend, BackendKind::Batch);
        assert_eq!(wrfvar.workdir, PathBuf::from("/work/wrfda/d01"));
        assert_eq!(plan[0].backend, BackendKind::Local);
    }

    #[test]
    fn test_low_only_plan_skips_assimilation() {
        let config = config();
        let backend = ScriptedBackend::new();
        let orchestrator = CycleOrchestrator::new(&config, cycle(2), &backend).low_only(true);

        let plan = orchestrator.plan(false);
        assert_eq!(plan.len(), 2);
        assert!(plan
            .iter()
            .all(|p| p.stage == PipelineStage::BoundaryUpdateLower));
    }

    #[test]
    fn test_configured_domains_prefers_explicit_count() {
        let mut config = config();
        config.cycle.domains = Some(3);
        assert_eq!(configured_domains(&config).unwrap(), 3);
    }

    #[test]
    fn test_configured_domains_reads_max_dom() {
        let dir = tempfile::TempDir::new().unwrap();
        let namelist = dir.path().join("namelist.input");
        std::fs::write(&namelist, "&domains\n max_dom = 2,\n/\n").unwrap();
        let mut config = config();
        config.forecast.namelist = Some(namelist);
        assert_eq!(configured_domains(&config).unwrap(), 2);
    }

    #[test]
    fn test_boundary_constant_matches_layout() {
        assert!(DomainStaging::new(&config(), &cycle(1))
            .layout()
            .boundary()
            .ends_with(BOUNDARY));
    }
}
