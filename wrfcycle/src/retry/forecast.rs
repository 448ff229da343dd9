//! Forecast integration with relaxation retries and first-guess fallback.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info, warn};

use super::{RelaxationTable, RetryState};
use crate::cycle::{CycleError, DomainId, PipelineStage, StageFailure};
use crate::job::{await_with_timeout, JobBackend, JobOutcome, JobRequest};
use crate::namelist::sync::apply_relaxation;
use crate::namelist::Namelist;
use crate::staging::layout::DA_NAMELIST;
use crate::staging::{DomainStaging, StagingError};

/// Log line WRF writes to `rsl.error.0000` on a clean finish.
pub const SUCCESS_MARKER: &str = "SUCCESS COMPLETE WRF";

const RSL_ERROR: &str = "rsl.error.0000";
const NAMELIST_BACKUP: &str = "namelist.input.bak";

/// One forecast run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastAttempt {
    pub state: RetryState,
    pub outcome: JobOutcome,
}

/// Result of a forecast that eventually succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastReport {
    pub attempts: Vec<ForecastAttempt>,
    /// Files replaced to enter the fallback run.
    pub restored: Vec<(DomainId, PathBuf)>,
}

impl ForecastReport {
    /// State of the successful run.
    pub fn final_state(&self) -> RetryState {
        self.attempts
            .last()
            .map(|a| a.state)
            .unwrap_or(RetryState::INITIAL)
    }

    pub fn used_fallback(&self) -> bool {
        self.final_state().is_fallback()
    }
}

/// Runs `wrf.exe` in the run directory until it succeeds or every retry
/// state has been used.
pub struct ForecastRunner<'a, B> {
    backend: &'a B,
    staging: &'a DomainStaging,
    domains: &'a [DomainId],
    table: &'a RelaxationTable,
    script: Option<PathBuf>,
    check_restart: bool,
    timeout: Option<Duration>,
}

impl<'a, B: JobBackend> ForecastRunner<'a, B> {
    pub fn new(
        backend: &'a B,
        staging: &'a DomainStaging,
        domains: &'a [DomainId],
        table: &'a RelaxationTable,
    ) -> Self {
        Self {
            backend,
            staging,
            domains,
            table,
            script: None,
            check_restart: true,
            timeout: None,
        }
    }

    /// Submit through the batch scheduler with this job script.
    pub fn with_script(mut self, script: Option<PathBuf>) -> Self {
        self.script = script;
        self
    }

    /// Check `rsl.error.0000` after a reported success.
    pub fn check_restart(mut self, check: bool) -> Self {
        self.check_restart = check;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run(&self) -> Result<ForecastReport, CycleError> {
        let stage = PipelineStage::ForecastIntegration;
        let run_dir = self
            .staging
            .prepare(DomainId::OUTER, stage)
            .map_err(|e| self.error(e))?;

        let mut report = ForecastReport {
            attempts: Vec::new(),
            restored: Vec::new(),
        };
        let mut state = RetryState::INITIAL;
        loop {
            let outcome = self.run_once(&run_dir, state).await?;
            report.attempts.push(ForecastAttempt { state, outcome });
            if outcome.is_success() {
                info!(state = %state, "Forecast completed");
                return Ok(report);
            }

            match state.on_failure(self.table.len()) {
                Some(next @ RetryState::Attempt(_)) => {
                    warn!(failed = %state, next = %next, "Forecast failed, relaxing time step");
                    self.relax(&run_dir, next)?;
                    state = next;
                }
                Some(RetryState::Fallback) => {
                    warn!(failed = %state, "Relaxation table exhausted, falling back to first guess");
                    for &domain in self.domains {
                        self.staging
                            .restore_first_guess(domain)
                            .map_err(|e| self.error(e))?;
                        report
                            .restored
                            .push((domain, self.staging.layout().wrfinput(domain)));
                    }
                    state = RetryState::Fallback;
                }
                None => {
                    error!(attempts = report.attempts.len(), "Fallback forecast failed");
                    return Err(self.error(StageFailure::RetriesExhausted {
                        attempts: report.attempts.len(),
                    }));
                }
            }
        }
    }

    async fn run_once(&self, run_dir: &Path, state: RetryState) -> Result<JobOutcome, CycleError> {
        let stage = PipelineStage::ForecastIntegration;
        crate::staging::silent_remove(&run_dir.join(RSL_ERROR)).map_err(|e| self.error(e))?;

        let request = JobRequest::new(stage.executable(), run_dir.join(stage.executable()), run_dir)
            .with_script(self.script.clone());
        info!(state = %state, run_dir = %run_dir.display(), "Starting forecast");
        let handle = self
            .backend
            .submit(&request, None)
            .await
            .map_err(|e| self.error(e))?;

        let Some(outcome) = await_with_timeout(self.backend, handle, self.timeout)
            .await
            .map_err(|e| self.error(e))?
        else {
            let limit = self.timeout.unwrap_or_default();
            error!(state = %state, limit = ?limit, "Forecast did not finish in time, job left running");
            return Err(self.error(StageFailure::TimedOut(limit)));
        };

        if outcome.is_success() && self.check_restart && !clean_finish(run_dir) {
            warn!(state = %state, "Forecast reported success but rsl.error.0000 has no success marker");
            return Ok(JobOutcome::Failed);
        }
        Ok(outcome)
    }

    /// Write the relaxation entry `next` runs with into the run directory
    /// namelist, keeping the previous namelist as `namelist.input.bak`.
    fn relax(&self, run_dir: &Path, next: RetryState) -> Result<(), CycleError> {
        let Some((n, entry)) = next
            .relaxation_entry()
            .and_then(|n| self.table.entry(n).map(|entry| (n, entry)))
        else {
            return Ok(());
        };
        let namelist_path = run_dir.join(DA_NAMELIST);
        let backup = run_dir.join(NAMELIST_BACKUP);
        fs::copy(&namelist_path, &backup)
            .map_err(|e| self.error(StagingError::io("back up", &namelist_path, e)))?;

        let mut namelist = Namelist::read(&namelist_path).map_err(|e| self.error(e))?;
        apply_relaxation(&mut namelist, entry.time_step, &entry.parent_time_step_ratio);
        namelist.write(&namelist_path).map_err(|e| self.error(e))?;
        info!(
            entry = n,
            time_step = entry.time_step,
            ratio = ?entry.parent_time_step_ratio,
            "Applied relaxation"
        );
        Ok(())
    }

    fn error(&self, kind: impl Into<StageFailure>) -> CycleError {
        CycleError::new(
            PipelineStage::ForecastIntegration,
            None,
            self.staging.layout().run_dir(),
            kind,
        )
    }
}

/// Whether a finished run left a clean `rsl.error.0000`.
///
/// A missing log counts as clean: not every launcher writes one.
pub fn clean_finish(run_dir: &Path) -> bool {
    match fs::read(run_dir.join(RSL_ERROR)) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).contains(SUCCESS_MARKER),
        Err(e) => e.kind() == std::io::ErrorKind::NotFound,
    }
}
