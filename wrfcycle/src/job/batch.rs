//! Batch backend for SLURM-style schedulers.
//!
//! Submission runs `sbatch [--dependency=afterok:<id> --kill-on-invalid-dep=yes] <script>`
//! in the job's working directory and takes the last token of stdout as the
//! job id. The scheduler cancels a dependent job whose dependency fails.
//!
//! Completion is observed in two steps. The active-job query (`squeue`) is
//! polled until the job is no longer listed; leaving the queue says nothing
//! about success, so the outcome is then read from the accounting records
//! (`sacct`). A job whose accounting never yields a classifiable state is
//! reported as failed.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    BackendKind, CommandRunner, CommandSpec, JobBackend, JobError, JobHandle, JobId, JobOutcome,
    JobRequest, SystemCommandRunner,
};
use crate::config::SchedulerSettings;

/// Accounting states that mean the job did not succeed.
const FAILURE_STATES: [&str; 9] = [
    "CANCELLED",
    "CANCELED",
    "FAILED",
    "TIMEOUT",
    "NODE_FAIL",
    "OUT_OF_MEMORY",
    "BOOT_FAIL",
    "DEADLINE",
    "PREEMPTED",
];

/// Accounting states of a job that is still queued or running.
const ACTIVE_STATES: [&str; 8] = [
    "PENDING",
    "RUNNING",
    "REQUEUED",
    "RESIZING",
    "SUSPENDED",
    "CONFIGURING",
    "COMPLETING",
    "STOPPED",
];

/// Accounting queries without a classifiable state before giving up.
pub const DEFAULT_ACCOUNTING_ATTEMPTS: u32 = 10;

/// Scheduler commands and polling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    pub submit_command: String,
    pub queue_command: String,
    pub accounting_command: String,
    pub poll_interval: Duration,
    pub accounting_attempts: u32,
}

impl From<&SchedulerSettings> for BatchSettings {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            submit_command: settings.submit_command.clone(),
            queue_command: settings.queue_command.clone(),
            accounting_command: settings.accounting_command.clone(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            accounting_attempts: DEFAULT_ACCOUNTING_ATTEMPTS,
        }
    }
}

/// What the accounting records say about a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountingState {
    Succeeded,
    /// Carries the first failure state seen.
    Failed(String),
    /// Still queued or running (e.g. requeued).
    Active,
    /// No recognizable state, usually because the record is not written yet.
    Unknown,
}

/// Extract the job id from a submission response.
pub fn parse_submission(stdout: &str) -> Option<u64> {
    stdout.split_whitespace().last()?.parse().ok()
}

/// Whether the active-job query output lists `id`.
pub fn job_listed(stdout: &str, id: u64) -> bool {
    let id = id.to_string();
    stdout.lines().any(|line| {
        line.split_whitespace()
            .next()
            .is_some_and(|first| first == id || first.starts_with(&format!("{id}_")))
    })
}

/// Classify accounting output (one state per job step).
///
/// Any failed step fails the job. A job counts as succeeded only when every
/// recognizable state is `COMPLETED`.
pub fn classify_accounting(stdout: &str) -> AccountingState {
    let states: Vec<String> = stdout
        .split_whitespace()
        .map(|token| token.trim_end_matches('+').to_uppercase())
        .collect();

    if let Some(failed) = states
        .iter()
        .find(|s| FAILURE_STATES.contains(&s.as_str()))
    {
        return AccountingState::Failed(failed.clone());
    }
    if states.iter().any(|s| ACTIVE_STATES.contains(&s.as_str())) {
        return AccountingState::Active;
    }
    if states.iter().any(|s| s == "COMPLETED") {
        return AccountingState::Succeeded;
    }
    AccountingState::Unknown
}

/// Submits jobs to a batch scheduler and polls them to completion.
///
/// There is no built-in timeout: a job the scheduler never removes from the
/// queue is polled forever. Callers bound the wait.
#[derive(Debug)]
pub struct BatchBackend<R = SystemCommandRunner> {
    runner: R,
    settings: BatchSettings,
}

impl BatchBackend {
    pub fn new(settings: BatchSettings) -> Self {
        Self::with_runner(SystemCommandRunner, settings)
    }
}

impl<R: CommandRunner> BatchBackend<R> {
    pub fn with_runner(runner: R, settings: BatchSettings) -> Self {
        Self { runner, settings }
    }

    async fn is_active(&self, id: u64) -> Result<bool, JobError> {
        let spec = CommandSpec::new(&self.settings.queue_command)
            .arg("-h")
            .arg("-j")
            .arg(id.to_string())
            .arg("-o")
            .arg("%i")
            .capture();
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            // squeue rejects ids it has already purged
            debug!(id, stderr = %output.stderr.trim(), "Queue query failed, treating job as inactive");
            return Ok(false);
        }
        Ok(job_listed(&output.stdout, id))
    }

    async fn accounting_state(&self, id: u64) -> Result<AccountingState, JobError> {
        let spec = CommandSpec::new(&self.settings.accounting_command)
            .arg("-n")
            .arg("-j")
            .arg(id.to_string())
            .arg("--format=state")
            .capture();
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            debug!(id, stderr = %output.stderr.trim(), "Accounting query failed");
            return Ok(AccountingState::Unknown);
        }
        Ok(classify_accounting(&output.stdout))
    }
}

impl<R: CommandRunner> JobBackend for BatchBackend<R> {
    async fn submit(
        &self,
        request: &JobRequest,
        depends_on: Option<&JobHandle>,
    ) -> Result<JobHandle, JobError> {
        let script = request
            .script
            .as_ref()
            .ok_or_else(|| JobError::MissingExecutable {
                name: request.name.clone(),
                path: request.program.clone(),
            })?;
        if !script.is_file() {
            return Err(JobError::MissingExecutable {
                name: request.name.clone(),
                path: script.clone(),
            });
        }

        let mut spec = CommandSpec::new(&self.settings.submit_command)
            .current_dir(&request.workdir)
            .capture();
        if let Some(dep) = depends_on {
            match (dep.kind(), dep.known_outcome()) {
                (_, Some(JobOutcome::Failed)) => {
                    warn!(
                        job = %request.name,
                        dependency = %dep.id(),
                        "Dependency failed, not submitting job"
                    );
                    return Ok(JobHandle::skipped(&request.name));
                }
                (BackendKind::Batch, None) => {
                    spec = spec
                        .arg(format!("--dependency=afterok:{}", dep.id()))
                        .arg("--kill-on-invalid-dep=yes");
                }
                // finished successfully: nothing to wait for
                _ => {}
            }
        }
        spec = spec.arg(script.display().to_string());

        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(JobError::SubmissionRejected {
                name: request.name.clone(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        let id = parse_submission(&output.stdout).ok_or_else(|| JobError::UnparseableSubmission {
            output: output.stdout.trim().to_string(),
        })?;

        info!(
            job = %request.name,
            id,
            script = %script.display(),
            workdir = %request.workdir.display(),
            "Submitted batch job"
        );
        Ok(JobHandle::pending(JobId::new(id), &request.name))
    }

    async fn await_completion(&self, handle: JobHandle) -> Result<JobOutcome, JobError> {
        if let Some(outcome) = handle.known_outcome() {
            return Ok(outcome);
        }
        if handle.kind() != BackendKind::Batch {
            return Err(JobError::ForeignHandle {
                kind: handle.kind(),
                id: handle.id().value(),
            });
        }

        let id = handle.id().value();
        let mut unclassified = 0;
        loop {
            tokio::time::sleep(self.settings.poll_interval).await;
            if self.is_active(id).await? {
                continue;
            }

            match self.accounting_state(id).await? {
                AccountingState::Succeeded => {
                    info!(job = %handle.name(), id, "Batch job completed");
                    return Ok(JobOutcome::Succeeded);
                }
                AccountingState::Failed(state) => {
                    warn!(job = %handle.name(), id, state = %state, "Batch job failed");
                    return Ok(JobOutcome::Failed);
                }
                AccountingState::Active => {
                    debug!(id, "Job left the queue but accounting reports it active");
                }
                AccountingState::Unknown => {
                    unclassified += 1;
                    if unclassified >= self.settings.accounting_attempts {
                        warn!(
                            job = %handle.name(),
                            id,
                            attempts = unclassified,
                            "No accounting state for finished job, treating as failed"
                        );
                        return Ok(JobOutcome::Failed);
                    }
                }
            }
        }
    }
}
