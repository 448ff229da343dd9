//! Job handles, requests and outcomes.

use std::fmt;
use std::path::PathBuf;

/// Which backend a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Ran to completion in-process.
    Local,
    /// Submitted to the batch scheduler.
    Batch,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Batch => write!(f, "batch"),
        }
    }
}

/// Job identifier: a local sequence number or a scheduler job id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl JobId {
    /// Id of a job that was never handed to a backend.
    pub const UNSUBMITTED: JobId = JobId(0);

    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Numeric value of the identifier.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final outcome of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Succeeded => write!(f, "succeeded"),
            JobOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Handle to a submitted job.
///
/// Only backends create handles. A handle is consumed by
/// [`JobBackend::await_completion`](super::JobBackend::await_completion), so
/// it cannot be awaited twice. Not `Clone`.
#[derive(Debug, PartialEq, Eq)]
pub struct JobHandle {
    kind: BackendKind,
    id: JobId,
    name: String,
    outcome: Option<JobOutcome>,
}

impl JobHandle {
    /// Handle for a job whose outcome is already known.
    pub(crate) fn finished(kind: BackendKind, id: JobId, name: &str, outcome: JobOutcome) -> Self {
        Self {
            kind,
            id,
            name: name.to_string(),
            outcome: Some(outcome),
        }
    }

    /// Handle for a job that was never started because its dependency
    /// failed. It reports `Failed` and carries [`JobId::UNSUBMITTED`].
    pub(crate) fn skipped(name: &str) -> Self {
        Self::finished(BackendKind::Local, JobId::UNSUBMITTED, name, JobOutcome::Failed)
    }

    /// Handle for a job still queued or running on the scheduler.
    pub(crate) fn pending(id: JobId, name: &str) -> Self {
        Self {
            kind: BackendKind::Batch,
            id,
            name: name.to_string(),
            outcome: None,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Executable name the job was submitted for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Outcome, when known without waiting.
    pub(crate) fn known_outcome(&self) -> Option<JobOutcome> {
        self.outcome
    }
}

/// A command to run for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Executable name, e.g. `da_wrfvar.exe`.
    pub name: String,
    /// Executable to run locally.
    pub program: PathBuf,
    /// Job script for the batch scheduler; `None` runs locally.
    pub script: Option<PathBuf>,
    /// Working directory.
    pub workdir: PathBuf,
    /// Keep stdout/stderr instead of discarding them.
    pub capture_output: bool,
}

impl JobRequest {
    /// Creates a local request.
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            script: None,
            workdir: workdir.into(),
            capture_output: false,
        }
    }

    /// Sets the batch job script.
    pub fn with_script(mut self, script: Option<PathBuf>) -> Self {
        self.script = script;
        self
    }

    /// Keeps the command's output.
    pub fn with_captured_output(mut self) -> Self {
        self.capture_output = true;
        self
    }
}
