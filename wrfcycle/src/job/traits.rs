//! Backend and command runner abstractions.
//!
//! [`JobBackend`] is the only contract the orchestrator sees. Backends that
//! shell out do so through a [`CommandRunner`], so scheduler polling can be
//! driven by canned output in tests.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{JobError, JobHandle, JobOutcome, JobRequest};

/// Executes stage commands and reports their outcome.
pub trait JobBackend: Send + Sync {
    /// Start a job. When `depends_on` is given, the job only runs after that
    /// job has succeeded.
    fn submit(
        &self,
        request: &JobRequest,
        depends_on: Option<&JobHandle>,
    ) -> impl Future<Output = Result<JobHandle, JobError>> + Send;

    /// Wait for a job to finish. Consumes the handle.
    fn await_completion(
        &self,
        handle: JobHandle,
    ) -> impl Future<Output = Result<JobOutcome, JobError>> + Send;
}

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    /// Collect stdout/stderr; otherwise both are discarded.
    pub capture: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            capture: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.workdir = Some(dir.to_path_buf());
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Program file name, for matching in fakes and logs.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// Result of running a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs external programs.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> impl Future<Output = Result<CommandOutput, JobError>> + Send;
}

/// Wait for `handle`, giving up after `limit`.
///
/// Returns `None` when the limit passed first. The job itself is left
/// alone; nothing is cancelled.
pub async fn await_with_timeout<B: JobBackend>(
    backend: &B,
    handle: JobHandle,
    limit: Option<Duration>,
) -> Result<Option<JobOutcome>, JobError> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, backend.await_completion(handle)).await {
            Ok(outcome) => outcome.map(Some),
            Err(_) => Ok(None),
        },
        None => backend.await_completion(handle).await.map(Some),
    }
}
