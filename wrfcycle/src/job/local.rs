//! Local backend: runs each job to completion at submission.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};

use super::{
    BackendKind, CommandRunner, CommandSpec, JobBackend, JobError, JobHandle, JobId, JobOutcome,
    JobRequest, SystemCommandRunner,
};

/// Runs jobs synchronously inside their working directory.
///
/// `submit` returns once the process has exited; awaiting the handle only
/// reports the recorded outcome.
#[derive(Debug)]
pub struct LocalBackend<R = SystemCommandRunner> {
    runner: R,
    next_id: AtomicU64,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::with_runner(SystemCommandRunner)
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> LocalBackend<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> JobId {
        JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl<R: CommandRunner> JobBackend for LocalBackend<R> {
    async fn submit(
        &self,
        request: &JobRequest,
        depends_on: Option<&JobHandle>,
    ) -> Result<JobHandle, JobError> {
        if !request.program.is_file() {
            return Err(JobError::MissingExecutable {
                name: request.name.clone(),
                path: request.program.clone(),
            });
        }

        let id = self.next_id();
        if let Some(dep) = depends_on {
            if dep.known_outcome() == Some(JobOutcome::Failed) {
                warn!(
                    job = %request.name,
                    dependency = %dep.id(),
                    "Dependency failed, not running job"
                );
                return Ok(JobHandle::finished(BackendKind::Local, id, &request.name, JobOutcome::Failed));
            }
        }

        info!(
            job = %request.name,
            id = %id,
            workdir = %request.workdir.display(),
            "Running job locally"
        );

        let mut spec = CommandSpec::new(&request.program).current_dir(&request.workdir);
        if request.capture_output {
            spec = spec.capture();
        }
        let output = self.runner.run(&spec).await?;

        let outcome = if output.success() {
            JobOutcome::Succeeded
        } else {
            warn!(
                job = %request.name,
                status = ?output.status,
                stderr = last_line(&output.stderr),
                "Local job failed"
            );
            JobOutcome::Failed
        };
        Ok(JobHandle::finished(BackendKind::Local, id, &request.name, outcome))
    }

    async fn await_completion(&self, handle: JobHandle) -> Result<JobOutcome, JobError> {
        match (handle.kind(), handle.known_outcome()) {
            (_, Some(outcome)) => Ok(outcome),
            (kind, None) => Err(JobError::ForeignHandle {
                kind,
                id: handle.id().value(),
            }),
        }
    }
}

/// Last non-blank line of captured output, empty when nothing was kept.
fn last_line(output: &str) -> &str {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}
