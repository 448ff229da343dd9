//! Per-request backend selection.

use super::{
    BackendKind, BatchBackend, BatchSettings, CommandRunner, JobBackend, JobError, JobHandle,
    JobOutcome, JobRequest, LocalBackend, SystemCommandRunner,
};

/// Sends requests with a job script to the batch scheduler and runs the
/// rest locally.
///
/// Each stage is configured independently, so a cycle can run
/// observation preprocessing locally and the assimilation through the
/// scheduler.
#[derive(Debug)]
pub struct RoutingBackend<R = SystemCommandRunner> {
    local: LocalBackend<R>,
    batch: BatchBackend<R>,
}

impl RoutingBackend {
    pub fn new(settings: BatchSettings) -> Self {
        Self::with_runner(SystemCommandRunner, settings)
    }
}

impl<R: CommandRunner + Clone> RoutingBackend<R> {
    pub fn with_runner(runner: R, settings: BatchSettings) -> Self {
        Self {
            local: LocalBackend::with_runner(runner.clone()),
            batch: BatchBackend::with_runner(runner, settings),
        }
    }
}

impl<R: CommandRunner + Clone> JobBackend for RoutingBackend<R> {
    async fn submit(
        &self,
        request: &JobRequest,
        depends_on: Option<&JobHandle>,
    ) -> Result<JobHandle, JobError> {
        if request.script.is_some() {
            return self.batch.submit(request, depends_on).await;
        }
        match depends_on {
            Some(dep) if dep.kind() == BackendKind::Batch && dep.known_outcome().is_none() => {
                // the scheduler cannot hold a local job, so wait here
                let pending = JobHandle::pending(dep.id(), dep.name());
                let outcome = self.batch.await_completion(pending).await?;
                let settled = JobHandle::finished(BackendKind::Batch, dep.id(), dep.name(), outcome);
                self.local.submit(request, Some(&settled)).await
            }
            _ => self.local.submit(request, depends_on).await,
        }
    }

    async fn await_completion(&self, handle: JobHandle) -> Result<JobOutcome, JobError> {
        match handle.kind() {
            BackendKind::Local => self.local.await_completion(handle).await,
            BackendKind::Batch => self.batch.await_completion(handle).await,
        }
    }
}
