//! Scripted backend for exercising the orchestrator without WRF.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{BackendKind, JobBackend, JobError, JobHandle, JobId, JobOutcome, JobRequest};

type Effect = Arc<dyn Fn(&JobRequest) + Send + Sync>;

/// A submission seen by [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: JobId,
    pub name: String,
    pub workdir: PathBuf,
    pub depends_on: Option<JobId>,
}

/// Backend whose job outcomes are set in advance.
///
/// Outcomes are queued per executable name and consumed in submission
/// order; an empty queue means success. Effects registered with
/// [`on_run`](Self::on_run) run for every job that executes, which lets
/// callers create the files a real executable would write.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    outcomes: Arc<Mutex<HashMap<String, VecDeque<JobOutcome>>>>,
    effects: Arc<Mutex<HashMap<String, Effect>>>,
    submissions: Arc<Mutex<Vec<Submission>>>,
    awaited: Arc<Mutex<Vec<JobId>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for ScriptedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedBackend")
            .field("submissions", &self.submissions())
            .finish_non_exhaustive()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for the next runs of `name`.
    pub fn outcomes(&self, name: &str, outcomes: impl IntoIterator<Item = JobOutcome>) -> &Self {
        lock(&self.outcomes)
            .entry(name.to_string())
            .or_default()
            .extend(outcomes);
        self
    }

    /// Make the next run of `name` fail.
    pub fn fail_next(&self, name: &str) -> &Self {
        self.outcomes(name, [JobOutcome::Failed])
    }

    /// Run `effect` whenever `name` executes, before its outcome is decided.
    pub fn on_run(&self, name: &str, effect: impl Fn(&JobRequest) + Send + Sync + 'static) -> &Self {
        lock(&self.effects).insert(name.to_string(), Arc::new(effect));
        self
    }

    /// All submissions so far, in order.
    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.submissions).clone()
    }

    /// Names of submitted jobs, in order.
    pub fn names(&self) -> Vec<String> {
        lock(&self.submissions).iter().map(|s| s.name.clone()).collect()
    }

    /// Jobs whose completion was awaited, in order.
    pub fn awaited(&self) -> Vec<JobId> {
        lock(&self.awaited).clone()
    }

    /// How many times `name` was submitted.
    pub fn count(&self, name: &str) -> usize {
        lock(&self.submissions)
            .iter()
            .filter(|s| s.name == name)
            .count()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl JobBackend for ScriptedBackend {
    async fn submit(
        &self,
        request: &JobRequest,
        depends_on: Option<&JobHandle>,
    ) -> Result<JobHandle, JobError> {
        let id = JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        lock(&self.submissions).push(Submission {
            id,
            name: request.name.clone(),
            workdir: request.workdir.clone(),
            depends_on: depends_on.map(JobHandle::id),
        });

        if depends_on.and_then(JobHandle::known_outcome) == Some(JobOutcome::Failed) {
            return Ok(JobHandle::finished(BackendKind::Local, id, &request.name, JobOutcome::Failed));
        }

        let effect = lock(&self.effects).get(&request.name).cloned();
        if let Some(effect) = effect {
            effect(request);
        }
        let outcome = lock(&self.outcomes)
            .get_mut(&request.name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(JobOutcome::Succeeded);
        Ok(JobHandle::finished(BackendKind::Local, id, &request.name, outcome))
    }

    async fn await_completion(&self, handle: JobHandle) -> Result<JobOutcome, JobError> {
        lock(&self.awaited).push(handle.id());
        handle.known_outcome().ok_or(JobError::ForeignHandle {
            kind: handle.kind(),
            id: handle.id().value(),
        })
    }
}
