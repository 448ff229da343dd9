//! Cycle errors.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::{DomainId, PipelineStage};
use crate::job::JobError;
use crate::namelist::NamelistError;
use crate::staging::StagingError;

/// Why a stage failed.
#[derive(Debug, Error)]
pub enum StageFailure {
    /// The working directory could not be prepared, or an output is missing
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// The job could not be submitted or tracked
    #[error(transparent)]
    Job(#[from] JobError),

    /// The job ran and failed
    #[error("job failed")]
    JobFailed,

    /// The job did not finish in time
    #[error("job did not finish within {}s", .0.as_secs())]
    TimedOut(Duration),

    /// The forecast namelist could not be rewritten
    #[error(transparent)]
    Namelist(#[from] NamelistError),

    /// Every forecast attempt failed, including the fallback run
    #[error("forecast failed after {attempts} attempts, fallback included")]
    RetriesExhausted { attempts: usize },
}

impl StageFailure {
    /// Whether the failure is a configuration problem found before any job
    /// ran.
    pub fn is_configuration(&self) -> bool {
        matches!(self, StageFailure::Job(e) if e.is_configuration())
    }
}

/// A failed stage, with the domain and directory it ran in.
#[derive(Debug, Error)]
#[error("{stage} failed{} in {}: {kind}", domain_suffix(.domain), .workdir.display())]
pub struct CycleError {
    pub stage: PipelineStage,
    pub domain: Option<DomainId>,
    pub workdir: PathBuf,
    #[source]
    pub kind: StageFailure,
}

impl CycleError {
    pub fn new(
        stage: PipelineStage,
        domain: Option<DomainId>,
        workdir: impl Into<PathBuf>,
        kind: impl Into<StageFailure>,
    ) -> Self {
        Self {
            stage,
            domain,
            workdir: workdir.into(),
            kind: kind.into(),
        }
    }
}

fn domain_suffix(domain: &Option<DomainId>) -> String {
    domain.map(|d| format!(" for {d}")).unwrap_or_default()
}
