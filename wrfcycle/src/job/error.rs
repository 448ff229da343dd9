//! Job backend errors.

use std::path::PathBuf;
use thiserror::Error;

use super::BackendKind;

/// Errors raised while submitting or tracking a job.
///
/// A job that runs and fails is not an error: it is reported as
/// [`JobOutcome::Failed`](super::JobOutcome::Failed).
#[derive(Debug, Error)]
pub enum JobError {
    /// The executable or job script is missing
    #[error("executable for {name} not found: {}", .path.display())]
    MissingExecutable { name: String, path: PathBuf },

    /// The process could not be started
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The scheduler refused the submission
    #[error("submission of {name} rejected (exit {status:?}): {stderr}")]
    SubmissionRejected {
        name: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The submission response carried no job id
    #[error("could not find a job id in submission response '{output}'")]
    UnparseableSubmission { output: String },

    /// A handle was passed to a backend that did not issue it
    #[error("{kind} job {id} cannot be awaited by this backend")]
    ForeignHandle { kind: BackendKind, id: u64 },
}

impl JobError {
    /// Whether this is a configuration problem detected before submission.
    pub fn is_configuration(&self) -> bool {
        matches!(self, JobError::MissingExecutable { .. })
    }
}
