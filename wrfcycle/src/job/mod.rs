//! Job execution backends.
//!
//! Every stage executable is run through a [`JobBackend`]:
//!
//! - [`LocalBackend`] runs the executable in its working directory and
//!   returns once it exits
//! - [`BatchBackend`] submits a job script to a SLURM-style scheduler and
//!   polls the queue and accounting records for the outcome
//! - [`RoutingBackend`] picks one of the two per request
//! - [`ScriptedBackend`] returns preset outcomes, for tests
//!
//! A job that runs and fails yields [`JobOutcome::Failed`]. [`JobError`] is
//! reserved for problems with submitting or tracking the job itself.

mod batch;
mod error;
mod handle;
mod local;
mod routing;
mod runner;
mod scripted;
#[cfg(test)]
mod testing;
mod traits;

pub use batch::{
    classify_accounting, job_listed, parse_submission, AccountingState, BatchBackend,
    BatchSettings, DEFAULT_ACCOUNTING_ATTEMPTS,
};
pub use error::JobError;
pub use handle::{BackendKind, JobHandle, JobId, JobOutcome, JobRequest};
pub use local::LocalBackend;
pub use routing::RoutingBackend;
pub use runner::SystemCommandRunner;
pub use scripted::{ScriptedBackend, Submission};
pub use traits::{await_with_timeout, CommandOutput, CommandRunner, CommandSpec, JobBackend};
