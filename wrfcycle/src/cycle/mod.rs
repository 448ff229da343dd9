//! Cycle model and orchestration.
//!
//! A [`Cycle`] names the analysis time, the forecast length and the nested
//! domains. [`CycleOrchestrator`] runs every stage of the cycle through a
//! [`JobBackend`](crate::job::JobBackend) and returns a [`CycleReport`].

mod error;
mod orchestrator;
mod report;
mod types;

pub use error::{CycleError, StageFailure};
pub use orchestrator::{configured_domains, CycleOrchestrator};
pub use report::{CycleOutcome, CycleReport, PlannedStage, Promotion, PromotionKind, StageRun};
pub use types::{Cycle, DomainId, PipelineStage};
