//! What happened during a cycle.

use std::fmt;
use std::path::PathBuf;

use super::{DomainId, PipelineStage};
use crate::job::{BackendKind, JobOutcome};
use crate::retry::RetryState;

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The forecast started from the assimilated analysis.
    CompletedWithAssimilation,
    /// The forecast had to start from the first guess.
    CompletedWithoutAssimilation,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::CompletedWithAssimilation => write!(f, "completed with assimilation"),
            CycleOutcome::CompletedWithoutAssimilation => {
                write!(f, "completed without assimilation")
            }
        }
    }
}

/// One job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRun {
    pub stage: PipelineStage,
    pub domain: Option<DomainId>,
    pub outcome: JobOutcome,
    /// Forecast retry state the run was made in.
    pub retry: Option<RetryState>,
}

/// Which run directory file a promotion replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionKind {
    /// `wrffg_d0N`, kept for the fallback run.
    PreservedFirstGuess,
    /// `wrfbdy_d01` after the lateral boundary update.
    LateralBoundary,
    /// `wrfinput_d0N` from the analysis (or first guess in low-only mode).
    InitialConditions,
    /// `wrfinput_d0N` restored from `wrffg_d0N` for the fallback run.
    FallbackInitialConditions,
}

/// A file promoted into the run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub kind: PromotionKind,
    pub domain: DomainId,
    pub destination: PathBuf,
}

/// A stage the cycle would run, as listed by a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStage {
    pub stage: PipelineStage,
    pub domain: Option<DomainId>,
    pub workdir: PathBuf,
    pub backend: BackendKind,
}

impl fmt::Display for PlannedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let domain = self.domain.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{:<28} {:<4} {:<6} {}",
            self.stage.to_string(),
            domain,
            self.backend.to_string(),
            self.workdir.display()
        )
    }
}

/// Record of a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub runs: Vec<StageRun>,
    pub promotions: Vec<Promotion>,
    /// Bias corrections that failed; the cycle went on without them.
    pub warnings: Vec<String>,
    /// Set once the forecast has finished.
    pub outcome: Option<CycleOutcome>,
}

impl CycleReport {
    pub fn runs_of(&self, stage: PipelineStage) -> impl Iterator<Item = &StageRun> {
        self.runs.iter().filter(move |r| r.stage == stage)
    }

    pub fn promotions_of(&self, kind: PromotionKind) -> impl Iterator<Item = &Promotion> {
        self.promotions.iter().filter(move |p| p.kind == kind)
    }

    pub(crate) fn record_run(
        &mut self,
        stage: PipelineStage,
        domain: Option<DomainId>,
        outcome: JobOutcome,
    ) {
        self.runs.push(StageRun {
            stage,
            domain,
            outcome,
            retry: None,
        });
    }

    pub(crate) fn record_promotion(&mut self, kind: PromotionKind, domain: DomainId, destination: PathBuf) {
        self.promotions.push(Promotion {
            kind,
            domain,
            destination,
        });
    }
}
