//! Bias correction of assimilated fields.
//!
//! Correction runs after the assimilation of every domain has finished,
//! outermost domain first. A correction that fails leaves the analysis as
//! it was; the cycle carries on with the uncorrected fields.

use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::info;

use crate::cycle::DomainId;
use crate::job::{CommandRunner, CommandSpec, JobError, SystemCommandRunner};
use crate::time::model_time;

/// Errors from a bias correction run.
#[derive(Debug, Error)]
pub enum BiasError {
    /// There is no analysis to correct
    #[error("analysis file not found: {}", .path.display())]
    MissingAnalysis { path: PathBuf },

    /// The correction tool could not be run
    #[error(transparent)]
    Command(#[from] JobError),

    /// The correction tool exited with an error
    #[error("bias correction for {domain} exited with {status:?}: {stderr}")]
    Failed {
        domain: DomainId,
        status: Option<i32>,
        stderr: String,
    },
}

/// Corrects the analysis of one domain in place.
pub trait BiasCorrector: Send + Sync {
    fn correct(
        &self,
        domain: DomainId,
        analysis_time: NaiveDateTime,
        analysis_file: &Path,
    ) -> impl Future<Output = Result<(), BiasError>> + Send;
}

/// Leaves the analysis untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBiasCorrection;

impl BiasCorrector for NoBiasCorrection {
    async fn correct(&self, _: DomainId, _: NaiveDateTime, _: &Path) -> Result<(), BiasError> {
        Ok(())
    }
}

/// Runs an external tool as `<command> <domain> <analysis time> <analysis file>`.
#[derive(Debug, Clone)]
pub struct CommandBiasCorrector<R = SystemCommandRunner> {
    command: PathBuf,
    runner: R,
}

impl CommandBiasCorrector {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self::with_runner(command, SystemCommandRunner)
    }
}

impl<R: CommandRunner> CommandBiasCorrector<R> {
    pub fn with_runner(command: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            command: command.into(),
            runner,
        }
    }
}

impl<R: CommandRunner> BiasCorrector for CommandBiasCorrector<R> {
    async fn correct(
        &self,
        domain: DomainId,
        analysis_time: NaiveDateTime,
        analysis_file: &Path,
    ) -> Result<(), BiasError> {
        if !analysis_file.is_file() {
            return Err(BiasError::MissingAnalysis {
                path: analysis_file.to_path_buf(),
            });
        }

        let mut spec = CommandSpec::new(&self.command)
            .arg(domain.get().to_string())
            .arg(model_time(&analysis_time))
            .arg(analysis_file.display().to_string())
            .capture();
        if let Some(dir) = analysis_file.parent() {
            spec = spec.current_dir(dir);
        }

        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(BiasError::Failed {
                domain,
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        info!(domain = %domain, "Bias correction applied");
        Ok(())
    }
}
