//! Staging errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::namelist::NamelistError;

/// Errors raised while preparing a working directory or promoting outputs.
///
/// Staging errors are never job failures: they mean a stage could not be
/// set up, or a job reported success without producing its output.
#[derive(Debug, Error)]
pub enum StagingError {
    /// An input that must exist before a transfer is missing
    #[error("staging source not found: {}", .path.display())]
    MissingSource { path: PathBuf },

    /// A stage finished without producing an expected output
    #[error("expected output not found: {}", .path.display())]
    MissingOutput { path: PathBuf },

    /// A filesystem operation failed
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A control namelist could not be read or written
    #[error(transparent)]
    Namelist(#[from] NamelistError),
}

impl StagingError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StagingError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
