//! Ordered file transfers for one stage of one domain.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::promotion::{replace_symlink, silent_remove};
use super::StagingError;

/// How a file reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Static inputs: linked, never copied.
    Symlink,
    /// Per-cycle inputs the stage may modify.
    Copy,
    /// Stage outputs kept after the stage, renamed where possible.
    Move,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Symlink => write!(f, "symlink"),
            TransferKind::Copy => write!(f, "copy"),
            TransferKind::Move => write!(f, "move"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: TransferKind,
}

/// Transfers applied in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingManifest {
    transfers: Vec<Transfer>,
}

impl StagingManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symlink(mut self, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        self.push(source.into(), destination.into(), TransferKind::Symlink);
        self
    }

    pub fn copy(mut self, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        self.push(source.into(), destination.into(), TransferKind::Copy);
        self
    }

    pub fn rename(mut self, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        self.push(source.into(), destination.into(), TransferKind::Move);
        self
    }

    fn push(&mut self, source: PathBuf, destination: PathBuf, kind: TransferKind) {
        self.transfers.push(Transfer {
            source,
            destination,
            kind,
        });
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// First transfer whose source is missing.
    pub fn missing_source(&self) -> Option<&Path> {
        self.transfers
            .iter()
            .map(|t| t.source.as_path())
            .find(|source| fs::metadata(source).is_err())
    }

    /// Apply every transfer.
    ///
    /// All sources are checked before anything is touched, so a missing
    /// input leaves the working directory unchanged.
    pub fn apply(&self) -> Result<(), StagingError> {
        if let Some(path) = self.missing_source() {
            return Err(StagingError::MissingSource {
                path: path.to_path_buf(),
            });
        }
        for transfer in &self.transfers {
            trace!(
                kind = %transfer.kind,
                source = %transfer.source.display(),
                destination = %transfer.destination.display(),
                "Staging file"
            );
            apply_one(transfer)?;
        }
        Ok(())
    }
}

fn apply_one(transfer: &Transfer) -> Result<(), StagingError> {
    let Transfer {
        source,
        destination,
        kind,
    } = transfer;
    match kind {
        TransferKind::Symlink => replace_symlink(source, destination),
        TransferKind::Copy => {
            silent_remove(destination)?;
            fs::copy(source, destination)
                .map(|_| ())
                .map_err(|e| StagingError::io("copy", source, e))
        }
        TransferKind::Move => {
            silent_remove(destination)?;
            if fs::rename(source, destination).is_err() {
                // different filesystem
                fs::copy(source, destination).map_err(|e| StagingError::io("move", source, e))?;
                silent_remove(source)?;
            }
            Ok(())
        }
    }
}
