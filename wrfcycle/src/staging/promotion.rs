//! Filesystem helpers and atomic promotion.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::StagingError;

/// Remove a file, symlink or directory. Absence is not an error.
pub fn silent_remove(path: &Path) -> Result<(), StagingError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StagingError::io("inspect", path, e)),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StagingError::io("remove", path, e)),
    }
}

/// Remove every entry of `dir` whose name starts with `prefix`.
pub fn remove_prefixed(dir: &Path, prefix: &str) -> Result<(), StagingError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StagingError::io("list", dir, e)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| StagingError::io("list", dir, e))?;
        if entry.file_name().to_string_lossy().starts_with(prefix) {
            silent_remove(&entry.path())?;
        }
    }
    Ok(())
}

/// Remove `dir` and everything in it, then create it empty.
pub fn recreate_dir(dir: &Path) -> Result<(), StagingError> {
    silent_remove(dir)?;
    fs::create_dir_all(dir).map_err(|e| StagingError::io("create", dir, e))
}

/// Point `link` at `target`, replacing whatever `link` was.
pub fn replace_symlink(target: &Path, link: &Path) -> Result<(), StagingError> {
    silent_remove(link)?;
    std::os::unix::fs::symlink(target, link).map_err(|e| StagingError::io("symlink", link, e))
}

/// A file written next to its destination, waiting to be renamed into place.
///
/// The destination is only touched by [`commit`](Self::commit), which is a
/// single rename in the destination's directory. Dropping an uncommitted
/// promotion removes the temporary file and leaves the destination as it was.
#[derive(Debug)]
pub struct PendingPromotion {
    temp: PathBuf,
    destination: PathBuf,
    committed: bool,
}

impl PendingPromotion {
    /// Copy `source` to a temporary sibling of `destination`.
    pub fn copy(source: &Path, destination: &Path) -> Result<Self, StagingError> {
        if !source.is_file() {
            return Err(StagingError::MissingOutput {
                path: source.to_path_buf(),
            });
        }
        let temp = temp_sibling(destination);
        let pending = Self {
            temp,
            destination: destination.to_path_buf(),
            committed: false,
        };
        fs::copy(source, &pending.temp).map_err(|e| StagingError::io("copy", source, e))?;
        Ok(pending)
    }

    /// The temporary file holding the new contents.
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Rename the temporary file over the destination.
    pub fn commit(mut self) -> Result<(), StagingError> {
        fs::rename(&self.temp, &self.destination)
            .map_err(|e| StagingError::io("rename into place", &self.destination, e))?;
        self.committed = true;
        debug!(destination = %self.destination.display(), "Promoted");
        Ok(())
    }
}

impl Drop for PendingPromotion {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.temp) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.temp.display(), error = %e, "Failed to remove abandoned promotion");
            }
        }
    }
}

/// Copy `source` over `destination` atomically.
pub fn promote_copy(source: &Path, destination: &Path) -> Result<(), StagingError> {
    PendingPromotion::copy(source, destination)?.commit()
}

fn temp_sibling(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{name}.promoting"))
}
