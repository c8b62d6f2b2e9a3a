//! Marker-file progress backend
//!
//! Each unlocked module is a file named `module_{n}_unlocked` in the progress
//! directory. Existence means unlocked; the body only records when it
//! happened. Markers are staged in a temp file in the same directory and
//! linked into place without clobbering, so a reader never sees a partial
//! marker and only one racing writer wins.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{check_module, ProgressError, ProgressStore, UnlockTransition, ENTRY_MODULE};

/// Progress record persisted as marker files
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    dir: PathBuf,
}

impl FileProgressStore {
    /// Open (and create if needed) the progress directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ProgressError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| ProgressError::Io(e.to_string()))?;
        debug!(dir = %dir.display(), "Progress directory ready");
        Ok(Self { dir })
    }

    /// Directory holding the markers
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the marker for a module
    pub fn marker_path(&self, module: u32) -> PathBuf {
        self.dir.join(format!("module_{}_unlocked", module))
    }
}

impl ProgressStore for FileProgressStore {
    fn is_unlocked(&self, module: u32) -> bool {
        module == ENTRY_MODULE || self.marker_path(module).exists()
    }

    fn unlock(&self, module: u32) -> Result<UnlockTransition, ProgressError> {
        check_module(module)?;
        if module == ENTRY_MODULE {
            return Ok(UnlockTransition::AlreadyUnlocked);
        }

        let marker = self.marker_path(module);
        if marker.exists() {
            return Ok(UnlockTransition::AlreadyUnlocked);
        }

        let mut staged =
            NamedTempFile::new_in(&self.dir).map_err(|e| ProgressError::Io(e.to_string()))?;
        writeln!(staged, "Unlocked at: {}", chrono::Utc::now().to_rfc3339())
            .and_then(|_| staged.flush())
            .map_err(|e| ProgressError::Io(e.to_string()))?;

        match staged.persist_noclobber(&marker) {
            Ok(_) => {
                info!(module, marker = %marker.display(), "Module unlocked");
                Ok(UnlockTransition::Unlocked)
            }
            // Lost the race to another writer; the staged file is dropped with the error
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                Ok(UnlockTransition::AlreadyUnlocked)
            }
            Err(e) => Err(ProgressError::Io(e.error.to_string())),
        }
    }
}
