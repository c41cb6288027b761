//! Scratch directories that stage the input frames of one run.

use crate::source::CaptureError;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Canonical paths of workspaces currently held by a run in this process.
static ACTIVE_WORKSPACES: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Exclusive ownership of a scratch directory for the lifetime of one run.
///
/// Acquiring wipes the directory. A second `acquire` of the same directory
/// fails with [`CaptureError::WorkspaceBusy`] until the first guard drops.
#[derive(Debug)]
pub struct ScratchWorkspace {
    root: PathBuf,
}

impl ScratchWorkspace {
    #[tracing::instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn acquire(dir: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let root = dir.canonicalize()?;

        {
            let mut active = ACTIVE_WORKSPACES.lock();
            if !active.insert(root.clone()) {
                return Err(CaptureError::WorkspaceBusy(root));
            }
        }

        // From here on Drop releases the registration, including on error.
        let workspace = Self { root };
        workspace.wipe()?;
        info!("Acquired scratch workspace {}", workspace.root.display());
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn wipe(&self) -> Result<(), CaptureError> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Copy every file under `source` into the workspace, keeping relative paths.
    ///
    /// Returns the number of files copied.
    #[tracing::instrument(skip_all, fields(source = %source.display()))]
    pub fn stage_directory(&self, source: &Path) -> Result<usize, CaptureError> {
        let mut copied = 0;
        for entry in WalkDir::new(source).follow_links(true) {
            let entry = entry.map_err(|e| CaptureError::Walk {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;
            let relative = match entry.path().strip_prefix(source) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel,
                _ => continue,
            };
            let target = self.root.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &target)?;
                copied += 1;
            }
        }
        debug!("Staged {} files into {}", copied, self.root.display());
        Ok(copied)
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        ACTIVE_WORKSPACES.lock().remove(&self.root);
        debug!("Released scratch workspace {}", self.root.display());
    }
}
