use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

/// A private per-job scratch directory.
///
/// Created fresh (any leftover from a crashed run is removed first) and
/// deleted on drop unless `keep()` was called, so a failed job leaves its
/// intermediates behind for inspection.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    pub fn create(base: &Path, label: &str) -> Result<Self> {
        let path = base.join(format!("tmp-{}-{}", label, std::process::id()));
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;
        Ok(Self { path, keep: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leave the directory on disk when this handle drops.
    pub fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.keep {
            warn!(path = %self.path.display(), "keeping scratch directory for inspection");
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove scratch directory");
        }
    }
}
