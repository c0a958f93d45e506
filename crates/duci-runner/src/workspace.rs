//! Per-job workspace directories.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use duci_core::{Error, JobId, Result};

/// Creates and removes `<base>/<job id>` directories. The base directory
/// must exist before any job may run.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    base: PathBuf,
}

impl WorkspaceManager {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Create the workspace for `id` with mode 0700.
    pub fn prepare(&self, id: JobId) -> Result<PathBuf> {
        if !self.base.is_dir() {
            return Err(Error::Clone(format!(
                "base work directory {} does not exist",
                self.base.display()
            )));
        }

        let dir = self.base.join(id.to_string());
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(&dir)
            .map_err(|e| Error::Clone(format!("failed to create workspace: {e}")))?;

        Ok(dir)
    }

    /// Remove the workspace unconditionally. Called on every exit path; a
    /// workspace that was never populated (or already gone) is not an error.
    pub fn release(&self, path: &Path) {
        if let Err(e) = fs::remove_dir_all(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(workspace = %path.display(), error = %e, "failed to remove workspace");
            }
        }
    }
}
