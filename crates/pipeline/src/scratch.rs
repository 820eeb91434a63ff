//! Per-invocation scratch directories.

use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};

const SCRATCH_PREFIX: &str = "framegrab-";

/// A uniquely named working directory owned by one pipeline run.
///
/// The directory is removed recursively when the value is dropped, so every
/// exit path (including a cancelled future) cleans up. [`ScratchArea::close`]
/// does the same eagerly and reports failures.
#[derive(Debug)]
pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    /// Create a fresh directory under `root`, or the system temp dir.
    pub fn create(root: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        tracing::debug!(path = %dir.path().display(), "Created scratch area");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory now.
    pub fn close(self) -> std::io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!(path = %path.display(), "Removed scratch area");
        Ok(())
    }
}
