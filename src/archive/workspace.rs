use crate::error::{PipelineError, Result};
use crate::utils::unique_file_name;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Private temporary directory owned by one pipeline run.
///
/// Removed when dropped or closed, whichever way the run ends.
#[derive(Debug)]
pub struct ScopedWorkspace {
    temp_dir: TempDir,
}

impl ScopedWorkspace {
    pub fn new() -> Result<Self> {
        Self::with_prefix("station-twin-")
    }

    pub fn with_prefix(prefix: &str) -> Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix(prefix).tempdir().map_err(|e| {
            PipelineError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create temporary directory: {}", e),
            ))
        })?;
        tracing::debug!(path = %temp_dir.path().display(), "created workspace");

        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, file_name: impl AsRef<Path>) -> PathBuf {
        self.temp_dir.path().join(file_name)
    }

    /// Fresh `<uuid>.<extension>` path inside the workspace
    pub fn unique_path(&self, extension: &str) -> PathBuf {
        self.join(unique_file_name(extension))
    }

    /// Remove the directory now, reporting any failure
    pub fn close(self) -> Result<()> {
        let path = self.temp_dir.path().to_path_buf();
        self.temp_dir.close()?;
        tracing::debug!(path = %path.display(), "removed workspace");
        Ok(())
    }
}
