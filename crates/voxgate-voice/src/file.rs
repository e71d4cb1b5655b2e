//! Per-request files that must not outlive the request.

use std::path::{Path, PathBuf};

/// A file path that is deleted when the value is dropped.
///
/// Removal is best-effort: a file that is already gone is fine, any other
/// failure is logged and otherwise ignored.
#[derive(Debug)]
pub struct EphemeralFile {
    path: PathBuf,
    armed: bool,
}

impl EphemeralFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file now, without blocking the runtime.
    pub async fn remove(mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed temporary file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "failed to remove temporary file: {}",
                e
            ),
        }
    }
}

impl Drop for EphemeralFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed temporary file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "failed to remove temporary file: {}",
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        std::fs::write(&path, b"data").unwrap();

        drop(EphemeralFile::new(&path));
        assert!(!path.exists());
    }

    #[test]
    fn drop_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        drop(EphemeralFile::new(dir.path().join("never-written.wav")));
    }

    #[tokio::test]
    async fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.wav");
        std::fs::write(&path, b"data").unwrap();

        EphemeralFile::new(&path).remove().await;
        assert!(!path.exists());
    }
}
