//! Writes reference audio to disk so the synthesis tool can read it by path.

use crate::error::SynthesisError;
use crate::file::EphemeralFile;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use voxgate_types::ReferenceAudio;

const DEFAULT_EXTENSION: &str = "wav";

/// Reference audio written to the staging directory for one request.
///
/// The file is deleted by [`StagedAudioFile::discard`], or on drop if the
/// request ends early.
#[derive(Debug)]
pub struct StagedAudioFile {
    file: EphemeralFile,
}

impl StagedAudioFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn discard(self) {
        self.file.remove().await;
    }
}

/// Stages reference audio under a single directory, one unique file per call.
#[derive(Debug, Clone)]
pub struct AudioStager {
    staging_dir: PathBuf,
}

impl AudioStager {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Writes `audio` to a fresh `ref_<uuid>.<ext>` file, creating the staging
    /// directory if needed. The content is not inspected.
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError::Storage` if the directory cannot be created or
    /// the write fails. A partially written file is removed.
    pub async fn stage(&self, audio: &ReferenceAudio) -> Result<StagedAudioFile, SynthesisError> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| SynthesisError::Storage {
                path: self.staging_dir.clone(),
                source: e,
            })?;

        let file_name = format!(
            "ref_{}.{}",
            Uuid::new_v4().simple(),
            staged_extension(audio.file_name.as_deref())
        );
        let file = EphemeralFile::new(self.staging_dir.join(file_name));

        tokio::fs::write(file.path(), &audio.bytes)
            .await
            .map_err(|e| SynthesisError::Storage {
                path: file.path().to_path_buf(),
                source: e,
            })?;

        tracing::debug!(
            path = %file.path().display(),
            size_bytes = audio.bytes.len(),
            "staged reference audio"
        );

        Ok(StagedAudioFile { file })
    }
}

/// Keeps the upload's extension when it is short and plain, so tools that
/// sniff by extension still work. Anything else becomes `wav`.
fn staged_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(staged_extension(Some("voice.MP3")), "mp3");
        assert_eq!(staged_extension(Some("clip.flac")), "flac");
        assert_eq!(staged_extension(Some("no_extension")), "wav");
        assert_eq!(staged_extension(Some("evil.w/v")), "wav");
        assert_eq!(staged_extension(Some("x.verylongext")), "wav");
        assert_eq!(staged_extension(Some("x.w$v")), "wav");
        assert_eq!(staged_extension(None), "wav");
    }
}
