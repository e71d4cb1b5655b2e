use std::path::PathBuf;
use thiserror::Error;

/// Failures between a validated request and a playable audio file.
///
/// The `Display` output carries full context (program, paths, exit code,
/// stderr tail) for the operator log. Use [`SynthesisError::public_message`]
/// for anything sent to a client.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("storage error at {path:?}: {source}")]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with status {code:?}: {output_tail}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        output_tail: String,
    },

    #[error("{program} exited successfully but wrote no file at {path:?}")]
    MissingOutput { program: String, path: PathBuf },

    #[error("{program} wrote an empty file at {path:?}")]
    EmptyOutput { program: String, path: PathBuf },

    #[error("{program} timed out after {secs} seconds")]
    TimedOut { program: String, secs: u64 },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

impl SynthesisError {
    /// Stable name of the failure kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Storage { .. } => "storage",
            Self::Spawn { .. } => "spawn",
            Self::NonZeroExit { .. } => "non_zero_exit",
            Self::MissingOutput { .. } => "missing_output",
            Self::EmptyOutput { .. } => "empty_output",
            Self::TimedOut { .. } => "timed_out",
            Self::Io { .. } => "io",
        }
    }

    /// Short client-facing message. Never contains local paths or tool output.
    pub fn public_message(&self) -> String {
        match self {
            Self::Storage { .. } => "failed to prepare audio files".to_string(),
            Self::Spawn { .. } => "speech synthesis tool could not be started".to_string(),
            Self::NonZeroExit { code: Some(code), .. } => {
                format!("speech synthesis failed (exit code {})", code)
            }
            Self::NonZeroExit { code: None, .. } => {
                "speech synthesis was terminated".to_string()
            }
            Self::MissingOutput { .. } => "speech synthesis produced no audio".to_string(),
            Self::EmptyOutput { .. } => "speech synthesis produced an empty audio file".to_string(),
            Self::TimedOut { secs, .. } => {
                format!("speech synthesis timed out after {} seconds", secs)
            }
            Self::Io { .. } => "speech synthesis failed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_message_hides_paths() {
        let err = SynthesisError::MissingOutput {
            program: "/opt/tts/bin/f5-tts_infer-cli".to_string(),
            path: PathBuf::from("/srv/voxgate/output/abc.wav"),
        };
        assert!(err.to_string().contains("/srv/voxgate/output/abc.wav"));
        assert!(!err.public_message().contains('/'));
        assert_eq!(err.kind(), "missing_output");
    }

    #[test]
    fn exit_code_is_reported() {
        let err = SynthesisError::NonZeroExit {
            program: "python".to_string(),
            code: Some(2),
            output_tail: "Traceback (most recent call last)".to_string(),
        };
        assert_eq!(err.public_message(), "speech synthesis failed (exit code 2)");
        assert!(!err.public_message().contains("Traceback"));
    }
}
