use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_staging_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_simple_executable() -> ExecutableConfig {
    ExecutableConfig::new("python", ["scripts/generate_tts.py"])
}

fn default_clone_executable() -> ExecutableConfig {
    ExecutableConfig::new("f5-tts_infer-cli", Vec::<String>::new())
}

/// An external program plus the fixed arguments that precede the
/// per-request ones (e.g. `python` + `scripts/generate_tts.py`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ExecutableConfig {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Settings for staging, invocation and output handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    /// Directory for staged reference audio.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Directory the synthesis tools write generated audio into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Wall-clock limit for one child process. Default: 300.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Tool used for prebuilt voices.
    #[serde(default = "default_simple_executable")]
    pub simple: ExecutableConfig,
    /// Tool used for voice cloning.
    #[serde(default = "default_clone_executable")]
    pub clone: ExecutableConfig,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            output_dir: default_output_dir(),
            timeout_secs: default_timeout_secs(),
            simple: default_simple_executable(),
            clone: default_clone_executable(),
        }
    }
}

impl SynthesizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: SynthesizerConfig = toml::from_str(
            r#"
            output_dir = "/var/lib/voxgate/output"

            [clone]
            program = "/opt/f5/bin/f5-tts_infer-cli"
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/var/lib/voxgate/output"));
        assert_eq!(config.staging_dir, PathBuf::from("uploads"));
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.clone.program, "/opt/f5/bin/f5-tts_infer-cli");
        assert!(config.clone.args.is_empty());
        assert_eq!(config.simple, default_simple_executable());
    }
}
