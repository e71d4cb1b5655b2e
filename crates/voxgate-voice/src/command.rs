//! Builds the argument vector for one synthesis run.
//!
//! Text is passed as discrete arguments and never through a shell, so
//! quotes, `$` and backticks in user text reach the tool verbatim. User text
//! is attached to its flag (`--text=<value>`) so a value starting with `-`
//! is never parsed as an option.

use crate::config::ExecutableConfig;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use voxgate_types::{SynthesisRequest, VoiceSelection};

/// A fully resolved child-process invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisCommand {
    /// Identifies this run in logs. Also names the output file.
    pub request_id: Uuid,
    pub program: String,
    pub args: Vec<OsString>,
    /// Where the tool is expected to write its WAV file.
    pub output_path: PathBuf,
}

impl SynthesisCommand {
    /// Arguments rendered for logs and assertions.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

/// Builds the command for `request`.
///
/// Prebuilt voices use the simple tool's flags:
/// `--lang --text= --voice --speed --output`.
/// Clones use the clone tool's flags:
/// `--model --ref_audio --gen_text= --ref_text= --speed [tuning] --output_dir --output_file`.
///
/// The output file is `<output_dir>/<request_id>.wav`; every call gets a
/// fresh v4 UUID so concurrent requests never share a path.
pub fn build_command(
    executable: &ExecutableConfig,
    request: &SynthesisRequest,
    reference_audio: Option<&Path>,
    output_dir: &Path,
) -> SynthesisCommand {
    let request_id = Uuid::new_v4();
    let output_file = format!("{}.wav", request_id);
    let output_path = output_dir.join(&output_file);

    let mut args: Vec<OsString> = executable.args.iter().map(OsString::from).collect();
    let speed = request.speed.to_string();

    match request.voice {
        VoiceSelection::Prebuilt(voice) => {
            push_flag(&mut args, "--lang", request.language.code().to_string());
            push_attached(&mut args, "--text", &request.text);
            push_flag(&mut args, "--voice", voice.voice_code());
            push_flag(&mut args, "--speed", &speed);
            push_flag(&mut args, "--output", &output_path);
        }
        VoiceSelection::Clone(model) => {
            push_flag(&mut args, "--model", model.as_str());
            if let Some(path) = reference_audio {
                push_flag(&mut args, "--ref_audio", path);
            }
            push_attached(&mut args, "--gen_text", &request.text);
            push_attached(
                &mut args,
                "--ref_text",
                request.reference_text.as_deref().unwrap_or(""),
            );
            push_flag(&mut args, "--speed", &speed);
            if request.tuning.remove_silence {
                args.push("--remove_silence".into());
            }
            if let Some(steps) = request.tuning.nfe_step {
                push_flag(&mut args, "--nfe_step", steps.to_string());
            }
            if let Some(secs) = request.tuning.cross_fade_duration {
                push_flag(&mut args, "--cross_fade_duration", secs.to_string());
            }
            push_flag(&mut args, "--output_dir", output_dir);
            push_flag(&mut args, "--output_file", &output_file);
        }
    }

    SynthesisCommand {
        request_id,
        program: executable.program.clone(),
        args,
        output_path,
    }
}

fn push_flag(args: &mut Vec<OsString>, flag: &str, value: impl AsRef<std::ffi::OsStr>) {
    args.push(flag.into());
    args.push(value.as_ref().to_os_string());
}

/// Pushes `--flag=value` as a single argument.
fn push_attached(args: &mut Vec<OsString>, flag: &str, value: &str) {
    args.push(format!("{}={}", flag, value).into());
}
