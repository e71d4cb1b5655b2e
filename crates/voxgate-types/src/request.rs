//! Request intake: raw form fields in, validated `SynthesisRequest` out.
//!
//! Validation is pure. Nothing here touches the filesystem or spawns
//! anything, so a rejected request never reaches the synthesis tool.

use crate::voice::{find_voice, CloneModel, Language, PrebuiltVoice};
use std::fmt;
use thiserror::Error;

/// Slowest accepted playback speed.
pub const MIN_SPEED: f32 = 0.5;

/// Fastest accepted playback speed.
pub const MAX_SPEED: f32 = 2.0;

/// Speed used when the client does not send one.
pub const DEFAULT_SPEED: f32 = 1.0;

/// Maximum generation text size (64 KiB). Keeps argument vectors bounded.
pub const MAX_TEXT_BYTES: usize = 64 * 1024;

/// Maximum reference audio size (10 MiB).
pub const MAX_REFERENCE_AUDIO_BYTES: usize = 10 * 1024 * 1024;

/// Upper bound for the clone tool's `--nfe_step`.
pub const MAX_NFE_STEP: u32 = 128;

/// Upper bound for the clone tool's `--cross_fade_duration`, in seconds.
pub const MAX_CROSS_FADE_SECS: f32 = 2.0;

/// A request that failed intake. Always names the offending form field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("{field} is too large: {size} bytes (limit: {limit} bytes)")]
    PayloadTooLarge {
        field: &'static str,
        size: usize,
        limit: usize,
    },
}

impl ValidationError {
    /// Returns the name of the form field that failed validation.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field }
            | Self::Invalid { field, .. }
            | Self::PayloadTooLarge { field, .. } => field,
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// How the synthesis tool should produce a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceSelection {
    /// A voice shipped with the simple synthesis tool.
    Prebuilt(PrebuiltVoice),
    /// A voice cloned from reference audio with the given model.
    Clone(CloneModel),
}

impl VoiceSelection {
    /// Short identifier for logs and history records.
    pub fn describe(&self) -> String {
        match self {
            Self::Prebuilt(voice) => voice.voice_code(),
            Self::Clone(model) => model.as_str().to_string(),
        }
    }
}

/// Optional knobs of the clone tool. Unset values are not passed at all.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CloneTuning {
    pub remove_silence: bool,
    pub nfe_step: Option<u32>,
    pub cross_fade_duration: Option<f32>,
}

/// Reference audio bytes as received, before staging.
#[derive(Clone, PartialEq)]
pub struct ReferenceAudio {
    pub bytes: Vec<u8>,
    /// Original file name from the upload, if any.
    pub file_name: Option<String>,
}

impl fmt::Debug for ReferenceAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceAudio")
            .field("len", &self.bytes.len())
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// A validated synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub language: Language,
    pub voice: VoiceSelection,
    /// Generation text with newlines collapsed to spaces.
    pub text: String,
    pub speed: f32,
    /// Transcript of the reference audio, newlines collapsed.
    pub reference_text: Option<String>,
    pub reference_audio: Option<ReferenceAudio>,
    pub tuning: CloneTuning,
}

/// Raw fields of the prebuilt-voice form.
#[derive(Debug, Clone, Default)]
pub struct SimpleForm {
    pub language: Option<String>,
    pub voice: Option<String>,
    pub gen_text: Option<String>,
    pub speed: Option<String>,
}

/// Raw fields of a voice-cloning form.
#[derive(Debug, Clone, Default)]
pub struct CloneForm {
    pub model: Option<String>,
    pub language: Option<String>,
    pub ref_text: Option<String>,
    pub gen_text: Option<String>,
    pub speed: Option<String>,
    pub remove_silence: Option<String>,
    pub nfe_step: Option<String>,
    pub cross_fade_duration: Option<String>,
    pub audio: Option<ReferenceAudio>,
}

/// Field names a clone form uses on the wire, so errors name what the
/// client actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloneFields {
    pub model: &'static str,
    pub language: &'static str,
    pub ref_text: &'static str,
    pub gen_text: &'static str,
    pub speed: &'static str,
    pub remove_silence: &'static str,
    pub nfe_step: &'static str,
    pub cross_fade_duration: &'static str,
    pub audio: &'static str,
}

/// Field names of the multipart clone form.
pub const MULTIPART_CLONE_FIELDS: CloneFields = CloneFields {
    model: "model",
    language: "language",
    ref_text: "ref_text",
    gen_text: "gen_text",
    speed: "speed",
    remove_silence: "remove_silence",
    nfe_step: "nfe_step",
    cross_fade_duration: "cross_fade_duration",
    audio: "audio",
};

/// Field names of the JSON clone body.
pub const JSON_CLONE_FIELDS: CloneFields = CloneFields {
    model: "model",
    language: "language",
    ref_text: "referenceText",
    gen_text: "generationText",
    speed: "speed",
    remove_silence: "removeSilence",
    nfe_step: "nfeStep",
    cross_fade_duration: "crossFadeDuration",
    audio: "audioBase64",
};

/// Replaces every line break with a single space and trims the result.
pub fn collapse_newlines(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

/// Validates the prebuilt-voice form.
///
/// # Errors
///
/// Returns `ValidationError` naming the first field that is missing or
/// invalid.
pub fn validate_simple(form: &SimpleForm) -> Result<SynthesisRequest, ValidationError> {
    let language = parse_language(form.language.as_deref(), "language")?;

    let selector = non_blank(form.voice.as_deref()).ok_or(ValidationError::Missing {
        field: "voice",
    })?;
    let voice = find_voice(language, selector).ok_or_else(|| {
        ValidationError::invalid(
            "voice",
            format!("{} is not available for {}", selector.trim(), language),
        )
    })?;

    let text = parse_text(form.gen_text.as_deref(), "gen_text")?;
    let speed = parse_speed(form.speed.as_deref(), "speed")?;

    Ok(SynthesisRequest {
        language,
        voice: VoiceSelection::Prebuilt(*voice),
        text,
        speed,
        reference_text: None,
        reference_audio: None,
        tuning: CloneTuning::default(),
    })
}

/// Validates a multipart voice-cloning form.
///
/// # Errors
///
/// Returns `ValidationError` naming the first field that is missing or
/// invalid, or `PayloadTooLarge` when the reference audio exceeds
/// [`MAX_REFERENCE_AUDIO_BYTES`].
pub fn validate_clone(form: CloneForm) -> Result<SynthesisRequest, ValidationError> {
    validate_clone_with(form, &MULTIPART_CLONE_FIELDS)
}

/// Validates a voice-cloning form whose fields use the given wire names.
///
/// The model may be given directly or derived from the language. When both
/// are present they must agree.
///
/// # Errors
///
/// See [`validate_clone`].
pub fn validate_clone_with(
    form: CloneForm,
    fields: &CloneFields,
) -> Result<SynthesisRequest, ValidationError> {
    let model = match non_blank(form.model.as_deref()) {
        Some(raw) => {
            let model: CloneModel = raw
                .parse()
                .map_err(|reason: String| ValidationError::invalid(fields.model, reason))?;
            if let Some(raw_language) = non_blank(form.language.as_deref()) {
                let language = parse_language(Some(raw_language), fields.language)?;
                if language != model.language() {
                    return Err(ValidationError::invalid(
                        fields.language,
                        format!("{} does not synthesize {}", model, language),
                    ));
                }
            }
            model
        }
        None => match non_blank(form.language.as_deref()) {
            Some(raw_language) => {
                parse_language(Some(raw_language), fields.language)?.clone_model()
            }
            None => {
                return Err(ValidationError::Missing {
                    field: fields.model,
                })
            }
        },
    };
    let language = model.language();

    let text = parse_text(form.gen_text.as_deref(), fields.gen_text)?;
    let speed = parse_speed(form.speed.as_deref(), fields.speed)?;

    let reference_text = non_blank(form.ref_text.as_deref()).map(collapse_newlines);
    if language == Language::Hindi && reference_text.is_none() {
        // No prebuilt Hindi clone voice exists, so the transcript is required.
        return Err(ValidationError::Missing {
            field: fields.ref_text,
        });
    }

    let tuning = CloneTuning {
        remove_silence: match non_blank(form.remove_silence.as_deref()) {
            Some(raw) => parse_flag(raw, fields.remove_silence)?,
            None => false,
        },
        nfe_step: non_blank(form.nfe_step.as_deref())
            .map(|raw| parse_nfe_step(raw, fields.nfe_step))
            .transpose()?,
        cross_fade_duration: non_blank(form.cross_fade_duration.as_deref())
            .map(|raw| parse_cross_fade(raw, fields.cross_fade_duration))
            .transpose()?,
    };

    let audio = form.audio.ok_or(ValidationError::Missing {
        field: fields.audio,
    })?;
    if audio.bytes.is_empty() {
        return Err(ValidationError::invalid(fields.audio, "audio file is empty"));
    }
    if audio.bytes.len() > MAX_REFERENCE_AUDIO_BYTES {
        return Err(ValidationError::PayloadTooLarge {
            field: fields.audio,
            size: audio.bytes.len(),
            limit: MAX_REFERENCE_AUDIO_BYTES,
        });
    }

    Ok(SynthesisRequest {
        language,
        voice: VoiceSelection::Clone(model),
        text,
        speed,
        reference_text,
        reference_audio: Some(audio),
        tuning,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_language(raw: Option<&str>, field: &'static str) -> Result<Language, ValidationError> {
    let raw = non_blank(raw).ok_or(ValidationError::Missing { field })?;
    raw.parse()
        .map_err(|reason: String| ValidationError::invalid(field, reason))
}

fn parse_text(raw: Option<&str>, field: &'static str) -> Result<String, ValidationError> {
    let raw = non_blank(raw).ok_or(ValidationError::Missing { field })?;
    if raw.len() > MAX_TEXT_BYTES {
        return Err(ValidationError::PayloadTooLarge {
            field,
            size: raw.len(),
            limit: MAX_TEXT_BYTES,
        });
    }
    Ok(collapse_newlines(raw))
}

/// Parses a playback speed. An absent field means [`DEFAULT_SPEED`]; a
/// present one must be a finite number in `[MIN_SPEED, MAX_SPEED]`.
fn parse_speed(raw: Option<&str>, field: &'static str) -> Result<f32, ValidationError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_SPEED);
    };
    let speed: f32 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::invalid(field, format!("{:?} is not a number", raw)))?;
    if !speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(ValidationError::invalid(
            field,
            format!("must be between {} and {}", MIN_SPEED, MAX_SPEED),
        ));
    }
    Ok(speed)
}

fn parse_flag(raw: &str, field: &'static str) -> Result<bool, ValidationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ValidationError::invalid(
            field,
            format!("{:?} is not a boolean", other),
        )),
    }
}

fn parse_nfe_step(raw: &str, field: &'static str) -> Result<u32, ValidationError> {
    let steps: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::invalid(field, format!("{:?} is not an integer", raw)))?;
    if steps == 0 || steps > MAX_NFE_STEP {
        return Err(ValidationError::invalid(
            field,
            format!("must be between 1 and {}", MAX_NFE_STEP),
        ));
    }
    Ok(steps)
}

fn parse_cross_fade(raw: &str, field: &'static str) -> Result<f32, ValidationError> {
    let secs: f32 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::invalid(field, format!("{:?} is not a number", raw)))?;
    if !secs.is_finite() || !(0.0..=MAX_CROSS_FADE_SECS).contains(&secs) {
        return Err(ValidationError::invalid(
            field,
            format!("must be between 0 and {}", MAX_CROSS_FADE_SECS),
        ));
    }
    Ok(secs)
}
