//! Speech synthesis handlers.
//!
//! Each handler collects form fields, validates them into a
//! [`SynthesisRequest`], runs the synthesis tool and streams the resulting
//! WAV back. Unknown form fields are ignored.

use crate::{api::ApiError, delivery, AppState};
use axum::{
    extract::{
        multipart::{Field, MultipartError},
        rejection::JsonRejection,
        Extension, Multipart,
    },
    http::StatusCode,
    response::Response,
    Json,
};
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use voxgate_db::{record_generation, DbPool, NewGeneration};
use voxgate_types::{
    validate_clone, validate_clone_with, validate_simple, CloneForm, ReferenceAudio,
    SimpleForm, SynthesisRequest, ValidationError, JSON_CLONE_FIELDS,
};
use voxgate_voice::SynthesisOutput;

/// Handler for `POST /api/tts/simple`.
///
/// Multipart fields: `language`, `voice`, `gen_text`, `speed`.
pub async fn simple_handler(
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = SimpleForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "language" => form.language = Some(field_text(field).await?),
            "voice" => form.voice = Some(field_text(field).await?),
            "gen_text" => form.gen_text = Some(field_text(field).await?),
            "speed" => form.speed = Some(field_text(field).await?),
            _ => {}
        }
    }

    let request = validate_simple(&form)?;
    synthesize_and_deliver(&state, request).await
}

/// Handler for `POST /api/tts/clone`.
///
/// Multipart fields: `audio` (file), `model`, `language`, `ref_text`,
/// `gen_text`, `speed`, `remove_silence`, `nfe_step`, `cross_fade_duration`.
pub async fn clone_handler(
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = CloneForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.audio = Some(ReferenceAudio {
                    bytes: bytes.to_vec(),
                    file_name,
                });
            }
            "model" => form.model = Some(field_text(field).await?),
            "language" => form.language = Some(field_text(field).await?),
            "ref_text" => form.ref_text = Some(field_text(field).await?),
            "gen_text" => form.gen_text = Some(field_text(field).await?),
            "speed" => form.speed = Some(field_text(field).await?),
            "remove_silence" => form.remove_silence = Some(field_text(field).await?),
            "nfe_step" => form.nfe_step = Some(field_text(field).await?),
            "cross_fade_duration" => form.cross_fade_duration = Some(field_text(field).await?),
            _ => {}
        }
    }

    let request = validate_clone(form)?;
    synthesize_and_deliver(&state, request).await
}

/// A JSON scalar accepted where the multipart form would carry text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl FormValue {
    fn into_text(self) -> String {
        match self {
            FormValue::Bool(b) => b.to_string(),
            FormValue::Number(n) => n.to_string(),
            FormValue::Text(s) => s,
        }
    }
}

/// Request body for `POST /api/tts/clone/json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneJsonRequest {
    pub model: Option<String>,
    pub language: Option<String>,
    pub reference_text: Option<String>,
    pub generation_text: Option<String>,
    pub speed: Option<FormValue>,
    pub remove_silence: Option<FormValue>,
    pub nfe_step: Option<FormValue>,
    pub cross_fade_duration: Option<FormValue>,
    /// Reference audio, base64 encoded. A `data:<mime>;base64,` prefix is
    /// allowed.
    pub audio_base64: Option<String>,
}

/// Handler for `POST /api/tts/clone/json`.
pub async fn clone_json_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<CloneJsonRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    })?;

    let audio = match payload.audio_base64.as_deref() {
        Some(encoded) if !encoded.trim().is_empty() => Some(ReferenceAudio {
            bytes: decode_audio_base64(encoded)?,
            file_name: None,
        }),
        _ => None,
    };

    let form = CloneForm {
        model: payload.model,
        language: payload.language,
        ref_text: payload.reference_text,
        gen_text: payload.generation_text,
        speed: payload.speed.map(FormValue::into_text),
        remove_silence: payload.remove_silence.map(FormValue::into_text),
        nfe_step: payload.nfe_step.map(FormValue::into_text),
        cross_fade_duration: payload.cross_fade_duration.map(FormValue::into_text),
        audio,
    };

    let request = validate_clone_with(form, &JSON_CLONE_FIELDS)?;
    synthesize_and_deliver(&state, request).await
}

/// Decodes base64 reference audio, stripping an optional data-URL prefix.
fn decode_audio_base64(encoded: &str) -> Result<Vec<u8>, ValidationError> {
    let encoded = encoded.trim();
    let data = match encoded.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((_, data)) => data,
            None => {
                return Err(ValidationError::Invalid {
                    field: JSON_CLONE_FIELDS.audio,
                    reason: "malformed data URL".to_string(),
                })
            }
        },
        None => encoded,
    };

    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| ValidationError::Invalid {
            field: JSON_CLONE_FIELDS.audio,
            reason: format!("invalid base64: {}", e),
        })
}

async fn synthesize_and_deliver(
    state: &AppState,
    request: SynthesisRequest,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let output = state.synthesis.synthesize(&request).await?;

    tracing::info!(
        language = request.language.as_str(),
        voice = %request.voice.describe(),
        text_bytes = request.text.len(),
        size_bytes = output.size(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "speech generated"
    );

    let entry = state
        .history
        .as_ref()
        .map(|pool| (pool.clone(), history_entry(&request, &output)));

    let response = delivery::audio_response(output).await?;

    if let Some((pool, entry)) = entry {
        record_history(pool, entry).await;
    }
    Ok(response)
}

/// The history row for a generation whose audio is about to be delivered.
fn history_entry(request: &SynthesisRequest, output: &SynthesisOutput) -> NewGeneration {
    NewGeneration {
        language: request.language.as_str().to_string(),
        voice: request.voice.describe(),
        reference_text: request.reference_text.clone(),
        generation_text: request.text.clone(),
        audio_path: output
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Writes a history row. Failures are logged and otherwise ignored.
async fn record_history(pool: DbPool, generation: NewGeneration) {
    let result = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| e.to_string())?;
        record_generation(&conn, &generation).map_err(|e| e.to_string())
    })
    .await;

    match result {
        Ok(Ok(id)) => tracing::debug!(id, "recorded generation"),
        Ok(Err(e)) => tracing::warn!("failed to record generation: {}", e),
        Err(e) => tracing::warn!("history task join error: {}", e),
    }
}

async fn field_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(format!("multipart error: {}", e.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_accepts_plain_and_data_url() {
        assert_eq!(decode_audio_base64("UklGRg==").unwrap(), b"RIFF");
        assert_eq!(
            decode_audio_base64("data:audio/wav;base64,UklGRg==").unwrap(),
            b"RIFF"
        );
    }

    #[test]
    fn bad_base64_names_the_json_field() {
        let err = decode_audio_base64("not base64!").unwrap_err();
        assert_eq!(err.field(), "audioBase64");

        let err = decode_audio_base64("data:audio/wav;base64").unwrap_err();
        assert_eq!(err.field(), "audioBase64");
    }

    #[test]
    fn json_scalars_become_form_text() {
        let body: CloneJsonRequest = serde_json::from_str(
            r#"{"language":"english","generationText":"hi","speed":1.5,
                "removeSilence":true,"nfeStep":"32","audioBase64":"UklGRg=="}"#,
        )
        .unwrap();
        assert_eq!(body.speed.unwrap().into_text(), "1.5");
        assert_eq!(body.remove_silence.unwrap().into_text(), "true");
        assert_eq!(body.nfe_step.unwrap().into_text(), "32");
        assert!(body.reference_text.is_none());
    }
}
