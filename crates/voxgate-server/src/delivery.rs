//! Streams generated audio to the client and deletes it afterwards.

use axum::{
    body::{Body, Bytes},
    http::{header, StatusCode},
    response::Response,
};
use tokio::io::AsyncReadExt;
use voxgate_voice::SynthesisOutput;

use crate::api::ApiError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Builds a `200 audio/wav` response whose body streams `output`.
///
/// The output file is owned by the body stream, so it is deleted when the
/// stream finishes, fails, or is dropped because the client went away.
///
/// # Errors
///
/// Returns `ApiError::InternalServerError` if the file cannot be opened. The
/// file is removed in that case too.
pub async fn audio_response(output: SynthesisOutput) -> Result<Response, ApiError> {
    let size = output.size();
    let file = output.into_file();

    let mut reader = match tokio::fs::File::open(file.path()).await {
        Ok(reader) => reader,
        Err(e) => {
            tracing::error!(path = %file.path().display(), "failed to open generated audio: {}", e);
            file.remove().await;
            return Err(ApiError::InternalServerError(
                "failed to read generated audio".to_string(),
            ));
        }
    };

    let stream = async_stream::stream! {
        let file = file;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => yield Ok::<_, std::io::Error>(Bytes::copy_from_slice(&buf[..n])),
                Err(e) => {
                    tracing::warn!(path = %file.path().display(), "audio stream read failed: {}", e);
                    yield Err(e);
                    break;
                }
            }
        }
        drop(reader);
        file.remove().await;
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(header::CONTENT_LENGTH, size)
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::InternalServerError(format!("failed to build response: {}", e)))
}
