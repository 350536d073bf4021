//! Voice chat endpoint

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartRejection},
    routing::post,
};
use serde::Serialize;

use super::{ApiError, ApiState};
use crate::pipeline::ChatReply;

/// Multipart field carrying the recording
const AUDIO_FIELD: &str = "file";

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/agent/chat/{session_id}", post(chat))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

/// Successful chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub reply: ChatReply,
}

/// Run one voice exchange for a session
///
/// Expects a multipart form with the recording in the `file` field; when no
/// field has that name the first field is used.
async fn chat(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let audio = read_audio(multipart?).await?;
    tracing::info!(session_id = %session_id, audio_bytes = audio.len(), "received chat audio");

    let reply = state.pipeline.run(&session_id, &audio).await?;
    Ok(Json(ChatResponse { ok: true, reply }))
}

/// Pull the recording out of the multipart body
async fn read_audio(mut multipart: Multipart) -> Result<Bytes, ApiError> {
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await? {
        let is_audio = field.name() == Some(AUDIO_FIELD);
        let bytes = field.bytes().await?;
        if is_audio {
            return Ok(bytes);
        }
        fallback.get_or_insert(bytes);
    }

    fallback.ok_or_else(|| ApiError::bad_request("multipart form has no audio file"))
}
