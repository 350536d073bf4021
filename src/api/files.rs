//! Generated audio download endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

use super::{ApiError, ApiState};
use crate::Error;
use crate::files::content_type;

/// Build file-serving router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/files/{filename}", get(serve_file))
        .with_state(state)
}

/// Return an artifact produced by the chat pipeline
async fn serve_file(
    State(state): State<Arc<ApiState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let audio = state
        .pipeline
        .artifacts()
        .read(&filename)
        .await
        .map_err(|e| match e {
            Error::NotFound(_) => ApiError::not_found("File not found"),
            other => other.into(),
        })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type(&filename))],
        audio,
    )
        .into_response())
}
