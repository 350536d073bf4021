//! Error payloads returned by the HTTP API
//!
//! Every failure is answered with `{"ok": false, "kind": ..., "message": ...}`.
//! The status code separates caller mistakes (4xx) from provider trouble
//! (502) and missing configuration (503).

use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::Error;
use crate::pipeline::PipelineError;

/// API error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    /// Create an error with an explicit status and kind
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    /// Request could not be used
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// Named resource does not exist
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// HTTP status of this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Wire kind of this error
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }
}

/// Status code for a crate error
fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        e if e.is_upstream() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self::new(status_for(&error), error.kind(), error.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        let status = status_for(&error.source);
        if status.is_server_error() {
            tracing::error!(stage = %error.stage, error = %error.source, "chat failed");
        } else {
            tracing::warn!(stage = %error.stage, error = %error.source, "chat rejected");
        }
        Self::new(status, error.kind(), error.to_string())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self::new(error.status(), "bad_request", error.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            ok: bool,
            kind: &'static str,
            message: String,
        }

        (
            self.status,
            Json(ErrorResponse {
                ok: false,
                kind: self.kind,
                message: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    #[test]
    fn maps_statuses() {
        let cases = [
            (Error::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::NotConfigured("text-to-speech"), StatusCode::SERVICE_UNAVAILABLE),
            (Error::Stt("x".into()), StatusCode::BAD_GATEWAY),
            (Error::Llm("x".into()), StatusCode::BAD_GATEWAY),
            (Error::Tts("x".into()), StatusCode::BAD_GATEWAY),
            (Error::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn pipeline_error_keeps_kind() {
        let err = ApiError::from(PipelineError {
            stage: Stage::Synthesizing,
            source: Error::Tts("Murf error 500".into()),
        });
        assert_eq!(err.kind(), "synthesis_failed");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn renders_tagged_payload() {
        let response = ApiError::not_found("File not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "ok": false, "kind": "not_found", "message": "File not found" })
        );
    }
}
