//! Speech-to-text (STT) processing

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{Error, Result};

/// Turns recorded speech into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe audio to text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stt`] when the provider does not complete the
    /// transcription and [`Error::Http`] on transport failures
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Response from the `AssemblyAI` upload endpoint
#[derive(Deserialize)]
struct UploadResponse {
    upload_url: String,
}

/// Transcript job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

/// Transcript job as returned by create and poll requests
#[derive(Deserialize)]
struct TranscriptResponse {
    id: String,
    status: TranscriptStatus,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Transcribes speech with `AssemblyAI`
///
/// Audio is staged in a scoped temporary file for the duration of the call,
/// uploaded, and a transcript job is polled until it completes or errors.
pub struct AssemblyAiTranscriber {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
    temp_dir: Option<PathBuf>,
}

impl AssemblyAiTranscriber {
    /// Create a new transcriber
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(3),
            max_polls: 200,
            temp_dir: None,
        }
    }

    /// Set the delay between status polls
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how many status polls are made before giving up
    #[must_use]
    pub const fn max_polls(mut self, polls: u32) -> Self {
        self.max_polls = polls;
        self
    }

    /// Stage inbound audio in `dir` instead of the system temp directory
    #[must_use]
    pub fn temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Write audio to a temporary file that is removed when dropped
    async fn stage(&self, audio: &[u8]) -> Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("input_").suffix(".wav");
        let staged = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        tokio::fs::write(staged.path(), audio).await?;
        Ok(staged)
    }

    async fn upload(&self, audio: Vec<u8>) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v2/upload", self.base_url))
            .header("authorization", self.api_key.expose_secret())
            .header("content-type", "application/octet-stream")
            .body(audio)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "AssemblyAI upload failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "AssemblyAI upload error");
            return Err(Error::Stt(format!("AssemblyAI upload error {status}: {body}")));
        }

        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("invalid AssemblyAI upload response: {e}")))?;
        Ok(upload.upload_url)
    }

    async fn create_transcript(&self, audio_url: &str) -> Result<TranscriptResponse> {
        #[derive(serde::Serialize)]
        struct TranscriptRequest<'a> {
            audio_url: &'a str,
        }

        let response = self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", self.api_key.expose_secret())
            .json(&TranscriptRequest { audio_url })
            .send()
            .await?;

        Self::parse_transcript(response).await
    }

    async fn fetch_transcript(&self, id: &str) -> Result<TranscriptResponse> {
        let response = self
            .client
            .get(format!("{}/v2/transcript/{id}", self.base_url))
            .header("authorization", self.api_key.expose_secret())
            .send()
            .await?;

        Self::parse_transcript(response).await
    }

    async fn parse_transcript(response: reqwest::Response) -> Result<TranscriptResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "AssemblyAI API error");
            return Err(Error::Stt(format!("AssemblyAI API error {status}: {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("invalid AssemblyAI transcript response: {e}")))
    }
}

#[async_trait]
impl Transcriber for AssemblyAiTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting AssemblyAI transcription");

        let staged = self.stage(audio).await?;
        let upload_url = self.upload(tokio::fs::read(staged.path()).await?).await?;

        let mut transcript = self.create_transcript(&upload_url).await?;
        let mut polls = 0;

        loop {
            match transcript.status {
                TranscriptStatus::Completed => {
                    let text = transcript.text.unwrap_or_default().trim().to_string();
                    tracing::info!(transcript = %text, "transcription complete");
                    return Ok(text);
                }
                TranscriptStatus::Error => {
                    let reason = transcript
                        .error
                        .unwrap_or_else(|| "unknown error".to_string());
                    tracing::warn!(id = %transcript.id, reason = %reason, "transcription failed");
                    return Err(Error::Stt(format!("transcription failed: {reason}")));
                }
                TranscriptStatus::Queued
                | TranscriptStatus::Processing
                | TranscriptStatus::Unknown => {}
            }

            if polls >= self.max_polls {
                return Err(Error::Stt(format!(
                    "transcription {} did not complete after {polls} polls",
                    transcript.id
                )));
            }
            polls += 1;

            tokio::time::sleep(self.poll_interval).await;
            transcript = self.fetch_transcript(&transcript.id).await?;
            tracing::debug!(id = %transcript.id, status = ?transcript.status, "polled transcript");
        }
    }

    fn name(&self) -> &'static str {
        "assemblyai"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn mock_upload(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v2/upload"))
            .and(header("authorization", "test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "upload_url": "https://cdn.example/audio" })),
            )
            .mount(server)
            .await;
    }

    fn transcriber(server: &MockServer) -> AssemblyAiTranscriber {
        AssemblyAiTranscriber::new(
            reqwest::Client::new(),
            SecretString::from("test-key".to_string()),
            server.uri(),
        )
        .poll_interval(Duration::ZERO)
        .max_polls(3)
    }

    #[tokio::test]
    async fn polls_until_completed() {
        let server = MockServer::start().await;
        mock_upload(&server).await;

        Mock::given(method("POST"))
            .and(path("/v2/transcript"))
            .and(body_json(json!({ "audio_url": "https://cdn.example/audio" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "t1", "status": "queued" })),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v2/transcript/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t1",
                "status": "completed",
                "text": "  hello there "
            })))
            .mount(&server)
            .await;

        let text = transcriber(&server).transcribe(b"RIFF....").await.unwrap();
        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn error_status_is_transcription_failure() {
        let server = MockServer::start().await;
        mock_upload(&server).await;

        Mock::given(method("POST"))
            .and(path("/v2/transcript"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t2",
                "status": "error",
                "error": "audio too short"
            })))
            .mount(&server)
            .await;

        let err = transcriber(&server).transcribe(b"x").await.unwrap_err();
        assert!(matches!(err, Error::Stt(ref msg) if msg.contains("audio too short")));
    }

    #[tokio::test]
    async fn gives_up_after_max_polls() {
        let server = MockServer::start().await;
        mock_upload(&server).await;

        Mock::given(method("POST"))
            .and(path("/v2/transcript"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "t3", "status": "queued" })),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v2/transcript/t3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "t3", "status": "processing" })),
            )
            .expect(3)
            .mount(&server)
            .await;

        let err = transcriber(&server).transcribe(b"x").await.unwrap_err();
        assert!(matches!(err, Error::Stt(_)));
    }

    #[tokio::test]
    async fn rejected_upload_is_transcription_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/upload"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = transcriber(&server).transcribe(b"x").await.unwrap_err();
        assert_eq!(err.kind(), "transcription_failed");
    }

    #[tokio::test]
    async fn staged_audio_is_removed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/upload"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let stt = transcriber(&server).temp_dir(Some(dir.path().to_path_buf()));
        let _ = stt.transcribe(b"audio").await;

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
