//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Turns text into audio bytes
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one chunk of text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tts`] on a non-success provider response and
    /// [`Error::Http`] on transport failures
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Response from the Murf generate endpoint
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    audio_file: Option<String>,
}

/// Synthesizes speech with Murf
///
/// Murf answers a generate request with a download locator; the audio is
/// fetched from that locator in a second request.
pub struct MurfSynthesizer {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    voice: String,
    format: String,
    sample_rate: u32,
}

impl MurfSynthesizer {
    /// Create a new synthesizer using the voice settings from `voice`
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_key: SecretString,
        base_url: impl Into<String>,
        voice: &VoiceConfig,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            voice: voice.tts_voice.clone(),
            format: voice.tts_format.clone(),
            sample_rate: voice.tts_sample_rate,
        }
    }

    async fn request_locator(&self, text: &str) -> Result<String> {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GenerateRequest<'a> {
            voice_id: &'a str,
            text: &'a str,
            format: &'a str,
            sample_rate: u32,
        }

        let request = GenerateRequest {
            voice_id: &self.voice,
            text,
            format: &self.format,
            sample_rate: self.sample_rate,
        };

        let response = self
            .client
            .post(format!("{}/v1/speech/generate", self.base_url))
            .header("api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Murf API error");
            return Err(Error::Tts(format!("Murf error {status}: {body}")));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Tts(format!("invalid Murf response: {e}")))?;
        generated
            .audio_file
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::Tts("Murf response had no audio locator".to_string()))
    }

    async fn download(&self, locator: &str) -> Result<Vec<u8>> {
        let response = self.client.get(locator).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Tts(format!("audio download failed with {status}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for MurfSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.chars().count(), voice = %self.voice, "requesting Murf synthesis");

        let locator = self.request_locator(text).await?;
        let audio = self.download(&locator).await?;

        tracing::debug!(audio_bytes = audio.len(), "synthesized chunk");
        Ok(audio)
    }

    fn name(&self) -> &'static str {
        "murf"
    }
}
