//! Error types for the voice relay

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A provider credential was not supplied
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    /// Caller sent something unusable
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Speech-to-text error (provider reported a non-complete status)
    #[error("STT error: {0}")]
    Stt(String),

    /// Language model error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Stable machine-readable kind used in error payloads
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::BadRequest(_) => "bad_request",
            Self::Stt(_) => "transcription_failed",
            Self::Llm(_) => "generation_failed",
            Self::Tts(_) => "synthesis_failed",
            Self::NotFound(_) => "not_found",
            Self::Http(_) => "upstream_transport",
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) | Self::Toml(_) => "internal",
        }
    }

    /// Whether the error came from one of the upstream providers
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Stt(_) | Self::Llm(_) | Self::Tts(_) | Self::Http(_))
    }
}
