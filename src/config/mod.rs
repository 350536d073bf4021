//! Configuration management for the voice relay
//!
//! Values resolve as env > TOML file > default.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};
use file::RelayConfigFile;

/// Default API port
pub const DEFAULT_PORT: u16 = 8000;

/// Default maximum characters handed to the TTS provider per request
pub const DEFAULT_CHUNK_LIMIT: usize = 3000;

/// Default maximum upload size (25 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Default LLM model
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-pro";

/// Voice relay configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API server configuration
    pub server: ServerConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Upstream provider configuration
    pub providers: ProviderConfig,

    /// Voice synthesis configuration
    pub voice: VoiceConfig,

    /// Conversation store limits
    pub sessions: SessionConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Directory generated audio is written to and served from
    pub output_dir: PathBuf,

    /// Directory for scoped temporary files (system temp dir when `None`)
    pub temp_dir: Option<PathBuf>,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Google Gemini API key (required)
    pub gemini: Option<SecretString>,

    /// `AssemblyAI` API key (speech-to-text)
    pub assemblyai: Option<SecretString>,

    /// Murf API key (text-to-speech)
    pub murf: Option<SecretString>,
}

/// Upstream provider endpoints and request behaviour
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub assemblyai_url: String,
    pub gemini_url: String,
    pub murf_url: String,

    /// LLM model identifier
    pub llm_model: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Delay between transcript status polls
    pub stt_poll_interval: Duration,

    /// Maximum transcript status polls
    pub stt_max_polls: u32,
}

impl ProviderConfig {
    /// HTTP client shared by all provider adapters
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialised
    pub fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?)
    }
}

/// Voice synthesis configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS output format ("MP3", "WAV", ...)
    pub tts_format: String,

    /// TTS sample rate in Hz
    pub tts_sample_rate: u32,

    /// Maximum characters per synthesis request
    pub chunk_limit: usize,

    /// Number of chunks synthesized at once (1 = sequential)
    pub synthesis_concurrency: usize,
}

impl VoiceConfig {
    /// File extension matching the configured output format
    #[must_use]
    pub fn extension(&self) -> String {
        self.tts_format.to_ascii_lowercase()
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            tts_voice: "en-US-angela".to_string(),
            tts_format: "MP3".to_string(),
            tts_sample_rate: 44_100,
            chunk_limit: DEFAULT_CHUNK_LIMIT,
            synthesis_concurrency: 1,
        }
    }
}

/// Conversation store limits
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Sessions kept before least-recently-used eviction
    pub max_sessions: usize,

    /// Idle time after which a session is dropped
    pub idle_ttl: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            idle_ttl: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment and the TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the Gemini API key is missing
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(config_path);
        Self::from_sources(fc, |name| std::env::var(name).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the Gemini API key is missing
    pub fn from_sources(fc: RelayConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret = |var: &str, fallback: Option<String>| {
            env(var)
                .or(fallback)
                .filter(|key| !key.trim().is_empty())
                .map(SecretString::from)
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            gemini: secret("GEMINI_API_KEY", fc.api_keys.gemini),
            assemblyai: secret("ASSEMBLYAI_API_KEY", fc.api_keys.assemblyai),
            murf: secret("MURF_API_KEY", fc.api_keys.murf),
        };

        if api_keys.gemini.is_none() {
            return Err(Error::Config(
                "GEMINI_API_KEY not found in environment or config file".to_string(),
            ));
        }
        if api_keys.assemblyai.is_none() {
            tracing::warn!("ASSEMBLYAI_API_KEY not set, chat requests will fail");
        }
        if api_keys.murf.is_none() {
            tracing::warn!("MURF_API_KEY not set, chat requests will fail");
        }

        // API server config (env > toml > default)
        let server = ServerConfig {
            port: env("VOICE_RELAY_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            output_dir: env("VOICE_RELAY_OUTPUT_DIR")
                .or(fc.server.output_dir)
                .map_or_else(|| PathBuf::from("generated_audio"), PathBuf::from),
            temp_dir: env("VOICE_RELAY_TEMP_DIR")
                .or(fc.server.temp_dir)
                .map(PathBuf::from),
            static_dir: env("VOICE_RELAY_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            max_upload_bytes: fc
                .server
                .max_upload_bytes
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };

        let providers = ProviderConfig {
            assemblyai_url: fc
                .providers
                .assemblyai_url
                .unwrap_or_else(|| "https://api.assemblyai.com".to_string()),
            gemini_url: fc
                .providers
                .gemini_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            murf_url: fc
                .providers
                .murf_url
                .unwrap_or_else(|| "https://api.murf.ai".to_string()),
            llm_model: env("VOICE_RELAY_LLM_MODEL")
                .or(fc.providers.llm_model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            request_timeout: Duration::from_secs(
                fc.providers.request_timeout_secs.unwrap_or(120),
            ),
            stt_poll_interval: Duration::from_millis(
                fc.providers.stt_poll_interval_ms.unwrap_or(3000),
            ),
            stt_max_polls: fc.providers.stt_max_polls.unwrap_or(200),
        };

        let default_voice = VoiceConfig::default();
        let voice = VoiceConfig {
            tts_voice: env("VOICE_RELAY_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(default_voice.tts_voice),
            tts_format: fc.voice.tts_format.unwrap_or(default_voice.tts_format),
            tts_sample_rate: fc
                .voice
                .tts_sample_rate
                .unwrap_or(default_voice.tts_sample_rate),
            chunk_limit: fc
                .voice
                .chunk_limit
                .filter(|&n| n > 0)
                .unwrap_or(default_voice.chunk_limit),
            synthesis_concurrency: fc
                .voice
                .synthesis_concurrency
                .unwrap_or(default_voice.synthesis_concurrency)
                .max(1),
        };

        let sessions = SessionConfig {
            max_sessions: fc
                .sessions
                .max_sessions
                .filter(|&n| n > 0)
                .unwrap_or_else(|| SessionConfig::default().max_sessions),
            idle_ttl: fc.sessions.idle_ttl_secs.map(Duration::from_secs),
        };

        Ok(Self {
            server,
            api_keys,
            providers,
            voice,
            sessions,
        })
    }
}
