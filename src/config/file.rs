//! TOML configuration file loading
//!
//! Supports `~/.config/voice-relay/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Upstream provider endpoints and timing
    #[serde(default)]
    pub providers: ProvidersFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Conversation store limits
    #[serde(default)]
    pub sessions: SessionsFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Directory holding generated audio
    pub output_dir: Option<String>,

    /// Directory for scoped temporary files
    pub temp_dir: Option<String>,

    /// Web UI directory
    pub static_dir: Option<String>,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: Option<usize>,
}

/// Provider endpoints and request behaviour
#[derive(Debug, Default, Deserialize)]
pub struct ProvidersFileConfig {
    pub assemblyai_url: Option<String>,
    pub gemini_url: Option<String>,
    pub murf_url: Option<String>,

    /// LLM model identifier (e.g. "gemini-2.5-pro")
    pub llm_model: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,

    /// Delay between transcript status polls in milliseconds
    pub stt_poll_interval_ms: Option<u64>,

    /// Maximum transcript status polls before giving up
    pub stt_max_polls: Option<u32>,
}

/// Voice synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// TTS voice identifier (e.g. "en-US-angela")
    pub tts_voice: Option<String>,

    /// TTS output format (e.g. "MP3")
    pub tts_format: Option<String>,

    /// TTS sample rate in Hz
    pub tts_sample_rate: Option<u32>,

    /// Maximum characters per synthesis request
    pub chunk_limit: Option<usize>,

    /// Number of chunks synthesized at once
    pub synthesis_concurrency: Option<usize>,
}

/// Conversation store configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionsFileConfig {
    /// Sessions kept before least-recently-used eviction
    pub max_sessions: Option<usize>,

    /// Idle time after which a session is dropped
    pub idle_ttl_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub gemini: Option<String>,
    pub assemblyai: Option<String>,
    pub murf: Option<String>,
}

/// Load the TOML config file from `path`, or from the standard path when `None`
///
/// Returns `RelayConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: Option<&Path>) -> RelayConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return RelayConfigFile::default();
    };

    if !path.exists() {
        return RelayConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                RelayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            RelayConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the contents are not valid TOML for this schema
pub fn parse_config(content: &str) -> crate::Result<RelayConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/voice-relay/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-relay").join("config.toml"))
}
