//! Voice Relay - Spoken conversation relay for AI assistants
//!
//! One HTTP request carries a recording in and an audio reply out:
//! - Speech-to-text (`AssemblyAI`)
//! - Per-session conversation history
//! - Reply generation (Gemini)
//! - Chunked text-to-speech (Murf), concatenated into one file
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    HTTP API                          │
//! │   POST /agent/chat/{id}  │  GET /files/{name}        │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Session Pipeline                     │
//! │   STT  │  Conversation  │  LLM  │  Chunking  │  TTS │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Artifact Store                       │
//! │   scoped segments  │  atomic concatenated output     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod files;
pub mod llm;
pub mod pipeline;
pub mod voice;

pub use config::Config;
pub use conversation::{ConversationStore, Role, Session, Turn};
pub use error::{Error, Result};
pub use files::ArtifactStore;
pub use llm::{GeminiClient, ReplyGenerator};
pub use pipeline::{ChatReply, PipelineError, SessionPipeline, Stage};
pub use voice::{
    AssemblyAiTranscriber, MurfSynthesizer, SpeechSynthesizer, Transcriber, chunk_text,
};
