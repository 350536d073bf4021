//! Voice processing module
//!
//! Speech-to-text and text-to-speech provider adapters, plus the chunker
//! that keeps synthesis requests under the provider's size limit.

mod chunking;
mod stt;
mod tts;

pub use chunking::chunk_text;
pub use stt::{AssemblyAiTranscriber, Transcriber};
pub use tts::{MurfSynthesizer, SpeechSynthesizer};
