//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use voice_relay::config::SessionConfig;
use voice_relay::{
    ArtifactStore, ConversationStore, Error, ReplyGenerator, Result, SessionPipeline,
    SpeechSynthesizer, Transcriber,
};

/// Transcriber returning a fixed transcript, or failing
pub struct StaticTranscriber {
    transcript: Option<String>,
}

impl StaticTranscriber {
    pub fn ok(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: Some(transcript.to_string()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { transcript: None })
    }
}

#[async_trait]
impl Transcriber for StaticTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        self.transcript
            .clone()
            .ok_or_else(|| Error::Stt("transcription status: error".to_string()))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Generator replying from a script and recording every prompt it saw
pub struct ScriptedGenerator {
    replies: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    failures_left: Mutex<usize>,
}

impl ScriptedGenerator {
    /// Replies are handed out in order; the last one repeats
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().rev().map(ToString::to_string).collect()),
            prompts: Mutex::new(Vec::new()),
            failures_left: Mutex::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Self::failing_first(usize::MAX, &[])
    }

    /// Fail the first `failures` calls, then reply from the script
    pub fn failing_first(failures: usize, replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().rev().map(ToString::to_string).collect()),
            prompts: Mutex::new(Vec::new()),
            failures_left: Mutex::new(failures),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        {
            let mut failures_left = self.failures_left.lock().unwrap();
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(Error::Llm("quota exceeded".to_string()));
            }
        }

        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop()
        } else {
            replies.last().cloned()
        };
        Ok(reply.unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Synthesizer returning the chunk text itself as the "audio"
///
/// Concatenated output therefore equals the concatenated chunks, which makes
/// ordering visible in assertions.
pub struct EchoSynthesizer {
    calls: Mutex<Vec<String>>,
    delay_first: Option<Duration>,
}

impl EchoSynthesizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            delay_first: None,
        })
    }

    /// Make the first chunk finish last
    pub fn slow_first(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            delay_first: Some(delay),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let first = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(text.to_string());
            calls.len() == 1
        };
        if let (true, Some(delay)) = (first, self.delay_first) {
            tokio::time::sleep(delay).await;
        }
        Ok(text.as_bytes().to_vec())
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

/// Synthesizer that fails on the n-th call (zero-based)
pub struct FailingSynthesizer {
    fail_at: usize,
    calls: Mutex<usize>,
}

impl FailingSynthesizer {
    pub fn at(fail_at: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_at,
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for FailingSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls - 1
        };
        if call == self.fail_at {
            return Err(Error::Tts("voice not found".to_string()));
        }
        Ok(text.as_bytes().to_vec())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Pipeline over a fresh output directory
pub struct TestPipeline {
    pub pipeline: SessionPipeline,
    pub output: TempDir,
}

impl TestPipeline {
    pub fn new(
        transcriber: Option<Arc<dyn Transcriber>>,
        generator: Arc<dyn ReplyGenerator>,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        let output = TempDir::new().unwrap();
        let artifacts = ArtifactStore::new(output.path(), "mp3").unwrap();
        let store = Arc::new(ConversationStore::new(SessionConfig::default()));

        let mut pipeline = SessionPipeline::new(generator, store, artifacts);
        if let Some(transcriber) = transcriber {
            pipeline = pipeline.transcriber(transcriber);
        }
        if let Some(synthesizer) = synthesizer {
            pipeline = pipeline.synthesizer(synthesizer);
        }

        Self { pipeline, output }
    }

    /// Files currently in the output directory, staging files included
    pub fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.output.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// A few bytes standing in for a recording
pub const AUDIO: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";
