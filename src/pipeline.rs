//! End-to-end chat pipeline
//!
//! One call takes a recording through transcription, the conversation store,
//! the language model, chunked synthesis and concatenation:
//!
//! ```text
//! ReceivingAudio → Transcribing → AppendingUserTurn → GeneratingReply
//!   → AppendingAssistantTurn → Chunking → Synthesizing → Concatenating → Done
//! ```
//!
//! Any failure stops the run at the stage it happened in. Nothing is retried.
//! The session stays locked from rendering the prompt until both turns are
//! appended, so concurrent requests on one session cannot interleave. The
//! user turn and the assistant turn are committed together once the reply
//! exists, which keeps every session strictly alternating.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::Instrument;

use crate::config::{Config, DEFAULT_CHUNK_LIMIT};
use crate::conversation::{ConversationStore, Role};
use crate::files::ArtifactStore;
use crate::llm::{GeminiClient, ReplyGenerator};
use crate::voice::{
    AssemblyAiTranscriber, MurfSynthesizer, SpeechSynthesizer, Transcriber, chunk_text,
};
use crate::{Error, Result};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReceivingAudio,
    Transcribing,
    AppendingUserTurn,
    GeneratingReply,
    AppendingAssistantTurn,
    Chunking,
    Synthesizing,
    Concatenating,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReceivingAudio => "receiving_audio",
            Self::Transcribing => "transcribing",
            Self::AppendingUserTurn => "appending_user_turn",
            Self::GeneratingReply => "generating_reply",
            Self::AppendingAssistantTurn => "appending_assistant_turn",
            Self::Chunking => "chunking",
            Self::Synthesizing => "synthesizing",
            Self::Concatenating => "concatenating",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// A failed run, tagged with the stage that failed
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl PipelineError {
    /// Wire kind of the underlying error
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.source.kind()
    }
}

/// Attach `stage` to an error
fn at(stage: Stage) -> impl FnOnce(Error) -> PipelineError {
    move |source| PipelineError { stage, source }
}

/// Successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub session_id: String,
    pub transcript: String,
    pub assistant_text: String,
    /// Bare artifact filename, served under `/files/`
    pub audio_file: String,
}

/// Composes the providers, conversation store and artifact store
pub struct SessionPipeline {
    transcriber: Option<Arc<dyn Transcriber>>,
    generator: Arc<dyn ReplyGenerator>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    store: Arc<ConversationStore>,
    artifacts: ArtifactStore,
    chunk_limit: usize,
    synthesis_concurrency: usize,
}

impl fmt::Debug for SessionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPipeline")
            .field("transcriber", &self.transcriber.as_ref().map(|t| t.name()))
            .field("generator", &self.generator.name())
            .field("synthesizer", &self.synthesizer.as_ref().map(|s| s.name()))
            .field("chunk_limit", &self.chunk_limit)
            .field("synthesis_concurrency", &self.synthesis_concurrency)
            .finish_non_exhaustive()
    }
}

impl SessionPipeline {
    /// Create a pipeline; speech providers are attached with the builder methods
    #[must_use]
    pub fn new(
        generator: Arc<dyn ReplyGenerator>,
        store: Arc<ConversationStore>,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            transcriber: None,
            generator,
            synthesizer: None,
            store,
            artifacts,
            chunk_limit: DEFAULT_CHUNK_LIMIT,
            synthesis_concurrency: 1,
        }
    }

    /// Wire the configured providers, stores and limits together
    ///
    /// Providers whose credential is missing are left out; runs then fail
    /// with a not-configured error instead of reaching the provider.
    ///
    /// # Errors
    ///
    /// Returns error if the LLM key is missing, the HTTP client cannot be
    /// built, or the output directory cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = config.providers.http_client()?;

        let gemini_key = config
            .api_keys
            .gemini
            .clone()
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is required".to_string()))?;
        let generator = GeminiClient::new(
            client.clone(),
            gemini_key,
            &config.providers.gemini_url,
            &config.providers.llm_model,
        );

        let artifacts = ArtifactStore::new(&config.server.output_dir, config.voice.extension())?
            .with_temp_dir(config.server.temp_dir.clone())?;
        let store = Arc::new(ConversationStore::new(config.sessions));

        let mut pipeline = Self::new(Arc::new(generator), store, artifacts)
            .chunk_limit(config.voice.chunk_limit)
            .synthesis_concurrency(config.voice.synthesis_concurrency);

        if let Some(key) = &config.api_keys.assemblyai {
            let transcriber =
                AssemblyAiTranscriber::new(client.clone(), key.clone(), &config.providers.assemblyai_url)
                    .poll_interval(config.providers.stt_poll_interval)
                    .max_polls(config.providers.stt_max_polls)
                    .temp_dir(config.server.temp_dir.clone());
            pipeline = pipeline.transcriber(Arc::new(transcriber));
        }

        if let Some(key) = &config.api_keys.murf {
            let synthesizer =
                MurfSynthesizer::new(client, key.clone(), &config.providers.murf_url, &config.voice);
            pipeline = pipeline.synthesizer(Arc::new(synthesizer));
        }

        Ok(pipeline)
    }

    /// Set the speech-to-text provider
    #[must_use]
    pub fn transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Set the text-to-speech provider
    #[must_use]
    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Set the maximum characters per synthesis request
    #[must_use]
    pub const fn chunk_limit(mut self, limit: usize) -> Self {
        self.chunk_limit = limit;
        self
    }

    /// Set how many chunks are synthesized at once
    #[must_use]
    pub fn synthesis_concurrency(mut self, concurrency: usize) -> Self {
        self.synthesis_concurrency = concurrency.max(1);
        self
    }

    /// Conversation store backing this pipeline
    #[must_use]
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Artifact store output is written to
    #[must_use]
    pub const fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Run one chat exchange for `session_id`
    ///
    /// # Errors
    ///
    /// Returns the first failure, tagged with the stage it occurred in
    pub async fn run(
        &self,
        session_id: &str,
        audio: &[u8],
    ) -> std::result::Result<ChatReply, PipelineError> {
        let span = tracing::info_span!("chat", session_id);
        self.run_stages(session_id, audio).instrument(span).await
    }

    async fn run_stages(
        &self,
        session_id: &str,
        audio: &[u8],
    ) -> std::result::Result<ChatReply, PipelineError> {
        enter(Stage::ReceivingAudio);
        if audio.is_empty() {
            return Err(at(Stage::ReceivingAudio)(Error::BadRequest(
                "empty audio upload".to_string(),
            )));
        }
        let transcriber = self
            .transcriber
            .as_ref()
            .ok_or(Error::NotConfigured("speech-to-text"))
            .map_err(at(Stage::ReceivingAudio))?;
        let synthesizer = self
            .synthesizer
            .as_ref()
            .ok_or(Error::NotConfigured("text-to-speech"))
            .map_err(at(Stage::ReceivingAudio))?;

        enter(Stage::Transcribing);
        let transcript = transcriber
            .transcribe(audio)
            .await
            .map_err(at(Stage::Transcribing))?;

        let reply = {
            let mut session = self.store.lock(session_id).await;

            // The user turn goes into the prompt now but is only committed
            // together with its reply, so a failed generation leaves the
            // session alternating
            enter(Stage::AppendingUserTurn);
            let mut prompt = session.render();
            prompt.push_str(Role::User.prefix());
            prompt.push_str(&transcript);
            prompt.push('\n');

            enter(Stage::GeneratingReply);
            let reply = self
                .generator
                .generate(&prompt)
                .await
                .map_err(at(Stage::GeneratingReply))?
                .trim()
                .to_string();

            enter(Stage::AppendingAssistantTurn);
            session.push(Role::User, transcript.clone());
            session.push(Role::Assistant, reply.clone());
            reply
        };

        enter(Stage::Chunking);
        let audio_file = if reply.is_empty() {
            tracing::info!("empty reply, writing empty audio file");
            enter(Stage::Concatenating);
            self.artifacts
                .write(&[])
                .await
                .map_err(at(Stage::Concatenating))?
        } else {
            let chunks = chunk_text(&reply, self.chunk_limit);
            tracing::debug!(chunks = chunks.len(), reply_chars = reply.chars().count(), "chunked reply");
            self.synthesize(synthesizer, &chunks).await?
        };

        enter(Stage::Done);
        tracing::info!(audio_file = %audio_file, "chat complete");

        Ok(ChatReply {
            session_id: session_id.to_string(),
            transcript,
            assistant_text: reply,
            audio_file,
        })
    }

    /// Synthesize every chunk and concatenate the segments in chunk order
    async fn synthesize(
        &self,
        synthesizer: &Arc<dyn SpeechSynthesizer>,
        chunks: &[&str],
    ) -> std::result::Result<String, PipelineError> {
        enter(Stage::Synthesizing);
        let mut assembly = self.artifacts.begin().map_err(at(Stage::Synthesizing))?;

        let pending: Vec<_> = chunks
            .iter()
            .map(|chunk| synthesizer.synthesize(chunk))
            .collect();
        let mut segments =
            futures::stream::iter(pending).buffered(self.synthesis_concurrency);

        while let Some(segment) = segments.next().await {
            let segment = segment.map_err(at(Stage::Synthesizing))?;
            assembly
                .push(&segment)
                .await
                .map_err(at(Stage::Synthesizing))?;
        }

        enter(Stage::Concatenating);
        self.artifacts
            .finish(assembly)
            .await
            .map_err(at(Stage::Concatenating))
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "pipeline stage");
}
