//! In-memory conversation store
//!
//! Sessions are keyed by a caller-supplied opaque id and hold an append-only
//! list of turns. The map is bounded: least-recently-used sessions are
//! evicted once `max_sessions` is reached, and an optional idle TTL drops
//! stale sessions on their next access.
//!
//! Each session sits behind its own async mutex so a request can hold it
//! across append, generate and append without blocking other sessions.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::SessionConfig;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Prefix used when rendering the conversation as a prompt
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::User => "User: ",
            Self::Assistant => "Assistant: ",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Ordered turns of a single conversation
#[derive(Debug, Default)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    /// Append a turn
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn {
            role,
            content: content.into(),
        });
    }

    /// Turns in conversation order
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the session has no turns yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render every turn as `"<Prefix><content>\n"`
    ///
    /// This string is the whole prompt handed to the language model.
    #[must_use]
    pub fn render(&self) -> String {
        let capacity = self
            .turns
            .iter()
            .map(|t| t.role.prefix().len() + t.content.len() + 1)
            .sum();
        let mut out = String::with_capacity(capacity);
        for turn in &self.turns {
            out.push_str(turn.role.prefix());
            out.push_str(&turn.content);
            out.push('\n');
        }
        out
    }
}

/// Shared handle to one session
pub type SessionHandle = Arc<Mutex<Session>>;

struct Entry {
    session: SessionHandle,
    last_used: Instant,
}

/// Process-wide mapping from session id to conversation
pub struct ConversationStore {
    sessions: Mutex<LruCache<String, Entry>>,
    idle_ttl: Option<Duration>,
}

impl fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationStore")
            .field("idle_ttl", &self.idle_ttl)
            .finish_non_exhaustive()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl ConversationStore {
    /// Create a store with the given limits
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            idle_ttl: config.idle_ttl,
        }
    }

    /// Return the session for `session_id`, creating an empty one if unseen
    pub async fn get_or_create(&self, session_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();

        let expired = self.idle_ttl.is_some_and(|ttl| {
            sessions
                .peek(session_id)
                .is_some_and(|entry| now.duration_since(entry.last_used) > ttl)
        });
        if expired {
            tracing::debug!(session_id, "session idle past TTL, starting fresh");
            sessions.pop(session_id);
        }

        if let Some(entry) = sessions.get_mut(session_id) {
            entry.last_used = now;
            return Arc::clone(&entry.session);
        }

        let session = SessionHandle::default();
        let entry = Entry {
            session: Arc::clone(&session),
            last_used: now,
        };
        if let Some((evicted, _)) = sessions.push(session_id.to_string(), entry) {
            if evicted != session_id {
                tracing::info!(session_id = %evicted, "evicted least recently used session");
            }
        }
        tracing::debug!(session_id, "created session");
        session
    }

    /// Lock a session for a read-modify-write sequence
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<Session> {
        self.get_or_create(session_id).await.lock_owned().await
    }

    /// Append a turn to a session
    pub async fn append(&self, session_id: &str, role: Role, content: impl Into<String>) {
        self.lock(session_id).await.push(role, content);
    }

    /// Render a session as a prompt
    pub async fn render(&self, session_id: &str) -> String {
        self.lock(session_id).await.render()
    }

    /// Snapshot of a session's turns
    pub async fn turns(&self, session_id: &str) -> Vec<Turn> {
        self.lock(session_id).await.turns().to_vec()
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no session has been created
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Whether a session exists without touching its recency
    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().await.contains(session_id)
    }
}
