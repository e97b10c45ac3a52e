//! Session dispatcher
//!
//! Resolves (or lazily creates) a conversation session and feeds user
//! queries to the runtime one at a time, forwarding each displayable
//! response chunk to a `ResponseSink`.
//!
//! # Example
//!
//! ```ignore
//! let dispatcher = SessionDispatcher::new(runtime, sessions, "tester")
//!     .with_memory(memory);
//!
//! let session = dispatcher.resolve_session("default").await?;
//! dispatcher
//!     .dispatch(&session, vec!["Hi, I am Bhoot!", "What is my name?"], &mut console)
//!     .await?;
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;

use crate::core::{FrameworkError, FrameworkResult};
use crate::llm::{Content, Runtime};
use crate::memory::MemoryService;
use crate::session::{Session, SessionKey, SessionService};

/// One or more user queries for a single dispatch call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Queries {
    #[default]
    None,
    Single(String),
    Sequence(Vec<String>),
}

impl Queries {
    /// Normalize into an ordered list; `None`, an empty string and empty
    /// sequences are empty
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Queries::None => Vec::new(),
            Queries::Single(query) if query.is_empty() => Vec::new(),
            Queries::Single(query) => vec![query],
            Queries::Sequence(queries) => queries,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Queries::None => true,
            Queries::Single(query) => query.is_empty(),
            Queries::Sequence(queries) => queries.is_empty(),
        }
    }
}

impl From<&str> for Queries {
    fn from(query: &str) -> Self {
        Queries::Single(query.to_string())
    }
}

impl From<String> for Queries {
    fn from(query: String) -> Self {
        Queries::Single(query)
    }
}

impl From<Vec<String>> for Queries {
    fn from(queries: Vec<String>) -> Self {
        Queries::Sequence(queries)
    }
}

impl From<Vec<&str>> for Queries {
    fn from(queries: Vec<&str>) -> Self {
        Queries::Sequence(queries.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Queries {
    fn from(queries: &[&str]) -> Self {
        Queries::Sequence(queries.iter().map(|q| q.to_string()).collect())
    }
}

impl<T: Into<Queries>> From<Option<T>> for Queries {
    fn from(queries: Option<T>) -> Self {
        queries.map(Into::into).unwrap_or_default()
    }
}

/// Destination for response text and dispatcher notices
pub trait ResponseSink: Send {
    /// A displayable response chunk produced by `author`
    fn response(&mut self, author: &str, text: &str) -> io::Result<()>;

    /// An informational line that is not model output
    fn notice(&mut self, message: &str) -> io::Result<()>;
}

/// Errors returned by the dispatcher
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The session could not be fetched or created
    #[error("Unable to resolve session '{session_id}': {source}")]
    Resolution {
        session_id: String,
        #[source]
        source: FrameworkError,
    },

    /// Failure raised by the runtime while submitting or streaming
    #[error(transparent)]
    Runtime(#[from] anyhow::Error),

    /// The response sink could not be written
    #[error("Failed to write response: {0}")]
    Output(#[from] io::Error),
}

/// What a dispatch call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Messages submitted to the runtime
    pub submitted: usize,
    /// Response chunks forwarded to the sink
    pub printed: usize,
}

/// Resolves sessions and delivers queries to a runtime
pub struct SessionDispatcher {
    runtime: Arc<dyn Runtime>,
    sessions: Arc<dyn SessionService>,
    memory: Option<Arc<dyn MemoryService>>,
    user_id: String,
    initial_state: HashMap<String, Value>,
}

impl SessionDispatcher {
    pub fn new(
        runtime: Arc<dyn Runtime>,
        sessions: Arc<dyn SessionService>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            sessions,
            memory: None,
            user_id: user_id.into(),
            initial_state: HashMap::new(),
        }
    }

    /// Record sessions into `memory` after each answered query
    pub fn with_memory(mut self, memory: Arc<dyn MemoryService>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// State seeded into sessions this dispatcher creates
    pub fn with_initial_state(mut self, state: HashMap<String, Value>) -> Self {
        self.initial_state = state;
        self
    }

    pub fn app_name(&self) -> &str {
        self.runtime.app_name()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_key(&self, session_id: &str) -> SessionKey {
        SessionKey::new(self.app_name(), &self.user_id, session_id)
    }

    /// Fetch the session for `session_id`, creating it on first use.
    ///
    /// An existing session is returned unchanged. Storage failures come back
    /// as `DispatchError::Resolution`; nothing is retried.
    pub async fn resolve_session(&self, session_id: &str) -> Result<Session, DispatchError> {
        let key = self.session_key(session_id);
        tracing::debug!("Resolving session {}", key);

        match self.get_or_create(&key).await {
            Ok(session) => {
                tracing::debug!(
                    "Session {} ready ({} events)",
                    key,
                    session.history().len()
                );
                Ok(session)
            }
            Err(source) => {
                tracing::warn!("Unable to resolve session {}: {}", key, source);
                Err(DispatchError::Resolution {
                    session_id: session_id.to_string(),
                    source,
                })
            }
        }
    }

    async fn get_or_create(&self, key: &SessionKey) -> FrameworkResult<Session> {
        if let Some(session) = self.sessions.get_session(key).await? {
            return Ok(session);
        }

        match self
            .sessions
            .create_session(key, self.initial_state.clone())
            .await
        {
            Ok(session) => Ok(session),
            // Lost a creation race; the winner's session is the one to use
            Err(FrameworkError::SessionExists(_)) => self
                .sessions
                .get_session(key)
                .await?
                .ok_or_else(|| FrameworkError::SessionNotFound(key.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Deliver `queries` to `session` strictly in order.
    ///
    /// Each query's event stream is drained before the next one is
    /// submitted. Events whose first text part is empty or the `"None"`
    /// placeholder are skipped silently.
    pub async fn dispatch<S>(
        &self,
        session: &Session,
        queries: impl Into<Queries>,
        sink: &mut S,
    ) -> Result<DispatchSummary, DispatchError>
    where
        S: ResponseSink + ?Sized,
    {
        let queries = queries.into();
        let mut summary = DispatchSummary::default();

        if queries.is_empty() {
            tracing::info!("No queries for session {}", session.key());
            sink.notice("No queries passed by the user")?;
            return Ok(summary);
        }

        for query in queries.into_vec() {
            let printed = self.dispatch_one(session, query, sink).await?;
            summary.submitted += 1;
            summary.printed += printed;

            if printed > 0 {
                self.remember(session).await;
            }
        }

        tracing::info!(
            "Dispatched {} queries to session {} ({} responses)",
            summary.submitted,
            session.key(),
            summary.printed
        );

        Ok(summary)
    }

    async fn dispatch_one<S>(
        &self,
        session: &Session,
        query: String,
        sink: &mut S,
    ) -> Result<usize, DispatchError>
    where
        S: ResponseSink + ?Sized,
    {
        tracing::debug!("Sending query to session {}", session.key());
        let message = Content::user_text(query);

        let mut events = self
            .runtime
            .stream(session.user_id(), session.id(), message)
            .await?;

        tracing::debug!("Streaming response for session {}", session.key());
        let mut printed = 0;

        while let Some(event) = events.next().await {
            let event = event?;
            if let Some(text) = event.display_text() {
                sink.response(self.app_name(), text)?;
                printed += 1;
            }
        }

        tracing::debug!(
            "Session {} idle after {} responses",
            session.key(),
            printed
        );
        Ok(printed)
    }

    /// Best-effort hand-off of the latest session snapshot to memory
    async fn remember(&self, session: &Session) {
        let Some(memory) = &self.memory else {
            return;
        };

        let snapshot = match self.sessions.get_session(&session.key()).await {
            Ok(Some(latest)) => latest,
            Ok(None) => session.clone(),
            Err(e) => {
                tracing::warn!("Could not reload session {} for memory: {}", session.key(), e);
                session.clone()
            }
        };

        if let Err(e) = memory.add_session(&snapshot).await {
            tracing::warn!("Failed to add session {} to memory: {}", session.key(), e);
        }
    }
}
