//! Long-term memory
//!
//! A memory service receives whole sessions after a turn so that later
//! conversations can recall them. Retrieval is left to the model side.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::llm::Event;
use crate::session::{Session, SessionKey};

/// Sink for completed session snapshots
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// Record a session. Callers treat this as best-effort.
    async fn add_session(&self, session: &Session) -> Result<()>;
}

/// Memory service that keeps the latest snapshot of each session in process
#[derive(Debug, Default)]
pub struct InMemoryMemoryService {
    entries: RwLock<HashMap<SessionKey, Vec<Event>>>,
}

impl InMemoryMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events remembered for a session, if it was ever added
    pub async fn remembered(&self, key: &SessionKey) -> Option<Vec<Event>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Number of sessions recorded
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl MemoryService for InMemoryMemoryService {
    async fn add_session(&self, session: &Session) -> Result<()> {
        let key = session.key();
        tracing::debug!(
            "Recording session {} in memory ({} events)",
            key,
            session.history().len()
        );
        self.entries
            .write()
            .await
            .insert(key, session.history().to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionMetadata;

    fn session(session_id: &str, texts: &[&str]) -> Session {
        let key = SessionKey::new("agents", "tester", session_id);
        let mut session = Session::new(SessionMetadata::new(&key, HashMap::new()));
        for text in texts {
            session.push_event(Event::model_text("agents", *text));
        }
        session
    }

    #[tokio::test]
    async fn test_add_session_keeps_latest_snapshot() {
        let memory = InMemoryMemoryService::new();
        assert!(memory.is_empty().await);

        memory.add_session(&session("s1", &["one"])).await.unwrap();
        memory.add_session(&session("s1", &["one", "two"])).await.unwrap();

        let key = SessionKey::new("agents", "tester", "s1");
        let events = memory.remembered(&key).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(memory.len().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_kept_apart() {
        let memory = InMemoryMemoryService::new();
        memory.add_session(&session("s1", &["a"])).await.unwrap();
        memory.add_session(&session("s2", &["b"])).await.unwrap();

        assert_eq!(memory.len().await, 2);
        assert!(memory
            .remembered(&SessionKey::new("agents", "tester", "s3"))
            .await
            .is_none());
    }
}
