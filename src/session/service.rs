//! Session service trait and the in-memory implementation

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::{FrameworkError, FrameworkResult};
use crate::llm::Event;

use super::metadata::{SessionKey, SessionMetadata};
use super::session::Session;

/// Durable store of sessions keyed by (app, user, session id)
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Fetch a session. Absence is `Ok(None)`, not an error.
    async fn get_session(&self, key: &SessionKey) -> FrameworkResult<Option<Session>>;

    /// Create a session with the given initial state.
    ///
    /// Fails with `SessionExists` if the key is already taken.
    async fn create_session(
        &self,
        key: &SessionKey,
        state: HashMap<String, Value>,
    ) -> FrameworkResult<Session>;

    /// Append an event to an existing session's history
    async fn append_event(&self, key: &SessionKey, event: &Event) -> FrameworkResult<()>;

    /// List session IDs for one app and user
    async fn list_sessions(&self, app_name: &str, user_id: &str) -> FrameworkResult<Vec<String>>;
}

/// Session service that keeps everything in process memory
#[derive(Debug, Default)]
pub struct InMemorySessionService {
    sessions: RwLock<HashMap<SessionKey, Session>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn get_session(&self, key: &SessionKey) -> FrameworkResult<Option<Session>> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn create_session(
        &self,
        key: &SessionKey,
        state: HashMap<String, Value>,
    ) -> FrameworkResult<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(key) {
            return Err(FrameworkError::SessionExists(key.to_string()));
        }

        let session = Session::new(SessionMetadata::new(key, state));
        sessions.insert(key.clone(), session.clone());
        tracing::info!("Created session {}", key);
        Ok(session)
    }

    async fn append_event(&self, key: &SessionKey, event: &Event) -> FrameworkResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(key)
            .ok_or_else(|| FrameworkError::SessionNotFound(key.to_string()))?;
        session.push_event(event.clone());
        Ok(())
    }

    async fn list_sessions(&self, app_name: &str, user_id: &str) -> FrameworkResult<Vec<String>> {
        let sessions = self.sessions.read().await;
        let mut ids: Vec<String> = sessions
            .keys()
            .filter(|k| k.app_name == app_name && k.user_id == user_id)
            .map(|k| k.session_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(session_id: &str) -> SessionKey {
        SessionKey::new("agents", "tester", session_id)
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let service = InMemorySessionService::new();
        assert!(service.get_session(&key("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let service = InMemorySessionService::new();
        let mut state = HashMap::new();
        state.insert("name".to_string(), Value::from("toaster"));

        let created = service.create_session(&key("s1"), state).await.unwrap();
        let fetched = service.get_session(&key("s1")).await.unwrap().unwrap();

        assert_eq!(created, fetched);
        assert_eq!(fetched.state("name"), Some(&Value::from("toaster")));
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let service = InMemorySessionService::new();
        service.create_session(&key("s1"), HashMap::new()).await.unwrap();

        let err = service
            .create_session(&key("s1"), HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::SessionExists(_)));
    }

    #[tokio::test]
    async fn test_append_event() {
        let service = InMemorySessionService::new();
        service.create_session(&key("s1"), HashMap::new()).await.unwrap();

        service
            .append_event(&key("s1"), &Event::model_text("agents", "Hello"))
            .await
            .unwrap();

        let session = service.get_session(&key("s1")).await.unwrap().unwrap();
        assert_eq!(session.history().len(), 1);

        let err = service
            .append_event(&key("missing"), &Event::model_text("agents", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_sessions_is_scoped() {
        let service = InMemorySessionService::new();
        service.create_session(&key("b"), HashMap::new()).await.unwrap();
        service.create_session(&key("a"), HashMap::new()).await.unwrap();
        service
            .create_session(&SessionKey::new("agents", "other", "c"), HashMap::new())
            .await
            .unwrap();

        let ids = service.list_sessions("agents", "tester").await.unwrap();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
