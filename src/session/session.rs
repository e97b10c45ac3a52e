//! Session snapshot
//!
//! A `Session` combines metadata and event history. It is a value handed out
//! by a `SessionService`; the service owns the durable copy.

use serde_json::Value;

use crate::llm::Event;

use super::metadata::{SessionKey, SessionMetadata};

/// A conversation session: identity, state and event history
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Session metadata (identity, state, timestamps)
    pub metadata: SessionMetadata,

    /// Conversation history, oldest first
    pub events: Vec<Event>,
}

impl Session {
    pub fn new(metadata: SessionMetadata) -> Self {
        Self {
            metadata,
            events: Vec::new(),
        }
    }

    /// Get the session ID
    pub fn id(&self) -> &str {
        &self.metadata.session_id
    }

    pub fn app_name(&self) -> &str {
        &self.metadata.app_name
    }

    pub fn user_id(&self) -> &str {
        &self.metadata.user_id
    }

    pub fn key(&self) -> SessionKey {
        self.metadata.key()
    }

    /// Get the conversation history
    pub fn history(&self) -> &[Event] {
        &self.events
    }

    /// Read a state value
    pub fn state(&self, key: &str) -> Option<&Value> {
        self.metadata.state.get(key)
    }

    /// Append an event to the in-memory history
    pub fn push_event(&mut self, event: Event) {
        self.events.push(event);
        self.metadata.touch();
    }
}
