//! Message envelope and event types
//!
//! These types follow the Gemini `Content` / `Part` shape so that a user
//! message can be sent to the API without translation, and they are also the
//! unit of persistence for session history.

use std::pin::Pin;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};

/// Literal text some models emit in place of an empty reply.
pub const PLACEHOLDER_TEXT: &str = "None";

/// Author of a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A single part of a content envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// Message envelope: a role plus an ordered list of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Wrap raw user text into a single-part user envelope
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    /// Create a single-part model envelope
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// Text of the first part, if any
    pub fn first_text(&self) -> Option<&str> {
        self.parts.first().and_then(|p| p.text.as_deref())
    }

    /// All text parts joined together
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// One unit of a streamed response, also stored as session history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,

    /// Who produced this event ("user" or the application name)
    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,

    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(author: impl Into<String>, content: Option<Content>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author: author.into(),
            content,
            timestamp: Utc::now(),
        }
    }

    /// Event carrying a single text part authored by the model
    pub fn model_text(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(author, Some(Content::model_text(text)))
    }

    /// Event recording a user message
    pub fn user(content: Content) -> Self {
        Self::new(Role::User.as_str(), Some(content))
    }

    /// Text of the first content part, if the event has one
    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(|c| c.first_text())
    }

    /// Text worth showing to a user.
    ///
    /// Empty text and the `"None"` placeholder are dropped.
    pub fn display_text(&self) -> Option<&str> {
        self.text()
            .filter(|text| !text.is_empty() && *text != PLACEHOLDER_TEXT)
    }
}

/// Lazy, finite stream of events for one submitted message
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_text_envelope() {
        let content = Content::user_text("hello");
        assert_eq!(content.role, Role::User);
        assert_eq!(content.parts.len(), 1);
        assert_eq!(content.first_text(), Some("hello"));

        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_display_text_filters_placeholder_and_empty() {
        assert_eq!(Event::model_text("agents", "None").display_text(), None);
        assert_eq!(Event::model_text("agents", "").display_text(), None);
        assert_eq!(Event::new("agents", None).display_text(), None);
        assert_eq!(
            Event::model_text("agents", "Hi there").display_text(),
            Some("Hi there")
        );
    }

    #[test]
    fn test_display_text_uses_first_part_only() {
        let event = Event::new(
            "agents",
            Some(Content {
                role: Role::Model,
                parts: vec![Part::default(), Part::text("second")],
            }),
        );
        assert_eq!(event.display_text(), None);
    }

    #[test]
    fn test_joined_text() {
        let content = Content {
            role: Role::Model,
            parts: vec![Part::text("a"), Part::default(), Part::text("b")],
        };
        assert_eq!(content.joined_text(), "ab");
    }
}
