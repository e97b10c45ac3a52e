//! Runtime trait
//!
//! Abstracts the agent runtime so the dispatcher can submit a message and
//! consume its response events without knowing which model backs it.

use anyhow::Result;

use super::types::{Content, EventStream};

/// A runtime that turns one user message into a stream of response events.
#[async_trait::async_trait]
pub trait Runtime: Send + Sync {
    /// Application name; part of every session key.
    fn app_name(&self) -> &str;

    /// Submit `message` to the session identified by (`user_id`, `session_id`).
    ///
    /// The returned stream is consumed exactly once, to completion.
    async fn stream(&self, user_id: &str, session_id: &str, message: Content)
        -> Result<EventStream>;
}
