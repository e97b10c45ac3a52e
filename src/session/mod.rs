//! Session management
//!
//! A session is identified by (application name, user id, session id) and
//! holds the conversation history plus a key/value state map. Storage is
//! behind the `SessionService` trait; an in-memory and a file-backed
//! implementation are provided.

pub mod metadata;
pub mod service;
pub mod session;
pub mod storage;

pub use metadata::{SessionKey, SessionMetadata};
pub use service::{InMemorySessionService, SessionService};
pub use session::Session;
pub use storage::FileSessionService;
