pub mod core;
pub mod dispatcher;
pub mod llm;
pub mod memory;
pub mod session;

// Optional components
pub mod cli;
pub mod logging;

pub use dispatcher::{DispatchError, DispatchSummary, Queries, ResponseSink, SessionDispatcher};
