pub mod gemini;
pub mod runtime;
pub mod types;

pub use gemini::GeminiRuntime;
pub use runtime::Runtime;
pub use types::{Content, Event, EventStream, Part, Role, PLACEHOLDER_TEXT};
