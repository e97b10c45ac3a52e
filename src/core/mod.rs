//! Core types
//!
//! - `AppConfig` - Process configuration loaded from the environment
//! - `FrameworkError` - Error types for storage and configuration

pub mod config;
pub mod error;

pub use config::{AppConfig, LogFormat, LogSettings};
pub use error::{FrameworkError, FrameworkResult};
