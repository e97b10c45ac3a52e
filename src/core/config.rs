//! Application configuration
//!
//! Everything is read from environment variables (a `.env` file is loaded by
//! the binary first). Only the API credential is required.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use serde_json::Value;

use super::error::{FrameworkError, FrameworkResult};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_APP_NAME: &str = "agents";
pub const DEFAULT_USER_ID: &str = "tester";
pub const DEFAULT_SESSION_ID: &str = "default";
pub const DEFAULT_INSTRUCTION: &str = "You are a helpful chatbot.";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Output format for the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging settings
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub format: LogFormat,
    pub dir: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

/// Process-level configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Gemini API key (`GOOGLE_API_KEY`)
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub app_name: String,
    pub user_id: String,
    /// Fixed session used by the interactive loop
    pub session_id: String,
    pub instruction: String,
    /// When set, sessions persist under this directory; otherwise in memory
    pub sessions_dir: Option<PathBuf>,
    pub enable_memory: bool,
    /// State seeded into newly created sessions
    pub initial_state: HashMap<String, Value>,
    pub log: LogSettings,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> FrameworkResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> FrameworkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = var("GOOGLE_API_KEY")
            .ok_or_else(|| FrameworkError::invalid_config("GOOGLE_API_KEY is not set"))?;

        let max_tokens = match var("GEMINI_MAX_TOKENS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                FrameworkError::invalid_config(format!("GEMINI_MAX_TOKENS is not a number: {}", raw))
            })?,
            None => DEFAULT_MAX_TOKENS,
        };

        let enable_memory = match var("AGENT_ENABLE_MEMORY") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                FrameworkError::invalid_config(format!("AGENT_ENABLE_MEMORY is not a boolean: {}", raw))
            })?,
            None => true,
        };

        let initial_state = match var("AGENT_INITIAL_STATE") {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                FrameworkError::invalid_config(format!("AGENT_INITIAL_STATE must be a JSON object: {}", e))
            })?,
            None => HashMap::new(),
        };

        let format = match var("AGENT_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") | None => LogFormat::Pretty,
            Some(other) => {
                return Err(FrameworkError::invalid_config(format!(
                    "AGENT_LOG_FORMAT must be 'json' or 'pretty', got '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            api_key,
            model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens,
            app_name: var("AGENT_APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            user_id: var("AGENT_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            session_id: var("AGENT_SESSION_ID").unwrap_or_else(|| DEFAULT_SESSION_ID.to_string()),
            instruction: var("AGENT_INSTRUCTION").unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
            sessions_dir: var("AGENT_SESSIONS_DIR").map(PathBuf::from),
            enable_memory,
            initial_state,
            log: LogSettings {
                format,
                dir: var("AGENT_LOG_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            },
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
