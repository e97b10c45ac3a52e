//! Gemini runtime
//!
//! A `Runtime` that sends the session history plus the new user message to
//! the Google Gemini `streamGenerateContent` endpoint and turns the SSE
//! chunks into `Event`s. Once the API accepts the request, the user message
//! and the aggregated model reply are appended to the session store so the
//! next turn sees them. A rejected request leaves the history untouched.
//!
//! # Authentication
//!
//! Uses a Gemini API key, read from `GOOGLE_API_KEY` by `AppConfig`.
//!
//! ```ignore
//! let runtime = GeminiRuntime::new("agents", api_key, sessions.clone())
//!     .with_model("gemini-2.5-flash-lite")
//!     .with_instruction("You are a helpful chatbot.");
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use super::runtime::Runtime;
use super::types::{Content, Event, EventStream, Part, Role};
use crate::core::config::{AppConfig, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use crate::core::FrameworkResult;
use crate::session::{SessionKey, SessionService};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// Gemini-specific request/response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
    /// Thought summaries are never shown to the user
    #[serde(default)]
    thought: Option<bool>,
}

// ============================================================================
// GeminiRuntime
// ============================================================================

/// Runtime backed by the Google Gemini streaming API
pub struct GeminiRuntime {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    api_base: String,
    app_name: String,
    instruction: Option<String>,
    sessions: Arc<dyn SessionService>,
}

impl GeminiRuntime {
    /// Create a runtime for `app_name` that reads and writes `sessions`
    pub fn new(
        app_name: impl Into<String>,
        api_key: impl Into<String>,
        sessions: Arc<dyn SessionService>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            api_base: DEFAULT_API_BASE.to_string(),
            app_name: app_name.into(),
            instruction: None,
            sessions,
        }
    }

    /// Create a runtime from the application config
    pub fn from_config(config: &AppConfig, sessions: Arc<dyn SessionService>) -> Self {
        tracing::info!("Using model: {}", config.model);
        tracing::info!("Max tokens: {}", config.max_tokens);

        Self::new(&config.app_name, &config.api_key, sessions)
            .with_model(&config.model)
            .with_max_tokens(config.max_tokens)
            .with_instruction(&config.instruction)
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the max tokens for responses
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the system instruction
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Override the API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the API URL for a given operation
    fn api_url(&self, operation: &str) -> String {
        format!("{}/models/{}:{}", self.api_base, self.model, operation)
    }

    /// Build a request from prior session events and the new message
    fn build_request(&self, history: &[Event], message: &Content) -> GeminiRequest {
        let mut contents: Vec<Content> = history
            .iter()
            .filter_map(|event| event.content.clone())
            .filter(|content| !content.joined_text().is_empty())
            .collect();
        contents.push(message.clone());

        GeminiRequest {
            contents,
            system_instruction: self.instruction.as_ref().map(|text| GeminiSystemInstruction {
                parts: vec![Part::text(text.clone())],
            }),
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: Some(self.max_tokens),
            }),
        }
    }
}

/// Turn one parsed SSE chunk into events authored by `author`
fn chunk_events(author: &str, chunk: GeminiResponse) -> Vec<Event> {
    let mut events = Vec::new();

    for candidate in chunk.candidates.unwrap_or_default() {
        if let Some(reason) = &candidate.finish_reason {
            tracing::debug!("[Gemini] Stream: finish_reason={}", reason);
        }

        let Some(content) = candidate.content else {
            continue;
        };

        let parts: Vec<Part> = content
            .parts
            .into_iter()
            .filter(|part| part.thought != Some(true))
            .filter_map(|part| part.text.map(Part::text))
            .collect();

        if !parts.is_empty() {
            events.push(Event::new(
                author,
                Some(Content {
                    role: Role::Model,
                    parts,
                }),
            ));
        }
    }

    events
}

/// Append the model's reply to the session, if it said anything
async fn record_reply(
    sessions: &dyn SessionService,
    key: &SessionKey,
    author: &str,
    reply: &str,
) -> FrameworkResult<()> {
    if reply.is_empty() {
        return Ok(());
    }
    sessions
        .append_event(key, &Event::model_text(author, reply))
        .await
}

#[async_trait::async_trait]
impl Runtime for GeminiRuntime {
    fn app_name(&self) -> &str {
        &self.app_name
    }

    async fn stream(
        &self,
        user_id: &str,
        session_id: &str,
        message: Content,
    ) -> Result<EventStream> {
        let key = SessionKey::new(&self.app_name, user_id, session_id);
        let session = self
            .sessions
            .get_session(&key)
            .await?
            .with_context(|| format!("Session not found: {}", key))?;

        let request = self.build_request(session.history(), &message);
        let request_json = serde_json::to_string(&request)
            .context("Failed to serialize Gemini streaming request")?;
        tracing::debug!("[Gemini] Streaming request JSON: {}", request_json);

        let url = format!("{}?alt=sse", self.api_url("streamGenerateContent"));
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .body(request_json)
            .send()
            .await
            .context("Failed to send streaming request to Gemini API")?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            tracing::error!("[Gemini] Streaming API error: {} - {}", status, error_text);
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        tracing::info!("[Gemini] Streaming response started for {}", key);
        self.sessions.append_event(&key, &Event::user(message)).await?;

        let byte_stream = response.bytes_stream();
        let stream_reader = StreamReader::new(
            byte_stream.map(|result| result.map_err(|e| std::io::Error::other(e.to_string()))),
        );
        let buf_reader = tokio::io::BufReader::new(stream_reader);
        let author = self.app_name.clone();
        let sessions = self.sessions.clone();

        let stream = async_stream::try_stream! {
            let mut lines = buf_reader.lines();
            let mut reply = String::new();
            let mut chunk_index: usize = 0;

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(
                            "[Gemini] Stream: interrupted after {} chunks: {}",
                            chunk_index,
                            e
                        );
                        // Keep what the user already saw
                        record_reply(sessions.as_ref(), &key, &author, &reply).await?;
                        Err::<(), _>(e)?;
                        break;
                    }
                };

                if !line.starts_with("data: ") {
                    continue;
                }

                let data = &line[6..];
                if data.trim().is_empty() {
                    continue;
                }

                let chunk: GeminiResponse = match serde_json::from_str(data) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("[Gemini] Failed to parse streaming chunk: {}", e);
                        continue;
                    }
                };
                chunk_index += 1;

                for event in chunk_events(&author, chunk) {
                    if let Some(content) = &event.content {
                        reply.push_str(&content.joined_text());
                    }
                    yield event;
                }
            }

            tracing::info!("[Gemini] Stream: ended after {} chunks", chunk_index);
            record_reply(sessions.as_ref(), &key, &author, &reply).await?;
        };

        Ok(Box::pin(stream))
    }
}
