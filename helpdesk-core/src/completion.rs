//! Completion client for OpenAI-compatible Chat Completions endpoints
//! (Groq by default).
//!
//! Provides a `CompletionBackend` trait so the turn orchestrator can be
//! driven by the HTTP client in production and by scripted fakes in tests.
//! One request per call, no retry: a failed call is classified and returned.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CompletionConfig;
use crate::error::HelpdeskError;
use crate::models::{DocumentSet, Message, Role};
use crate::prompt::build_system_prompt;

pub const API_KEY_ENV: &str = "GROQ_API_KEY";

// ============================================================================
// CompletionBackend trait
// ============================================================================

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Ask the model to answer `user_message` given `history` and the docs.
    async fn complete(
        &self,
        user_message: &str,
        history: &[Message],
        docs: &DocumentSet,
    ) -> Result<Completion, CompletionError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub reply: String,
    pub tokens_used: u32,
}

// ============================================================================
// Error types
// ============================================================================

/// Provider failures. `Display` is the user-safe text; provider detail is
/// logged where the error is classified and never carried further.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Invalid API key. Please check your GROQ_API_KEY.")]
    Auth,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimit,

    #[error("Failed to generate response from AI service.")]
    Provider,
}

impl CompletionError {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => CompletionError::Auth,
            429 => CompletionError::RateLimit,
            _ => CompletionError::Provider,
        }
    }
}

// ============================================================================
// Wire structs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: Option<u32>,
}

/// `[system, ...history, user]`, with history roles preserved and the user
/// input trimmed.
pub fn build_messages(
    user_message: &str,
    history: &[Message],
    docs: &DocumentSet,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage {
        role: "system",
        content: build_system_prompt(docs.as_slice()),
    });
    messages.extend(history.iter().map(|msg| ChatMessage {
        role: msg.role.as_str(),
        content: msg.content.clone(),
    }));
    messages.push(ChatMessage {
        role: Role::User.as_str(),
        content: user_message.trim().to_string(),
    });
    messages
}

// ============================================================================
// ChatCompletionClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    base_url: String,
}

impl ChatCompletionClient {
    /// Build from config, taking the key from `GROQ_API_KEY`.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, HelpdeskError> {
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        Self::new(api_key, config)
    }

    pub fn new(api_key: impl Into<String>, config: &CompletionConfig) -> Result<Self, HelpdeskError> {
        Self::with_base_url(api_key, config, config.base_url.clone())
    }

    /// Create a client against a custom base URL (tests, other providers).
    pub fn with_base_url(
        api_key: impl Into<String>,
        config: &CompletionConfig,
        base_url: String,
    ) -> Result<Self, HelpdeskError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(HelpdeskError::MissingApiKey(API_KEY_ENV));
        }

        // No request timeout: a hung provider hangs the turn.
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            api_key,
            model: config.resolved_model(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, messages: &[ChatMessage]) -> Result<Completion, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Completion request failed");
                CompletionError::Provider
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = CompletionError::from_status(status);
            tracing::error!(status = status.as_u16(), body = %body, class = ?err, "Completion API error");
            return Err(err);
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Invalid completion response");
            CompletionError::Provider
        })?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                tracing::error!("Completion response carried no message content");
                CompletionError::Provider
            })?;

        let tokens_used = parsed.usage.and_then(|u| u.total_tokens).unwrap_or(0);

        Ok(Completion { reply, tokens_used })
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    async fn complete(
        &self,
        user_message: &str,
        history: &[Message],
        docs: &DocumentSet,
    ) -> Result<Completion, CompletionError> {
        let messages = build_messages(user_message, history, docs);
        self.send(&messages).await
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}

// ============================================================================
// TESTS
// ============================================================================
