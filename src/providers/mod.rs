//! Completion providers.
//!
//! A provider turns a system prompt plus one user message into reply text.
//! Failures of any kind (network, auth, rate limit, malformed body) are
//! reported as [`ChatError::Upstream`](crate::error::ChatError::Upstream) with
//! the provider's detail message; callers do not retry.

pub mod openai;

use async_trait::async_trait;

use crate::error::Result;

pub use openai::OpenAiProvider;

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system_prompt: &str, user_message: &str, max_tokens: u32) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            user_message: user_message.to_string(),
            max_tokens,
        }
    }
}

/// An external text-generation service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a reply, or fail with `ChatError::Upstream(detail)`.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Extract a human-readable message from a provider error body.
///
/// Understands the OpenAI shape `{"error": {"message": "..."}}` as well as a
/// bare `{"error": "..."}`; anything else is returned verbatim (or the HTTP
/// status when the body is empty).
pub fn parse_provider_error(status: u16, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match &v["error"] {
            serde_json::Value::String(s) => Some(s.clone()),
            other => other["message"].as_str().map(String::from),
        });
    match parsed {
        Some(message) => message,
        None if body.trim().is_empty() => format!("HTTP {}", status),
        None => body.trim().to_string(),
    }
}
