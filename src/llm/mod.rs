// Modular completion-service architecture
//
// Translation and agent planning both talk to a chat model through one trait:
// - OpenAi: OpenAI-compatible /chat/completions endpoints
// - Ollama: local models through /api/chat

pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use crate::config::{LlmConfig, LlmProvider};
use crate::error::{DeckError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    /// Ask the backend for a JSON object response
    pub json: bool,
    pub temperature: f32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self { json: false, temperature: 0.0 }
    }
}

/// A chat-style completion service.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and return the assistant's reply text.
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Factory for creating chat model instances
pub struct LlmFactory;

impl LlmFactory {
    pub fn create(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
        match config.provider {
            LlmProvider::OpenAi => Ok(Arc::new(openai::OpenAiChat::new(config.clone())?)),
            LlmProvider::Ollama => Ok(Arc::new(ollama::OllamaChat::new(config.clone())?)),
        }
    }
}

/// Check that the configured endpoint answers and knows the model
pub async fn check_availability(config: &LlmConfig) -> Result<()> {
    match config.provider {
        LlmProvider::OpenAi => openai::check_openai_availability(config).await,
        LlmProvider::Ollama => ollama::check_ollama_availability(&config.endpoint, &config.model).await,
    }
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DeckError::Llm(format!("Failed to create HTTP client: {}", e)))
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500u64.saturating_mul(1u64 << attempt.min(6)))
}

/// Send a request, retrying connection failures, timeouts, 429 and 5xx with
/// exponential backoff. Any other non-success status is returned as an error.
pub(crate) async fn send_with_retry<F>(max_retries: u32, mut build: F) -> Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) if is_retryable_status(response.status()) && attempt < max_retries => {
                warn!("Completion service returned {}, retrying (attempt {}/{})", response.status(), attempt + 1, max_retries);
            }
            Ok(response) => {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(DeckError::Llm(format!("API error {}: {}", status, error_text)));
            }
            Err(e) if (e.is_connect() || e.is_timeout()) && attempt < max_retries => {
                warn!("Completion request failed: {}, retrying (attempt {}/{})", e, attempt + 1, max_retries);
            }
            Err(e) => return Err(DeckError::Llm(format!("HTTP request failed: {}", e))),
        }
        let delay = backoff(attempt);
        debug!("Waiting {:?} before retry", delay);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_value(ChatMessage::system("be brief")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "be brief"}));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_backoff_grows() {
        assert_eq!(backoff(0), Duration::from_millis(500));
        assert_eq!(backoff(1), Duration::from_millis(1000));
        assert_eq!(backoff(3), Duration::from_millis(4000));
        assert_eq!(backoff(40), backoff(6));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_after_retries() {
        let client = build_client(1).unwrap();
        let result = send_with_retry(1, || client.get("http://127.0.0.1:9/unreachable")).await;
        assert!(matches!(result, Err(DeckError::Llm(_))));
    }
}
