use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{build_client, send_with_retry, ChatMessage, ChatModel, ChatOptions};
use crate::config::LlmConfig;
use crate::error::{DeckError, Result};

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
    #[serde(default)]
    done: bool,
}

/// Ollama `/api/chat` backend
pub struct OllamaChat {
    client: Client,
    config: LlmConfig,
}

impl OllamaChat {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<String> {
        let request = OllamaChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            format: options.json.then_some("json"),
            options: OllamaOptions { temperature: options.temperature },
        };
        let url = format!("{}/api/chat", self.config.endpoint.trim_end_matches('/'));
        debug!("Sending chat request to: {}", url);

        let response = send_with_retry(self.config.max_retries, || self.client.post(&url).json(&request)).await?;

        let body: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| DeckError::Llm(format!("Failed to parse response: {}", e)))?;
        if !body.done {
            debug!("Ollama response not marked done");
        }
        Ok(body.message.content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Check if Ollama is available and the model is loaded
pub async fn check_ollama_availability(endpoint: &str, model: &str) -> Result<()> {
    let client = Client::new();
    let url = format!("{}/api/show", endpoint.trim_end_matches('/'));

    let response = client
        .post(&url)
        .json(&json!({ "name": model }))
        .send()
        .await
        .map_err(|e| DeckError::Llm(format!("Failed to connect to Ollama: {}", e)))?;

    if response.status().is_success() {
        info!("Ollama model '{}' is available", model);
        Ok(())
    } else {
        Err(DeckError::Llm(format!(
            "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
            model, model
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::user("Hello")];
        let request = OllamaChatRequest {
            model: "llama3.2:3b",
            messages: &messages,
            stream: false,
            format: Some("json"),
            options: OllamaOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["format"], "json");
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[test]
    fn test_response_parsing() {
        let body: OllamaChatResponse = serde_json::from_str(
            r#"{"model":"llama3.2:3b","message":{"role":"assistant","content":"Hola"},"done":true}"#,
        )
        .unwrap();
        assert_eq!(body.message.content, "Hola");
        assert!(body.done);
    }
}
