use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{build_client, send_with_retry, ChatMessage, ChatModel, ChatOptions};
use crate::config::LlmConfig;
use crate::error::{DeckError, Result};

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions backend
pub struct OpenAiChat {
    client: Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl OpenAiChat {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = build_client(config.timeout_secs)?;
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.trim().is_empty());
        Ok(Self { client, config, api_key })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }
}

fn extract_content(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| DeckError::Llm("Response contained no message content".to_string()))
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: options.temperature,
            response_format: options.json.then_some(ResponseFormat { kind: "json_object" }),
        };
        let url = self.url();
        debug!("Sending chat completion request to: {}", url);

        let response = send_with_retry(self.config.max_retries, || {
            let builder = self.client.post(&url).json(&request);
            match &self.api_key {
                Some(key) => builder.bearer_auth(key),
                None => builder,
            }
        })
        .await?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| DeckError::Llm(format!("Failed to parse response: {}", e)))?;
        extract_content(body)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Check that the endpoint accepts our credentials and lists the model
pub async fn check_openai_availability(config: &LlmConfig) -> Result<()> {
    let chat = OpenAiChat::new(config.clone())?;
    let url = format!("{}/models/{}", config.endpoint.trim_end_matches('/'), config.model);

    let mut builder = chat.client.get(&url);
    if let Some(key) = &chat.api_key {
        builder = builder.bearer_auth(key);
    }
    let response = builder
        .send()
        .await
        .map_err(|e| DeckError::Llm(format!("Failed to connect to {}: {}", config.endpoint, e)))?;

    if response.status().is_success() {
        info!("Model '{}' is available at {}", config.model, config.endpoint);
        Ok(())
    } else {
        Err(DeckError::Llm(format!(
            "Model '{}' not available at {} ({}). Check {} and the model name",
            config.model,
            config.endpoint,
            response.status(),
            config.api_key_env
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::system("rules"), ChatMessage::user("Hello")];
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: 0.0,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["response_format"]["type"], "json_object");

        let plain = ChatCompletionRequest { response_format: None, ..request };
        assert!(serde_json::to_value(&plain).unwrap().get("response_format").is_none());
    }

    #[test]
    fn test_extract_content() {
        let body: ChatCompletionResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"こんにちは"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_content(body).unwrap(), "こんにちは");

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_content(empty), Err(DeckError::Llm(_))));
    }

    #[test]
    fn test_url_joins_endpoint() {
        let config = LlmConfig {
            endpoint: "http://localhost:8080/v1/".to_string(),
            ..LlmConfig::default()
        };
        let chat = OpenAiChat::new(config).unwrap();
        assert_eq!(chat.url(), "http://localhost:8080/v1/chat/completions");
    }
}
