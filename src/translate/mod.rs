// Text translation layer
//
// - TranslationClient: one chat request per text fragment
// - CachedTranslator: persistent cache decorator keyed by text, languages and model

pub mod cache;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

pub use cache::{clear_translation_cache, format_duration, list_translation_cache, CachedTranslator, TranslationCacheEntry};
use crate::config::Config;
use crate::error::{DeckError, Result};
use crate::language::Language;
use crate::llm::{ChatMessage, ChatModel, ChatOptions, LlmFactory};

/// Translates a single fragment of text.
#[async_trait]
pub trait TextTranslator: Send + Sync {
    /// Whitespace-only input comes back unchanged without contacting the service.
    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String>;
}

/// Build the fixed instruction set for a language pair
pub fn build_system_prompt(source: Language, target: Language) -> String {
    format!(
        "You are a professional translator. Translate the following text from {} to {}.\n\
         Rules:\n\
         1. Keep all formatting symbols (like bullet points, numbers) unchanged\n\
         2. Keep all special characters unchanged\n\
         3. Keep all whitespace and line breaks\n\
         4. Only translate the actual text content\n\
         5. Maintain the same tone and style\n\
         6. Do not add any explanations or notes\n\
         7. Keep all numbers and dates unchanged\n\
         8. Keep all proper nouns unchanged unless they have standard translations",
        source.english_name(),
        target.english_name()
    )
}

pub struct TranslationClient {
    model: Arc<dyn ChatModel>,
    temperature: f32,
}

impl TranslationClient {
    pub fn new(model: Arc<dyn ChatModel>, temperature: f32) -> Self {
        Self { model, temperature }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }
}

#[async_trait]
impl TextTranslator for TranslationClient {
    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let messages = [ChatMessage::system(build_system_prompt(source, target)), ChatMessage::user(text)];
        let options = ChatOptions { json: false, temperature: self.temperature };

        let response = self
            .model
            .chat(&messages, &options)
            .await
            .map_err(|e| DeckError::Translation(e.to_string()))?;

        let translated = response.trim();
        if translated.is_empty() {
            return Err(DeckError::Translation("Empty translation received".to_string()));
        }
        debug!("Translated ({} -> {}): {:?} -> {:?}", source, target, text, translated);
        Ok(translated.to_string())
    }
}

/// Factory for creating the configured translator stack
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create(config: &Config) -> Result<Arc<dyn TextTranslator>> {
        let model = LlmFactory::create(&config.translate)?;
        Ok(Self::with_model(model, config))
    }

    /// Wrap an existing model, adding the cache when enabled
    pub fn with_model(model: Arc<dyn ChatModel>, config: &Config) -> Arc<dyn TextTranslator> {
        let model_name = model.model_name().to_string();
        let client = TranslationClient::new(model, config.translate.temperature);
        if config.cache.enabled {
            Arc::new(CachedTranslator::new(Arc::new(client), config.cache.directory.clone(), model_name))
        } else {
            Arc::new(client)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::SuffixModel;
    use super::*;

    struct EmptyModel;

    #[async_trait]
    impl ChatModel for EmptyModel {
        async fn chat(&self, _messages: &[ChatMessage], _options: &ChatOptions) -> Result<String> {
            Ok("   \n".to_string())
        }

        fn model_name(&self) -> &str {
            "empty"
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn chat(&self, _messages: &[ChatMessage], _options: &ChatOptions) -> Result<String> {
            Err(DeckError::Llm("API error 503".to_string()))
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_blank_text_skips_service() {
        let model = Arc::new(SuffixModel::new("(ja)"));
        let client = TranslationClient::new(model.clone(), 0.0);

        for blank in ["", "   ", "\n\t"] {
            let result = client.translate(blank, Language::English, Language::Japanese).await.unwrap();
            assert_eq!(result, blank);
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_translation_uses_rules_for_pair() {
        let model = Arc::new(SuffixModel::new("(ja)"));
        let client = TranslationClient::new(model.clone(), 0.0);

        let result = client.translate("Hello", Language::English, Language::Japanese).await.unwrap();
        assert_eq!(result, "Hello(ja)");
        assert_eq!(model.calls(), 1);

        let system = model.last_system.lock().unwrap().clone().unwrap();
        assert!(system.contains("from English to Japanese"));
        assert!(system.contains("8. Keep all proper nouns unchanged"));
    }

    #[tokio::test]
    async fn test_response_is_trimmed() {
        let model = Arc::new(SuffixModel::new("  \n"));
        let client = TranslationClient::new(model, 0.0);
        let result = client.translate("  Hello", Language::English, Language::Japanese).await.unwrap();
        assert_eq!(result, "Hello");
    }

    #[tokio::test]
    async fn test_empty_response_is_error() {
        let client = TranslationClient::new(Arc::new(EmptyModel), 0.0);
        let result = client.translate("Hello", Language::English, Language::Japanese).await;
        assert!(matches!(result, Err(DeckError::Translation(_))));
    }

    #[tokio::test]
    async fn test_service_failure_is_translation_error() {
        let client = TranslationClient::new(Arc::new(FailingModel), 0.0);
        let result = client.translate("Hello", Language::English, Language::Japanese).await;
        match result {
            Err(DeckError::Translation(message)) => assert!(message.contains("503")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
