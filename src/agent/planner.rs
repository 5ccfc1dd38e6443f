use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::tools::ToolDescription;
use crate::error::Result;
use crate::language::Language;
use crate::llm::{ChatMessage, ChatModel, ChatOptions};

/// What the model proposes for a turn. Translation proposals still pass the
/// session guard before anything runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedAction {
    Reply { text: String },
    /// Language names exactly as the user wrote them, if they did.
    Translate { source: Option<String>, target: Option<String> },
    UseTool { tool: String, input: Value },
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, history: &[ChatMessage], tools: &[ToolDescription]) -> Result<PlannedAction>;
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Decision {
    Reply {
        text: String,
    },
    Translate {
        #[serde(default)]
        source_language: Option<String>,
        #[serde(default)]
        target_language: Option<String>,
    },
    Tool {
        name: String,
        #[serde(default)]
        input: Value,
    },
}

impl From<Decision> for PlannedAction {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Reply { text } => PlannedAction::Reply { text },
            Decision::Translate { source_language, target_language } => PlannedAction::Translate {
                source: source_language,
                target: target_language,
            },
            Decision::Tool { name, input } => PlannedAction::UseTool { tool: name, input },
        }
    }
}

/// Asks a chat model for a JSON decision.
pub struct LlmPlanner {
    model: Arc<dyn ChatModel>,
    temperature: f32,
}

impl LlmPlanner {
    pub fn new(model: Arc<dyn ChatModel>, temperature: f32) -> Self {
        Self { model, temperature }
    }

    fn system_prompt(tools: &[ToolDescription]) -> String {
        let languages = Language::ALL
            .iter()
            .map(|language| format!("{} ({})", language.english_name(), language.code()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut prompt = format!(
            "You are an assistant in a business chat. Always answer in the language of the user's latest message.\n\
             \n\
             You can translate PowerPoint files between {}.\n\
             When the user asks to translate a presentation, do not guess languages: copy the source and target\n\
             language names exactly as the user wrote them, and use null for any language the user did not state.\n\
             \n\
             Respond with a single JSON object, one of:\n\
             {{\"action\":\"reply\",\"text\":\"...\"}}\n\
             {{\"action\":\"translate\",\"source_language\":\"...\"|null,\"target_language\":\"...\"|null}}\n\
             {{\"action\":\"tool\",\"name\":\"...\",\"input\":{{...}}}}\n",
            languages
        );
        if !tools.is_empty() {
            prompt.push_str("\nAvailable tools:\n");
            for tool in tools {
                prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            }
        }
        prompt
    }
}

/// Parse the model's decision; anything unreadable is treated as a plain reply.
pub fn parse_decision(raw: &str) -> PlannedAction {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    match serde_json::from_str::<Decision>(body) {
        Ok(decision) => decision.into(),
        Err(e) => {
            debug!("Planner output is not a decision ({}), replying with it", e);
            PlannedAction::Reply { text: trimmed.to_string() }
        }
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, history: &[ChatMessage], tools: &[ToolDescription]) -> Result<PlannedAction> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(Self::system_prompt(tools)));
        messages.extend_from_slice(history);

        let options = ChatOptions { json: true, temperature: self.temperature };
        let raw = self.model.chat(&messages, &options).await?;
        Ok(parse_decision(&raw))
    }
}
