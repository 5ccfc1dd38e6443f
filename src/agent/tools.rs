use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{DeckError, Result};
use crate::language::Language;
use crate::upload::UploadCoordinator;
use crate::workflow::DocumentWorkflow;

/// A non-translation capability the agent can call by name (database
/// queries, stock lookups, quotations).
#[async_trait]
pub trait ExternalTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn call(&self, input: Value) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ExternalTool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: ExternalTool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExternalTool>> {
        self.tools.get(name).cloned()
    }

    /// Run the named tool; `None` if no such tool is registered.
    pub async fn call(&self, name: &str, input: Value) -> Result<Option<String>> {
        let Some(tool) = self.get(name) else {
            return Ok(None);
        };
        tool.call(input)
            .await
            .map(Some)
            .map_err(|e| DeckError::Tool(format!("{} failed: {}", name, e)))
    }

    pub fn descriptions(&self) -> Vec<ToolDescription> {
        self.tools
            .values()
            .map(|tool| ToolDescription {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// The translation action: obtain a file, then translate it.
#[async_trait]
pub trait DocumentTranslationTool: Send + Sync {
    /// `None` when no usable file arrived.
    async fn run(&self, source: Language, target: Language) -> Result<Option<PathBuf>>;
}

pub struct UploadAndTranslate {
    uploads: UploadCoordinator,
    workflow: DocumentWorkflow,
}

impl UploadAndTranslate {
    pub fn new(uploads: UploadCoordinator, workflow: DocumentWorkflow) -> Self {
        Self { uploads, workflow }
    }
}

#[async_trait]
impl DocumentTranslationTool for UploadAndTranslate {
    async fn run(&self, source: Language, target: Language) -> Result<Option<PathBuf>> {
        let Some(input) = self.uploads.await_upload().await? else {
            info!("No presentation received, translation abandoned");
            return Ok(None);
        };
        let _upload_dir = self.uploads.discard_on_drop(&input);
        self.workflow.translate_document(&input, source, target).await.map(Some)
    }
}
