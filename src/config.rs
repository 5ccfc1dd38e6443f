use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, DeckError};

pub const POWERPOINT_CONTENT_TYPES: &[&str] = &[
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion service used to translate runs
    pub translate: LlmConfig,
    /// Completion service used to plan agent turns
    pub agent: LlmConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
    pub upload: UploadConfig,
    pub output: OutputConfig,
    pub converter: ConverterConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible `/chat/completions`
    OpenAi,
    /// Ollama `/api/chat`
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    /// Base URL, e.g. `https://api.openai.com/v1` or `http://localhost:11434`
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key (unused for Ollama)
    pub api_key_env: String,
    pub temperature: f32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient failures (connection errors, 429, 5xx)
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Conversation turns kept as planner context
    pub history_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_size_bytes: u64,
    /// Seconds per wait before the prompt is repeated
    pub timeout_secs: u64,
    /// Timed-out waits before the upload is abandoned; unlimited when absent
    pub max_attempts: Option<u32>,
    pub accepted_content_types: Vec<String>,
    /// Where uploads are materialized; the system temp dir when absent
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub filename_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Office suite used to convert legacy .ppt files (e.g. soffice)
    pub binary_path: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { history_limit: 20 }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(".deckbridge/cache/translations"),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 10 * 1024 * 1024,
            timeout_secs: 20,
            max_attempts: Some(15),
            accepted_content_types: POWERPOINT_CONTENT_TYPES.iter().map(|s| s.to_string()).collect(),
            temp_dir: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            filename_prefix: "translated_".to_string(),
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            binary_path: "soffice".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DeckError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| DeckError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DeckError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DeckError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.upload.timeout_secs == 0 {
            return Err(DeckError::Config("upload.timeout_secs must be greater than zero".to_string()));
        }
        if self.upload.max_size_bytes == 0 {
            return Err(DeckError::Config("upload.max_size_bytes must be greater than zero".to_string()));
        }
        for (section, llm) in [("translate", &self.translate), ("agent", &self.agent)] {
            if llm.model.trim().is_empty() {
                return Err(DeckError::Config(format!("{}.model must not be empty", section)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.upload.max_size_bytes, 10_485_760);
        assert_eq!(config.upload.timeout_secs, 20);
        assert_eq!(config.upload.accepted_content_types.len(), 2);
        assert_eq!(config.output.filename_prefix, "translated_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            "[translate]\nprovider = \"ollama\"\nendpoint = \"http://localhost:11434\"\nmodel = \"llama3.2:3b\"\n\n[upload]\ntimeout_secs = 5\n",
        )
        .unwrap();
        assert_eq!(config.translate.provider, LlmProvider::Ollama);
        assert_eq!(config.translate.max_retries, 3);
        assert_eq!(config.upload.timeout_secs, 5);
        assert_eq!(config.upload.max_size_bytes, 10_485_760);
        assert_eq!(config.agent.provider, LlmProvider::OpenAi);
    }

    #[test]
    fn test_save_and_reload() {
        let temp = assert_fs::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.output.directory = PathBuf::from("translated-decks");
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.output.directory, PathBuf::from("translated-decks"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.upload.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(DeckError::Config(_))));
    }
}
