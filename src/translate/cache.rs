use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::TextTranslator;
use crate::error::{DeckError, Result};
use crate::language::Language;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationCacheEntry {
    pub source_text: String,
    pub source_language: Language,
    pub target_language: Language,
    pub translation: String,
    pub model: String,
    pub cached_at: u64,
}

/// Persistent cache in front of another translator
pub struct CachedTranslator {
    inner: Arc<dyn TextTranslator>,
    cache_dir: PathBuf,
    model: String,
    memory: Mutex<HashMap<String, String>>,
}

impl CachedTranslator {
    pub fn new<S: Into<String>>(inner: Arc<dyn TextTranslator>, cache_dir: PathBuf, model: S) -> Self {
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            warn!("Failed to create translation cache directory: {}", e);
        }
        Self {
            inner,
            cache_dir,
            model: model.into(),
            memory: Mutex::new(HashMap::new()),
        }
    }

    /// Generate cache key for translation
    pub fn generate_cache_key(&self, source_text: &str, source: Language, target: Language) -> String {
        let mut hasher = DefaultHasher::new();
        source_text.hash(&mut hasher);
        source.code().hash(&mut hasher);
        target.code().hash(&mut hasher);
        self.model.hash(&mut hasher);

        format!("{:016x}", hasher.finish())
    }

    fn remember(&self, cache_key: &str, translation: &str) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(cache_key.to_string(), translation.to_string());
        }
    }

    fn recall(&self, cache_key: &str) -> Option<String> {
        self.memory.lock().ok().and_then(|memory| memory.get(cache_key).cloned())
    }

    /// Load translation from persistent cache
    pub async fn load_from_persistent_cache(&self, cache_key: &str) -> Result<Option<String>> {
        let cache_file = self.cache_dir.join(format!("{}.json", cache_key));
        if !cache_file.exists() {
            return Ok(None);
        }

        match tokio::fs::read_to_string(&cache_file).await {
            Ok(content) => match serde_json::from_str::<TranslationCacheEntry>(&content) {
                Ok(entry) => {
                    debug!(
                        "Translation cache hit: {} (cached {} ago)",
                        cache_key,
                        format_duration(now_secs().saturating_sub(entry.cached_at))
                    );
                    Ok(Some(entry.translation))
                }
                Err(e) => {
                    warn!("Failed to parse translation cache entry: {}", e);
                    Ok(None)
                }
            },
            Err(_) => Ok(None),
        }
    }

    /// Save translation to persistent cache
    pub async fn save_to_persistent_cache(
        &self,
        cache_key: &str,
        source_text: &str,
        source: Language,
        target: Language,
        translation: &str,
    ) -> Result<()> {
        let entry = TranslationCacheEntry {
            source_text: source_text.to_string(),
            source_language: source,
            target_language: target,
            translation: translation.to_string(),
            model: self.model.clone(),
            cached_at: now_secs(),
        };

        let cache_file = self.cache_dir.join(format!("{}.json", cache_key));
        let content = serde_json::to_string_pretty(&entry)
            .map_err(|e| DeckError::Cache(format!("Failed to serialize translation cache: {}", e)))?;

        if let Err(e) = tokio::fs::write(&cache_file, content).await {
            warn!("Failed to write translation cache: {}", e);
        } else {
            debug!("Saved translation to cache: {}", cache_key);
        }
        Ok(())
    }
}

#[async_trait]
impl TextTranslator for CachedTranslator {
    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let cache_key = self.generate_cache_key(text, source, target);
        if let Some(hit) = self.recall(&cache_key) {
            return Ok(hit);
        }
        if let Some(hit) = self.load_from_persistent_cache(&cache_key).await? {
            self.remember(&cache_key, &hit);
            return Ok(hit);
        }

        let translation = self.inner.translate(text, source, target).await?;
        self.remember(&cache_key, &translation);
        self.save_to_persistent_cache(&cache_key, text, source, target, &translation).await?;
        Ok(translation)
    }
}

/// Clear all translation cache
pub async fn clear_translation_cache(cache_dir: &Path) -> Result<u64> {
    let mut count = 0;
    if let Ok(mut entries) = tokio::fs::read_dir(cache_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && tokio::fs::remove_file(&path).await.is_ok() {
                count += 1;
            }
        }
    }
    info!("Cleared {} translation cache entries", count);
    Ok(count)
}

/// List translation cache entries, newest first
pub async fn list_translation_cache(cache_dir: &Path) -> Result<Vec<TranslationCacheEntry>> {
    let mut entries = Vec::new();

    if let Ok(mut dir_entries) = tokio::fs::read_dir(cache_dir).await {
        while let Ok(Some(entry)) = dir_entries.next_entry().await {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                match serde_json::from_str::<TranslationCacheEntry>(&content) {
                    Ok(cache_entry) => entries.push(cache_entry),
                    Err(e) => debug!("Skipping unreadable cache entry {}: {}", path.display(), e),
                }
            }
        }
    }

    entries.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));
    Ok(entries)
}

pub(crate) fn now_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// Format duration in seconds to a human-readable string
pub fn format_duration(seconds: u64) -> String {
    let days = seconds / (24 * 60 * 60);
    let hours = (seconds % (24 * 60 * 60)) / (60 * 60);
    let minutes = (seconds % (60 * 60)) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
