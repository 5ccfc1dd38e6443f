use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{UploadConfig, POWERPOINT_CONTENT_TYPES};
use crate::error::{DeckError, Result};
use crate::notify::{Notification, Notifier};
use crate::pptx::DocumentFormat;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub accepted_content_types: Vec<String>,
    pub max_size_bytes: u64,
    pub timeout: Duration,
}

impl UploadRequest {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            accepted_content_types: config.accepted_content_types.clone(),
            max_size_bytes: config.max_size_bytes,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// Result of one bounded wait for a user upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadPoll {
    Received(Vec<UploadedFile>),
    /// Nothing arrived before the timeout; the user is prompted again.
    TimedOut,
    /// A transfer has started but not finished; keep waiting without a new prompt.
    InProgress,
    Failed(String),
}

/// Where uploaded files come from (chat front end, web socket, ...).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadSource: Send + Sync {
    /// Ask the user for a file.
    async fn request_upload(&self, request: &UploadRequest) -> Result<()>;

    /// Wait up to `timeout` for the next upload event.
    async fn wait_for_upload(&self, timeout: Duration) -> Result<UploadPoll>;
}

/// Content type of a presentation file name, judged by extension.
pub fn content_type_for(name: &str) -> Option<&'static str> {
    match DocumentFormat::from_path(name)? {
        DocumentFormat::Ppt => Some(POWERPOINT_CONTENT_TYPES[0]),
        DocumentFormat::Pptx => Some(POWERPOINT_CONTENT_TYPES[1]),
    }
}

/// Strip path components and characters that are unsafe in file names.
/// Returns None if nothing usable is left.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect();
    let sanitized = sanitized.trim_matches(|c| c == '.' || c == ' ');
    if sanitized.is_empty() {
        return None;
    }

    let upper = sanitized.to_uppercase();
    let reserved = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8", "COM9",
        "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    if reserved.iter().any(|r| upper == *r || upper.starts_with(&format!("{}.", r))) {
        return None;
    }

    let mut end = sanitized.len().min(255);
    while !sanitized.is_char_boundary(end) {
        end -= 1;
    }
    Some(sanitized[..end].to_string())
}

/// Waits for the user's presentation and materializes it as a temporary file.
pub struct UploadCoordinator {
    source: Arc<dyn UploadSource>,
    notifier: Arc<dyn Notifier>,
    config: UploadConfig,
    temp_root: PathBuf,
}

impl UploadCoordinator {
    pub fn new(source: Arc<dyn UploadSource>, notifier: Arc<dyn Notifier>, config: UploadConfig) -> Self {
        let temp_root = config
            .temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("deckbridge-uploads"));
        Self {
            source,
            notifier,
            config,
            temp_root,
        }
    }

    /// Prompt until a file arrives; `None` when the upload fails, is abandoned
    /// or is not an acceptable presentation.
    pub async fn await_upload(&self) -> Result<Option<PathBuf>> {
        let request = UploadRequest::from_config(&self.config);
        let mut timeouts = 0u32;

        'prompt: loop {
            if let Err(e) = self.source.request_upload(&request).await {
                warn!("Failed to request upload: {}", e);
                return Ok(None);
            }

            loop {
                match self.source.wait_for_upload(request.timeout).await {
                    Ok(UploadPoll::Received(files)) => return self.accept(files, &request).await,
                    Ok(UploadPoll::InProgress) => {
                        debug!("Upload in progress, waiting");
                    }
                    // A source whose own transport timed out is treated like an empty wait.
                    Ok(UploadPoll::TimedOut) | Err(DeckError::UploadTimeout) => {
                        timeouts += 1;
                        if self.config.max_attempts.is_some_and(|max| timeouts >= max) {
                            info!("No upload after {} prompts, giving up", timeouts);
                            return Ok(None);
                        }
                        debug!("Upload wait timed out ({}), prompting again", timeouts);
                        continue 'prompt;
                    }
                    Ok(UploadPoll::Failed(reason)) => {
                        warn!("Upload failed: {}", reason);
                        return Ok(None);
                    }
                    Err(e) => {
                        warn!("Upload wait failed: {}", e);
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn accept(&self, files: Vec<UploadedFile>, request: &UploadRequest) -> Result<Option<PathBuf>> {
        if files.len() > 1 {
            debug!("Received {} files, using the first", files.len());
        }
        let Some(file) = files.into_iter().next() else {
            info!("Upload finished without a file");
            return Ok(None);
        };

        let accepted = content_type_for(&file.name)
            .is_some_and(|content_type| request.accepted_content_types.iter().any(|t| t == content_type));
        let safe_name = sanitize_filename(&file.name).filter(|_| accepted);
        let Some(safe_name) = safe_name else {
            info!("Rejected upload {:?}: not a presentation", file.name);
            self.notifier.notify(Notification::UnsupportedFile { name: file.name });
            return Ok(None);
        };

        if file.content.len() as u64 > request.max_size_bytes {
            info!("Rejected upload {:?}: {} bytes", file.name, file.content.len());
            self.notifier.notify(Notification::FileTooLarge {
                name: file.name,
                max_size_bytes: request.max_size_bytes,
            });
            return Ok(None);
        }

        let path = self.materialize(&safe_name, &file.content).await?;
        info!("Received upload {} ({} bytes)", path.display(), file.content.len());
        Ok(Some(path))
    }

    async fn materialize(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        let dir = self.temp_root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }

    /// Guard that removes the per-upload directory holding `path` when dropped.
    pub fn discard_on_drop(&self, path: &Path) -> UploadDirectory {
        let dir = path
            .parent()
            .filter(|dir| dir.starts_with(&self.temp_root) && *dir != self.temp_root.as_path())
            .map(Path::to_path_buf);
        UploadDirectory(dir)
    }
}

/// A per-upload directory, removed on drop even if the holder is aborted.
pub struct UploadDirectory(Option<PathBuf>);

impl Drop for UploadDirectory {
    fn drop(&mut self) {
        let Some(dir) = &self.0 else {
            return;
        };
        if let Err(e) = std::fs::remove_dir_all(dir) {
            debug!("Failed to remove upload directory {}: {}", dir.display(), e);
        }
    }
}

/// Events pushed by a front end into a [`ChannelUploadSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Started,
    Finished(UploadedFile),
    Failed(String),
}

pub type UploadSender = UnboundedSender<UploadEvent>;

/// Upload source fed through a channel; prompts go to a notifier.
pub struct ChannelUploadSource {
    events: Mutex<UnboundedReceiver<UploadEvent>>,
    notifier: Arc<dyn Notifier>,
}

impl ChannelUploadSource {
    pub fn channel(notifier: Arc<dyn Notifier>) -> (UploadSender, Self) {
        let (sender, receiver) = unbounded_channel();
        let source = Self {
            events: Mutex::new(receiver),
            notifier,
        };
        (sender, source)
    }
}

#[async_trait]
impl UploadSource for ChannelUploadSource {
    async fn request_upload(&self, request: &UploadRequest) -> Result<()> {
        // Files sent while nobody was waiting do not answer this request.
        let mut events = self.events.lock().await;
        while let Ok(event) = events.try_recv() {
            match event {
                UploadEvent::Finished(file) => info!("Discarding upload {:?} sent outside a request", file.name),
                other => debug!("Discarding stale upload event {:?}", other),
            }
        }
        drop(events);

        self.notifier.notify(Notification::UploadRequested {
            max_size_bytes: request.max_size_bytes,
        });
        Ok(())
    }

    async fn wait_for_upload(&self, timeout: Duration) -> Result<UploadPoll> {
        let mut events = self.events.lock().await;
        let poll = match tokio::time::timeout(timeout, events.recv()).await {
            Err(_) => UploadPoll::TimedOut,
            Ok(None) => UploadPoll::Failed("upload channel closed".to_string()),
            Ok(Some(UploadEvent::Started)) => UploadPoll::InProgress,
            Ok(Some(UploadEvent::Finished(file))) => UploadPoll::Received(vec![file]),
            Ok(Some(UploadEvent::Failed(reason))) => UploadPoll::Failed(reason),
        };
        Ok(poll)
    }
}
