use std::path::PathBuf;
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::language::Language;
use crate::messages::Message;

/// Progress and outcome events emitted while a document is handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    UploadRequested { max_size_bytes: u64 },
    UnsupportedFile { name: String },
    FileTooLarge { name: String, max_size_bytes: u64 },
    TranslationStarted { source: Language, target: Language },
    /// `index` is 1-based.
    SlideProgress { index: usize, total: usize },
    Saving,
    Completed { path: PathBuf },
    Failed,
}

fn megabytes(bytes: u64) -> u64 {
    bytes.div_ceil(1024 * 1024)
}

impl Notification {
    pub fn message(&self) -> Message {
        match self {
            Notification::UploadRequested { max_size_bytes } => Message::UploadPrompt {
                max_size_mb: megabytes(*max_size_bytes),
            },
            Notification::UnsupportedFile { name } => Message::UnsupportedFile { name: name.clone() },
            Notification::FileTooLarge { name, max_size_bytes } => Message::FileTooLarge {
                name: name.clone(),
                max_size_mb: megabytes(*max_size_bytes),
            },
            Notification::TranslationStarted { source, target } => Message::TranslationStarted {
                source: *source,
                target: *target,
            },
            Notification::SlideProgress { index, total } => Message::SlideProgress {
                index: *index,
                total: *total,
            },
            Notification::Saving => Message::Saving,
            Notification::Completed { path } => Message::Completed {
                file_name: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
            },
            Notification::Failed => Message::Failed,
        }
    }

    pub fn render(&self, language: Language) -> String {
        self.message().render(language)
    }
}

/// Receives notifications; implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log only
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::Failed => warn!("{}", notification.render(Language::English)),
            Notification::SlideProgress { .. } => debug!("{}", notification.render(Language::English)),
            _ => info!("{}", notification.render(Language::English)),
        }
    }
}

/// Forwards notifications to a channel, e.g. the chat front end
#[derive(Clone)]
pub struct ChannelNotifier {
    sender: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new(sender: UnboundedSender<Notification>) -> Self {
        Self { sender }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            debug!("Notification receiver dropped");
        }
    }
}

/// Prints notifications to the terminal with a slide progress bar
pub struct ConsoleNotifier {
    language: Language,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleNotifier {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            bar: Mutex::new(None),
        }
    }

    fn progress_bar(total: usize) -> ProgressBar {
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        let text = notification.render(self.language);
        let Ok(mut bar) = self.bar.lock() else {
            println!("{}", text);
            return;
        };

        match &notification {
            Notification::SlideProgress { index, total } => {
                let pb = bar.get_or_insert_with(|| Self::progress_bar(*total));
                pb.set_message(text);
                pb.set_position(*index as u64);
            }
            Notification::Saving | Notification::Completed { .. } | Notification::Failed => {
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
                println!("{}", text);
            }
            _ => match bar.as_ref() {
                Some(pb) => pb.println(text),
                None => println!("{}", text),
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_prompt_in_megabytes() {
        let notification = Notification::UploadRequested { max_size_bytes: 10 * 1024 * 1024 };
        assert_eq!(notification.message(), Message::UploadPrompt { max_size_mb: 10 });
        assert!(notification.render(Language::TraditionalChinese).contains("10 MB"));
    }

    #[test]
    fn test_completed_mentions_file_name_only() {
        let notification = Notification::Completed {
            path: PathBuf::from("/srv/output/translated_deck.pptx"),
        };
        assert_eq!(
            notification.message(),
            Message::Completed { file_name: "translated_deck.pptx".to_string() }
        );
    }

    #[tokio::test]
    async fn test_channel_notifier_forwards() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let notifier = ChannelNotifier::new(tx);
        notifier.notify(Notification::Saving);
        notifier.notify(Notification::Failed);

        assert_eq!(rx.recv().await, Some(Notification::Saving));
        assert_eq!(rx.recv().await, Some(Notification::Failed));
    }

    #[test]
    fn test_channel_notifier_tolerates_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        ChannelNotifier::new(tx).notify(Notification::Saving);
    }
}
