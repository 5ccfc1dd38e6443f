use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a session is in its single translation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationState {
    /// No translation has been started, or the last one was abandoned.
    #[default]
    NoTranslation,
    /// A translation job is waiting for the file or running.
    WaitingForFile,
    /// The session's translation finished; a new session is needed for another.
    TranslationComplete,
}

impl fmt::Display for TranslationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TranslationState::NoTranslation => "no_translation",
            TranslationState::WaitingForFile => "waiting_for_file",
            TranslationState::TranslationComplete => "translation_complete",
        };
        f.write_str(name)
    }
}
