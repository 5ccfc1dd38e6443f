use super::state::TranslationState;
use crate::language::Language;
use crate::messages::Message;

#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    Allow { source: Language, target: Language },
    /// The request is ambiguous; ask instead of acting.
    Clarify(Message),
    /// The session cannot start a translation right now.
    Refuse(Message),
}

/// Decide whether a proposed translation may start.
///
/// The planner's proposal is advisory: the session state and the two language
/// names are checked here no matter what the model decided.
pub fn evaluate(state: TranslationState, source: Option<&str>, target: Option<&str>) -> GuardDecision {
    match state {
        TranslationState::WaitingForFile => return GuardDecision::Refuse(Message::TranslationInProgress),
        TranslationState::TranslationComplete => return GuardDecision::Refuse(Message::TranslationAlreadyComplete),
        TranslationState::NoTranslation => {}
    }

    fn named(phrase: Option<&str>) -> Option<&str> {
        phrase.map(str::trim).filter(|p| !p.is_empty())
    }
    let (Some(source_phrase), Some(target_phrase)) = (named(source), named(target)) else {
        return GuardDecision::Clarify(Message::AskLanguages);
    };

    let resolve = |phrase: &str| Language::normalize(phrase).ok_or_else(|| phrase.to_string());
    let (source, target) = match (resolve(source_phrase), resolve(target_phrase)) {
        (Ok(source), Ok(target)) => (source, target),
        (Err(phrase), _) | (_, Err(phrase)) => return GuardDecision::Clarify(Message::UnsupportedLanguage { phrase }),
    };

    if source == target {
        return GuardDecision::Clarify(Message::SameLanguages);
    }
    GuardDecision::Allow { source, target }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed() {
        assert_eq!(
            evaluate(TranslationState::NoTranslation, Some("中文"), Some("English")),
            GuardDecision::Allow { source: Language::TraditionalChinese, target: Language::English }
        );
    }

    #[test]
    fn test_padded_language_names() {
        assert_eq!(
            evaluate(TranslationState::NoTranslation, Some("  en "), Some("ja\n")),
            GuardDecision::Allow { source: Language::English, target: Language::Japanese }
        );
        assert_eq!(
            evaluate(TranslationState::NoTranslation, Some("en"), Some("   ")),
            GuardDecision::Clarify(Message::AskLanguages)
        );
    }

    #[test]
    fn test_state_blocks_translation() {
        assert_eq!(
            evaluate(TranslationState::WaitingForFile, Some("en"), Some("ja")),
            GuardDecision::Refuse(Message::TranslationInProgress)
        );
        assert_eq!(
            evaluate(TranslationState::TranslationComplete, Some("en"), Some("ja")),
            GuardDecision::Refuse(Message::TranslationAlreadyComplete)
        );
    }

    #[test]
    fn test_missing_language_asks() {
        assert_eq!(
            evaluate(TranslationState::NoTranslation, None, Some("ja")),
            GuardDecision::Clarify(Message::AskLanguages)
        );
        assert_eq!(
            evaluate(TranslationState::NoTranslation, Some("en"), Some("  ")),
            GuardDecision::Clarify(Message::AskLanguages)
        );
    }

    #[test]
    fn test_unknown_language_is_not_passed_through() {
        assert_eq!(
            evaluate(TranslationState::NoTranslation, Some("English"), Some("Klingon")),
            GuardDecision::Clarify(Message::UnsupportedLanguage { phrase: "Klingon".to_string() })
        );
    }

    #[test]
    fn test_same_language_is_ambiguous() {
        assert_eq!(
            evaluate(TranslationState::NoTranslation, Some("華語"), Some("繁體中文")),
            GuardDecision::Clarify(Message::SameLanguages)
        );
    }
}
