use std::fmt;

use serde::{Deserialize, Serialize};

/// The languages a presentation can be translated between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "zh-TW")]
    TraditionalChinese,
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ja")]
    Japanese,
}

/// Accepted phrasings per language, compared after [`fold`].
const ALIASES: &[(Language, &[&str])] = &[
    (
        Language::TraditionalChinese,
        &[
            "zh-tw", "zh_tw", "zh", "zh-hant", "chinese", "traditional chinese", "chinese (traditional)",
            "mandarin", "taiwanese mandarin", "中文", "中國語", "中国語", "華語", "华语", "繁體中文", "繁体中文",
            "繁中", "國語", "国语", "漢語", "汉语", "中文（繁體）", "中国語（繁体字）",
        ],
    ),
    (
        Language::English,
        &["en", "en-us", "en-gb", "english", "英文", "英語", "英语", "えいご"],
    ),
    (
        Language::Japanese,
        &["ja", "ja-jp", "jp", "japanese", "日文", "日語", "日语", "日本語", "にほんご"],
    ),
];

impl Language {
    pub const ALL: [Language; 3] = [Language::TraditionalChinese, Language::English, Language::Japanese];

    pub fn code(&self) -> &'static str {
        match self {
            Language::TraditionalChinese => "zh-TW",
            Language::English => "en",
            Language::Japanese => "ja",
        }
    }

    /// English name, used in prompts.
    pub fn english_name(&self) -> &'static str {
        match self {
            Language::TraditionalChinese => "Traditional Chinese",
            Language::English => "English",
            Language::Japanese => "Japanese",
        }
    }

    /// Name of `self` written in `reader`'s language.
    pub fn name_in(&self, reader: Language) -> &'static str {
        match (reader, self) {
            (Language::English, _) => self.english_name(),
            (Language::TraditionalChinese, Language::TraditionalChinese) => "繁體中文",
            (Language::TraditionalChinese, Language::English) => "英文",
            (Language::TraditionalChinese, Language::Japanese) => "日文",
            (Language::Japanese, Language::TraditionalChinese) => "中国語（繁体字）",
            (Language::Japanese, Language::English) => "英語",
            (Language::Japanese, Language::Japanese) => "日本語",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|language| language.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Map a free-form language name onto a canonical language.
    ///
    /// Only fixed phrasings are recognized; anything else is `None` and is
    /// never passed through.
    pub fn normalize(phrase: &str) -> Option<Self> {
        let folded = fold(phrase);
        if folded.is_empty() {
            return None;
        }
        ALIASES
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|alias| fold(alias) == folded))
            .map(|(language, _)| *language)
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        ALIASES
            .iter()
            .find(|(language, _)| language == self)
            .map(|(_, aliases)| *aliases)
            .unwrap_or(&[])
    }

    /// Guess the language a message is written in, for mirroring replies.
    ///
    /// Kana means Japanese, other CJK ideographs mean Chinese, anything else English.
    pub fn detect(text: &str) -> Self {
        let mut has_han = false;
        for c in text.chars() {
            match c {
                '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}' => {
                    return Language::Japanese;
                }
                '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}' => has_han = true,
                _ => {}
            }
        }
        if has_han {
            Language::TraditionalChinese
        } else {
            Language::English
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Lowercase, collapse whitespace, drop a trailing " language" and sentence punctuation.
fn fold(phrase: &str) -> String {
    let lowered = phrase.trim().to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = collapsed
        .strip_suffix(" language")
        .unwrap_or(collapsed.as_str())
        .trim_end_matches(['.', '!', '?', '。'])
        .trim();
    stripped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chinese_phrasings_normalize_to_traditional() {
        assert_eq!(Language::normalize("中文"), Some(Language::TraditionalChinese));
        assert_eq!(Language::normalize("華語"), Some(Language::TraditionalChinese));
        assert_eq!(Language::normalize("中國語"), Some(Language::TraditionalChinese));
        assert_eq!(Language::normalize("  Chinese "), Some(Language::TraditionalChinese));
        assert_eq!(Language::normalize("zh-TW"), Some(Language::TraditionalChinese));
    }

    #[test]
    fn test_other_languages() {
        assert_eq!(Language::normalize("English language"), Some(Language::English));
        assert_eq!(Language::normalize("英語"), Some(Language::English));
        assert_eq!(Language::normalize("日本語"), Some(Language::Japanese));
        assert_eq!(Language::normalize("JA"), Some(Language::Japanese));
    }

    #[test]
    fn test_unknown_languages_are_rejected() {
        assert_eq!(Language::normalize("Klingon"), None);
        assert_eq!(Language::normalize("fr"), None);
        assert_eq!(Language::normalize(""), None);
        assert_eq!(Language::normalize("   "), None);
    }

    #[test]
    fn test_codes() {
        assert_eq!(Language::from_code("zh-tw"), Some(Language::TraditionalChinese));
        assert_eq!(Language::Japanese.to_string(), "ja");
        assert_eq!(serde_json::to_string(&Language::TraditionalChinese).unwrap(), "\"zh-TW\"");
    }

    #[test]
    fn test_detect() {
        assert_eq!(Language::detect("Please translate my deck"), Language::English);
        assert_eq!(Language::detect("請幫我翻譯這份簡報"), Language::TraditionalChinese);
        assert_eq!(Language::detect("このスライドを翻訳してください"), Language::Japanese);
        assert_eq!(Language::detect("日本語に翻訳"), Language::Japanese);
    }
}
