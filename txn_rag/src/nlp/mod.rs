//! Rule-based NLP stages: language detection, filter extraction and
//! query-mode classification. No model calls happen here.

pub mod filters;
pub mod mode;

use std::sync::LazyLock;

use regex::Regex;

pub use filters::{
    extract_filters, extract_filters_at, AmountBound, FilterSpec, SortField, SortOrder, SortSpec,
};
pub use mode::classify;

/// Prompt language, used only to pick the instruction wording; it never
/// filters content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    HindiDevanagari,
    Hinglish,
}

static HINGLISH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(mujhe|saari|dikhao|batao|kitna|kitne|kaha|paisa|kharcha|mera|meri|mere|pichle)\b")
        .unwrap()
});

/// Detect the prompt language. Any Devanagari codepoint wins; otherwise a
/// fixed Hinglish keyword set; otherwise English.
pub fn detect_language(prompt: &str) -> Language {
    if prompt.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c)) {
        return Language::HindiDevanagari;
    }
    if HINGLISH_RE.is_match(prompt) {
        return Language::Hinglish;
    }
    Language::English
}

impl Language {
    /// Instruction line injected into the user message of the prompt bundle.
    pub fn directive(&self) -> &'static str {
        match self {
            Language::English => "Respond in English.",
            Language::HindiDevanagari => {
                "Respond in Hindi using Devanagari script (the user's question is in Hindi)."
            }
            Language::Hinglish => {
                "Respond in Hinglish (Roman script with Hindi words), matching the user's tone."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devanagari_codepoint_wins() {
        assert_eq!(detect_language("कुल कितने डेबिट हुए?"), Language::HindiDevanagari);
        // Mixed-script prompts still count as Hindi
        assert_eq!(detect_language("show डेबिट please"), Language::HindiDevanagari);
    }

    #[test]
    fn hinglish_keywords_detected() {
        assert_eq!(
            detect_language("Mujhe saari UPI transactions dikhao"),
            Language::Hinglish
        );
        assert_eq!(detect_language("pichle month ka kharcha"), Language::Hinglish);
    }

    #[test]
    fn defaults_to_english() {
        assert_eq!(detect_language("Show my largest transactions"), Language::English);
    }
}
