//! Task text tokenization

use std::collections::BTreeSet;

/// Tokens shorter than this are discarded
pub const MIN_TOKEN_LEN: usize = 4;

const SEPARATORS: &[char] = &[
    '.', ',', ';', ':', '!', '?', '-', '_', '/', '\\', '"', '\'', '`', '(', ')', '[', ']', '{',
    '}',
];

/// Deduplicated, sorted task tokens.
///
/// `words` keeps every split word regardless of length; it only feeds the
/// short-tag match in the ranker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskTokens {
    tokens: BTreeSet<String>,
    words: BTreeSet<String>,
}

impl TaskTokens {
    /// Tokens of at least [`MIN_TOKEN_LEN`] characters
    pub fn tokens(&self) -> &BTreeSet<String> {
        &self.tokens
    }

    /// All split words
    pub fn words(&self) -> &BTreeSet<String> {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.words.is_empty()
    }
}

/// Lower-case `text`, split on whitespace and punctuation, drop short tokens.
pub fn extract_tokens(text: &str) -> TaskTokens {
    let lowered = text.to_lowercase();
    let words: BTreeSet<String> = lowered
        .split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    let tokens = words
        .iter()
        .filter(|w| w.chars().count() >= MIN_TOKEN_LEN)
        .cloned()
        .collect();
    TaskTokens { tokens, words }
}
