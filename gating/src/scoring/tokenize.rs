//! Tokenization primitives shared by both scoring axes.
//!
//! The scoring engine only assumes a tokenizer "splits text into atomic
//! comparable units"; everything else (qualifying filter, bigrams) is built
//! on top of whatever [`Tokenizer`] is plugged in.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Han runs or runs of other letters/digits.
static WORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\p{Han}+)|([\p{L}\p{N}&&[^\p{Han}]]+)")
        .expect("WORD_PATTERN regex should compile")
});

/// Splits text into comparable units.
pub trait Tokenizer: Send + Sync {
    /// Tokenize `text`, preserving order. Tokens are expected to be
    /// case-normalized.
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Default tokenizer: lower-cased Unicode words.
///
/// Han text has no whitespace word boundaries, so each run of ideographs is
/// emitted as overlapping two-character shingles (a lone ideograph is kept
/// as-is). That keeps Chinese drafts comparable without a dictionary
/// segmenter.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl WordTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for caps in WORD_PATTERN.captures_iter(text) {
            if let Some(han) = caps.get(1) {
                let word = han.as_str();
                let chars: Vec<char> = word.chars().collect();
                if chars.len() == 1 {
                    tokens.push(word.to_string());
                } else {
                    for pair in chars.windows(2) {
                        tokens.push(pair.iter().collect());
                    }
                }
            } else if let Some(word) = caps.get(2) {
                tokens.push(word.as_str().to_lowercase());
            }
        }
        tokens
    }
}

/// Whether a token counts toward coverage/overlap (length > 1 char).
pub fn is_qualifying(token: &str) -> bool {
    token.chars().count() > 1
}

/// Tokenize and keep only qualifying tokens, order preserved.
pub fn qualifying_tokens(tokenizer: &dyn Tokenizer, text: &str) -> Vec<String> {
    tokenizer
        .tokenize(text)
        .into_iter()
        .filter(|t| is_qualifying(t))
        .collect()
}

/// Consecutive token pairs.
pub fn bigrams(tokens: &[String]) -> HashSet<(String, String)> {
    tokens
        .windows(2)
        .map(|w| (w[0].clone(), w[1].clone()))
        .collect()
}
