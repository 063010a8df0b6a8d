//! Description tokenizer
//!
//! Turns free-text transaction descriptions into discriminative units:
//! lower-cased alphanumeric words longer than two characters, without
//! stopwords or digits, plus underscore-joined bigrams.

use crate::config::Vocabulary;

/// Minimum token length kept (exclusive)
const MIN_TOKEN_LEN: usize = 2;

/// Tokenizer bound to a stopword list
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer<'a> {
    vocabulary: &'a Vocabulary,
}

impl<'a> Tokenizer<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Split text into unigram tokens, in order of appearance
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let cleaned: String = lowered
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                    c
                } else {
                    ' '
                }
            })
            .collect();

        cleaned
            .split_whitespace()
            .filter(|t| t.len() > MIN_TOKEN_LEN)
            .filter(|t| !self.vocabulary.is_stopword(t))
            .filter(|t| !t.chars().any(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .collect()
    }

    /// Unigrams followed by bigrams: the feature set used for counting and scoring
    pub fn features(&self, text: &str) -> Vec<String> {
        let mut tokens = self.tokenize(text);
        let bigrams = add_ngrams(&tokens, 2);
        tokens.extend(bigrams);
        tokens
    }
}

/// Contiguous n-grams joined with `_`; empty when there are fewer than `n` tokens
pub fn add_ngrams(tokens: &[String], n: usize) -> Vec<String> {
    if n == 0 || tokens.len() < n {
        return Vec::new();
    }
    tokens.windows(n).map(|window| window.join("_")).collect()
}
