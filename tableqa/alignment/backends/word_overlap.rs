use std::{collections::HashSet, sync::Arc};

use tableqa_tables::Tokenizer;

use super::SimilarityBackend;

/// Fraction of the hypothesis' stemmed tokens covered by the premise.
pub struct WordOverlapBackend {
    tokenizer: Arc<dyn Tokenizer>,
}

impl WordOverlapBackend {
    /// Creates the backend.
    #[must_use]
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    /// `|set(target) ∩ set(source)| / |target|` over stemmed tokens.
    ///
    /// The denominator counts target tokens with repetition while the
    /// numerator counts distinct shared tokens, so repeated target tokens
    /// pull the score below 1. Always in `[0, 1]`; an empty target scores 0.
    #[must_use]
    pub fn overlap(&self, source: &str, target: &str) -> f64 {
        let target_tokens = self.tokenizer.stemmed_keyword_tokenize(target);
        if target_tokens.is_empty() {
            return 0.0;
        }
        let source_set: HashSet<String> = self
            .tokenizer
            .stemmed_keyword_tokenize(source)
            .into_iter()
            .collect();
        let target_set: HashSet<&str> = target_tokens.iter().map(String::as_str).collect();
        let shared = target_set
            .into_iter()
            .filter(|token| source_set.contains(*token))
            .count();
        shared as f64 / target_tokens.len() as f64
    }
}

impl SimilarityBackend for WordOverlapBackend {
    fn name(&self) -> &'static str {
        "word-overlap"
    }

    fn score(&self, premise: &str, hypothesis: &str) -> f64 {
        self.overlap(premise, hypothesis)
    }
}
