use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

// Constant pattern; `word_pattern_compiles` forces it.
static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("word pattern is a valid regex"));

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are",
        "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
        "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
        "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him",
        "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "many", "me",
        "more", "most", "much", "my", "no", "nor", "not", "of", "off", "on", "once", "only", "or",
        "other", "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some",
        "such", "than", "that", "the", "their", "theirs", "them", "then", "there", "these",
        "they", "this", "those", "through", "to", "too", "under", "until", "up", "very", "was",
        "we", "were", "what", "when", "where", "which", "while", "who", "whom", "whose", "why",
        "will", "with", "would", "you", "your", "yours",
    ]
    .into_iter()
    .collect()
});

/// Keyword tokenization capability consumed by the index, ranker and scorers.
pub trait Tokenizer: Send + Sync {
    /// Lower-cased keywords with stop words removed, in order, duplicates kept.
    fn keyword_tokenize(&self, text: &str) -> Vec<String>;

    /// Same as [`Tokenizer::keyword_tokenize`] with every token stemmed.
    fn stemmed_keyword_tokenize(&self, text: &str) -> Vec<String>;
}

/// Default English tokenizer: regex word split, stop-word filter, suffix stemmer.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordTokenizer;

impl Tokenizer for KeywordTokenizer {
    fn keyword_tokenize(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        WORD_RE
            .find_iter(&lower)
            .map(|m| m.as_str())
            .filter(|word| !STOP_WORDS.contains(word))
            .map(str::to_string)
            .collect()
    }

    fn stemmed_keyword_tokenize(&self, text: &str) -> Vec<String> {
        self.keyword_tokenize(text)
            .into_iter()
            .map(|word| stem(&word))
            .collect()
    }
}

/// Reports whether `word` is on the stop list.
#[must_use]
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Light suffix-stripping stemmer.
///
/// Plurals are reduced first, then at most one of `-ing`, `-ed`, `-ly`,
/// always leaving a stem of at least three characters. Numerals pass through.
#[must_use]
pub fn stem(word: &str) -> String {
    if word.len() <= 3 || word.bytes().all(|b| b.is_ascii_digit()) {
        return word.to_string();
    }
    let mut stemmed = if let Some(base) = word.strip_suffix("sses") {
        format!("{base}ss")
    } else if let Some(base) = word.strip_suffix("ies") {
        format!("{base}y")
    } else if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        word.to_string()
    } else if let Some(base) = word.strip_suffix('s') {
        base.to_string()
    } else {
        word.to_string()
    };
    for suffix in ["ing", "ed", "ly"] {
        if let Some(base) = stemmed.strip_suffix(suffix) {
            if base.len() >= 3 {
                stemmed = base.to_string();
                break;
            }
        }
    }
    stemmed
}
