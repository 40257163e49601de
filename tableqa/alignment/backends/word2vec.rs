use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    sync::Arc,
};

use super::SimilarityBackend;
use crate::error::AlignmentError;

/// Default token standing in for out-of-vocabulary phrases.
pub const DEFAULT_SENTINEL: &str = "</s>";

/// Pre-trained word/phrase vectors.
pub trait VectorModel: Send + Sync {
    /// Whether `term` has a vector.
    fn contains(&self, term: &str) -> bool;
    /// Cosine similarity of two in-vocabulary terms; 0 when either is unknown.
    fn cosine_similarity(&self, a: &str, b: &str) -> f64;
}

/// Vectors held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVectorModel {
    vectors: HashMap<String, Vec<f32>>,
}

impl InMemoryVectorModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a vector.
    pub fn insert(&mut self, term: impl Into<String>, vector: Vec<f32>) {
        self.vectors.insert(term.into(), vector);
    }

    /// Number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the model has no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Reads the word2vec text format: `term v1 v2 ...` per line, with an
    /// optional leading `count dimension` header.
    pub fn from_word2vec_text(reader: impl BufRead) -> Result<Self, AlignmentError> {
        let mut model = Self::new();
        let mut dimension: Option<usize> = None;
        for (offset, line) in reader.lines().enumerate() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(term) = fields.next() else {
                continue;
            };
            let values: Vec<&str> = fields.collect();
            if offset == 0 && values.len() == 1 && term.parse::<usize>().is_ok() {
                dimension = values[0].parse().ok();
                continue;
            }
            let vector = values
                .iter()
                .map(|value| value.parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| AlignmentError::MalformedVectors {
                    line: offset + 1,
                    reason: err.to_string(),
                })?;
            match dimension {
                Some(expected) if expected != vector.len() => {
                    return Err(AlignmentError::MalformedVectors {
                        line: offset + 1,
                        reason: format!("expected {expected} values, found {}", vector.len()),
                    });
                }
                None => dimension = Some(vector.len()),
                _ => {}
            }
            model.insert(term, vector);
        }
        Ok(model)
    }

    /// Loads a word2vec text file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AlignmentError> {
        let file = File::open(path)?;
        Self::from_word2vec_text(BufReader::new(file))
    }
}

impl VectorModel for InMemoryVectorModel {
    fn contains(&self, term: &str) -> bool {
        self.vectors.contains_key(term)
    }

    fn cosine_similarity(&self, a: &str, b: &str) -> f64 {
        let (Some(a), Some(b)) = (self.vectors.get(a), self.vectors.get(b)) else {
            return 0.0;
        };
        let mut dot = 0.0f64;
        let mut norm_a = 0.0f64;
        let mut norm_b = 0.0f64;
        for (x, y) in a.iter().zip(b) {
            let (x, y) = (f64::from(*x), f64::from(*y));
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        if norm_a <= 0.0 || norm_b <= 0.0 {
            return 0.0;
        }
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

/// Symmetric cosine similarity over phrase vectors.
///
/// Phrases are looked up lower-cased with spaces joined by `_`; anything not
/// in the vocabulary is replaced by the sentinel, so the score is total.
pub struct Word2VecBackend {
    model: Arc<dyn VectorModel>,
    sentinel: String,
}

impl Word2VecBackend {
    /// Creates the backend; the sentinel must have a vector.
    pub fn new(
        model: Arc<dyn VectorModel>,
        sentinel: impl Into<String>,
    ) -> Result<Self, AlignmentError> {
        let sentinel = sentinel.into();
        if !model.contains(&sentinel) {
            return Err(AlignmentError::MissingSentinel(sentinel));
        }
        Ok(Self { model, sentinel })
    }

    /// Vocabulary key used for `text`.
    #[must_use]
    pub fn lookup_key(&self, text: &str) -> String {
        let phrase = text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("_");
        if self.model.contains(&phrase) {
            phrase
        } else {
            self.sentinel.clone()
        }
    }

    /// Cosine similarity between the two phrases.
    #[must_use]
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        self.model
            .cosine_similarity(&self.lookup_key(a), &self.lookup_key(b))
    }
}

impl SimilarityBackend for Word2VecBackend {
    fn name(&self) -> &'static str {
        "word2vec"
    }

    fn score(&self, premise: &str, hypothesis: &str) -> f64 {
        self.similarity(premise, hypothesis)
    }
}
