//! Similarity backends wrapped by the alignment scorer.

/// Entailment-service backed scoring with cache write-back.
pub mod entailment;
/// Word-vector cosine similarity.
pub mod word2vec;
/// Stemmed word-overlap coverage.
pub mod word_overlap;

pub use entailment::{EntailmentBackend, EntailmentScore, EntailmentService};
pub use word2vec::{InMemoryVectorModel, VectorModel, Word2VecBackend};
pub use word_overlap::WordOverlapBackend;

/// A directional text-similarity function.
///
/// `score(premise, hypothesis)` measures how well `premise` supports
/// `hypothesis`; symmetric backends simply ignore the direction.
pub trait SimilarityBackend: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;
    /// Directional score.
    fn score(&self, premise: &str, hypothesis: &str) -> f64;
}
