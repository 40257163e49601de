#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Alignment scoring between table content and question fragments.

/// Error taxonomy for scorer construction.
#[path = "../error.rs"]
pub mod error;

/// Key-value cache capability.
#[path = "../cache.rs"]
pub mod cache;

/// Shared score combinators.
#[path = "../combinators.rs"]
pub mod combinators;

/// Similarity backends.
#[path = "../backends/main.rs"]
pub mod backends;

/// The seven-operation scorer and its strategy factory.
#[path = "../scorer.rs"]
pub mod scorer;

pub use backends::{
    word2vec::DEFAULT_SENTINEL, EntailmentBackend, EntailmentScore, EntailmentService,
    InMemoryVectorModel, SimilarityBackend, VectorModel, Word2VecBackend, WordOverlapBackend,
};
pub use cache::{KeyValueCache, MemoryCache};
pub use error::AlignmentError;
pub use scorer::{
    AlignmentDependencies, AlignmentFactory, AlignmentOperation, AlignmentScorer,
    AlignmentSettings, AlignmentStrategy, DEFAULT_ENTAILMENT_OFFSET,
};
