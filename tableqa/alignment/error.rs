use thiserror::Error;

/// Errors raised while constructing alignment scorers.
#[derive(Debug, Error)]
pub enum AlignmentError {
    /// The configured strategy name is not one of the known strategies.
    #[error("unknown alignment strategy `{0}` (expected entailment, word2vec or word-overlap)")]
    UnknownStrategy(String),
    /// A strategy was selected without the external service it requires.
    #[error("alignment strategy `{strategy}` requires a {dependency}")]
    MissingDependency {
        /// Strategy name.
        strategy: &'static str,
        /// Missing collaborator.
        dependency: &'static str,
    },
    /// The out-of-vocabulary sentinel has no vector.
    #[error("sentinel token `{0}` is not in the vector vocabulary")]
    MissingSentinel(String),
    /// A vector file line could not be parsed.
    #[error("vector file line {line}: {reason}")]
    MalformedVectors {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
    /// Reading vectors failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
