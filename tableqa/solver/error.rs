use std::path::PathBuf;

use thiserror::Error;

/// Invalid solver configuration, detected while loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Ranked selection declared both `top_k` and `threshold`.
    #[error("ranked selection takes either top_k or threshold, not both")]
    ConflictingRankingPolicies,
    /// Ranked selection declared neither `top_k` nor `threshold`.
    #[error("ranked selection needs one of top_k or threshold")]
    MissingRankingPolicy,
    /// `top_k` of zero would never select anything.
    #[error("top_k must be at least 1")]
    ZeroTopK,
    /// A threshold that is not a finite number.
    #[error("threshold must be finite, got {0}")]
    InvalidThreshold(f64),
    /// Cached selection without a cheat-sheet file.
    #[error("cached selection requires tables.cheat_sheet")]
    MissingCheatSheet,
    /// Unrecognised selection mode.
    #[error("unknown selection mode `{0}` (expected ranked or cached)")]
    UnknownSelectionMode(String),
    /// Unrecognised log level.
    #[error("unknown log level `{0}`")]
    UnknownLogLevel(String),
    /// The tables directory does not exist.
    #[error("tables directory {0} does not exist")]
    MissingTablesDir(PathBuf),
    /// `solver.use_fallback` is set but no fallback solver was supplied.
    #[error("solver.use_fallback is enabled but no fallback solver was provided")]
    MissingFallbackSolver,
}
