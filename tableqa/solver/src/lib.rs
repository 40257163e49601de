#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Answer orchestration: table retrieval, alignment scoring, optimizer
//! delegation and the fallback path.

/// Configuration errors.
#[path = "../error.rs"]
pub mod error;

/// Question model handed to the optimizer.
#[path = "../question.rs"]
pub mod question;

/// Selected answers and their ordering.
#[path = "../answer.rs"]
pub mod answer;

/// Optimizer contract.
#[path = "../optimizer.rs"]
pub mod optimizer;

/// Fallback solver contract.
#[path = "../fallback.rs"]
pub mod fallback;

/// The answer orchestrator.
#[path = "../orchestrator.rs"]
pub mod orchestrator;

/// TOML configuration.
#[path = "../config.rs"]
pub mod config;

/// Wiring from configuration to a ready solver.
#[path = "../bootstrap.rs"]
pub mod bootstrap;

pub use answer::{sort_answers, SelectedAnswer, FALLBACK_FEATURE};
pub use bootstrap::{build_index, build_retriever, build_solver};
pub use config::SolverConfig;
pub use error::ConfigError;
pub use fallback::{FallbackAnswer, FallbackResponse, FallbackSolver, SolverRequest};
pub use optimizer::{AlignmentProblem, IlpSolution, SolveStatus, TableOptimizer};
pub use orchestrator::{SolverOptions, TableQaSolver};
pub use question::{AnswerChoice, Question, QuestionFormat, TableQuestion};
