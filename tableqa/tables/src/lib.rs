#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Table collection, TF-IDF index and question-to-table ranking.

/// Error taxonomy for table loading and validation.
#[path = "../error.rs"]
pub mod error;

/// Stemmed keyword tokenization.
#[path = "../tokenizer.rs"]
pub mod tokenizer;

/// Table model.
#[path = "../table.rs"]
pub mod table;

/// Filesystem loaders for tables.
#[path = "../loader.rs"]
pub mod loader;

/// TF-IDF index over the table collection.
#[path = "../index.rs"]
pub mod index;

/// Column alignment / relation configuration consumed by the optimizer.
#[path = "../constraints.rs"]
pub mod constraints;

/// Precomputed question-to-tables lookup.
#[path = "../cheat_sheet.rs"]
pub mod cheat_sheet;

/// Question-to-table ranking.
#[path = "../ranker.rs"]
pub mod ranker;

pub use cheat_sheet::{CheatSheetSource, QuestionTablesCache};
pub use constraints::{
    AllowedColumnAlignment, InterColumnRelation, RelationPattern, TableConstraints,
};
pub use error::TableError;
pub use index::TableIndex;
pub use loader::load_tables_from_dir;
pub use ranker::{RankingPolicy, ScoredTable, SelectionMode, TableRanker, TableRetriever};
pub use table::Table;
pub use tokenizer::{KeywordTokenizer, Tokenizer};
