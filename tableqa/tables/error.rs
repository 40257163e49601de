use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading tables or validating table configuration.
///
/// All of these surface at construction time; nothing here is produced while
/// answering an individual question.
#[derive(Debug, Error)]
pub enum TableError {
    /// A table was supplied without a name.
    #[error("table at position {0} has an empty name")]
    EmptyName(usize),
    /// Two tables share a name.
    #[error("duplicate table name: {0}")]
    DuplicateName(String),
    /// A configuration row references a table that is not loaded.
    #[error("{source_name}:{line}: unknown table `{table}`")]
    UnknownTable {
        /// Configuration source label.
        source_name: String,
        /// 1-based line number.
        line: usize,
        /// Offending table name.
        table: String,
    },
    /// An ignore list names a table that is not loaded.
    #[error("ignored table `{0}` is not loaded")]
    UnknownIgnoredTable(String),
    /// A configuration row has the wrong shape or an unparsable cell.
    #[error("{source_name}:{line}: {reason}")]
    MalformedRow {
        /// Configuration source label.
        source_name: String,
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
    /// A column index points past the table's widest row.
    #[error("{source_name}:{line}: column {column} out of range for table `{table}` ({columns} columns)")]
    ColumnOutOfRange {
        /// Configuration source label.
        source_name: String,
        /// 1-based line number.
        line: usize,
        /// Table name.
        table: String,
        /// Requested column.
        column: usize,
        /// Column count of the table.
        columns: usize,
    },
    /// A relation pattern names a relation no inter-column relation declares.
    #[error("{source_name}:{line}: unknown relation `{relation}`")]
    UnknownRelation {
        /// Configuration source label.
        source_name: String,
        /// 1-based line number.
        line: usize,
        /// Relation name.
        relation: String,
    },
    /// File could not be read.
    #[error("reading {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// CSV/TSV decoding failed.
    #[error("parsing {source_name}: {source}")]
    Csv {
        /// Source label.
        source_name: String,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },
}
