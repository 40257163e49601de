use std::collections::{HashMap, HashSet};

use serde_json::json;
use shared_logging::{LogLevel, Telemetry};

use crate::{
    constraints::TableConstraints, error::TableError, table::Table, tokenizer::Tokenizer,
};

/// Per-token, per-table term frequency: `tf[token][table]`.
pub type TermFrequencies = HashMap<String, HashMap<usize, f64>>;
/// Per-token inverse document frequency.
pub type InverseDocumentFrequencies = HashMap<String, f64>;

/// Immutable table collection with its derived TF-IDF maps.
///
/// Built once at startup and shared read-only; table positions are the
/// identifiers used everywhere else.
#[derive(Debug, Clone)]
pub struct TableIndex {
    tables: Vec<Table>,
    ignored: HashSet<usize>,
    by_name: HashMap<String, usize>,
    table_tokens: Vec<Vec<String>>,
    tf: TermFrequencies,
    idf: InverseDocumentFrequencies,
    constraints: TableConstraints,
}

impl TableIndex {
    /// Tokenizes `tables` and builds TF-IDF over every table not named in `ignored`.
    pub fn build(
        mut tables: Vec<Table>,
        ignored: &[String],
        tokenizer: &dyn Tokenizer,
        telemetry: Option<&Telemetry>,
    ) -> Result<Self, TableError> {
        let mut by_name = HashMap::with_capacity(tables.len());
        for (position, table) in tables.iter().enumerate() {
            if table.name().trim().is_empty() {
                return Err(TableError::EmptyName(position));
            }
            if by_name.insert(table.name().to_string(), position).is_some() {
                return Err(TableError::DuplicateName(table.name().to_string()));
            }
        }
        let ignored = ignored
            .iter()
            .map(|name| {
                by_name
                    .get(name)
                    .copied()
                    .ok_or_else(|| TableError::UnknownIgnoredTable(name.clone()))
            })
            .collect::<Result<HashSet<_>, _>>()?;

        for table in &mut tables {
            table.tokenize(tokenizer);
        }
        let table_tokens: Vec<Vec<String>> = tables.iter().map(Table::all_tokens).collect();
        let documents: Vec<(usize, &[String])> = table_tokens
            .iter()
            .enumerate()
            .filter(|(position, _)| !ignored.contains(position))
            .map(|(position, tokens)| (position, tokens.as_slice()))
            .collect();
        let (tf, idf) = compute_tf_idf(&documents);

        if let Some(tel) = telemetry {
            let _ = tel.log(
                LogLevel::Info,
                "tables.index.built",
                json!({
                    "tables": tables.len(),
                    "ignored": ignored.len(),
                    "vocabulary": idf.len(),
                }),
            );
        }

        Ok(Self {
            tables,
            ignored,
            by_name,
            table_tokens,
            tf,
            idf,
            constraints: TableConstraints::default(),
        })
    }

    /// Attaches validated alignment / relation configuration.
    #[must_use]
    pub fn with_constraints(mut self, constraints: TableConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Term frequency of `token` in `table`; `None` when the token never occurs there.
    #[must_use]
    pub fn tf(&self, token: &str, table: usize) -> Option<f64> {
        self.tf.get(token)?.get(&table).copied()
    }

    /// Inverse document frequency of `token`; `None` for tokens in no indexed table.
    #[must_use]
    pub fn idf(&self, token: &str) -> Option<f64> {
        self.idf.get(token).copied()
    }

    /// Number of distinct indexed tokens.
    #[must_use]
    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    /// Table at `position`.
    #[must_use]
    pub fn table(&self, position: usize) -> Option<&Table> {
        self.tables.get(position)
    }

    /// All tables in positional order.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Position of the table called `name`.
    #[must_use]
    pub fn table_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Flattened stemmed tokens of the table at `position`.
    #[must_use]
    pub fn table_tokens(&self, position: usize) -> &[String] {
        self.table_tokens
            .get(position)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of tables, ignored ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the collection holds no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Whether the table is excluded from ranking.
    #[must_use]
    pub fn is_ignored(&self, position: usize) -> bool {
        self.ignored.contains(&position)
    }

    /// Names of ignored tables in positional order.
    #[must_use]
    pub fn ignored_names(&self) -> Vec<&str> {
        self.names_where_ignored(true)
    }

    /// Positions eligible for ranking, in order.
    #[must_use]
    pub fn searchable_indices(&self) -> Vec<usize> {
        (0..self.tables.len())
            .filter(|position| !self.ignored.contains(position))
            .collect()
    }

    /// Alignment / relation configuration attached to this collection.
    #[must_use]
    pub const fn constraints(&self) -> &TableConstraints {
        &self.constraints
    }

    fn names_where_ignored(&self, ignored: bool) -> Vec<&str> {
        self.tables
            .iter()
            .enumerate()
            .filter(|(position, _)| self.ignored.contains(position) == ignored)
            .map(|(_, table)| table.name())
            .collect()
    }
}

/// Builds `tf` and `idf` over `(table position, tokens)` documents.
///
/// `tf = 1 + log10(count)` for every token present in a table and
/// `idf = log10(documents / df)`; tokens absent from a table get no `tf` entry.
#[must_use]
pub fn compute_tf_idf(
    documents: &[(usize, &[String])],
) -> (TermFrequencies, InverseDocumentFrequencies) {
    let mut tf: TermFrequencies = HashMap::new();
    let mut df: HashMap<String, usize> = HashMap::new();
    for (position, tokens) in documents {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in *tokens {
            *counts.entry(token.as_str()).or_default() += 1;
        }
        for (token, count) in counts {
            tf.entry(token.to_string())
                .or_default()
                .insert(*position, 1.0 + (count as f64).log10());
            *df.entry(token.to_string()).or_default() += 1;
        }
    }
    let document_count = documents.len() as f64;
    let idf = df
        .into_iter()
        .map(|(token, frequency)| (token, (document_count / frequency as f64).log10()))
        .collect();
    (tf, idf)
}
