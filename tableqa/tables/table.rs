use serde::{Deserialize, Serialize};

use crate::tokenizer::Tokenizer;

/// A named knowledge table. The first row is the title row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    name: String,
    rows: Vec<Vec<String>>,
    #[serde(skip)]
    cell_tokens: Vec<Vec<Vec<String>>>,
}

impl Table {
    /// Creates an untokenized table.
    #[must_use]
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            rows,
            cell_tokens: Vec::new(),
        }
    }

    /// Convenience constructor from string slices.
    #[must_use]
    pub fn from_strs(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        Self::new(
            name,
            rows.iter()
                .map(|row| row.iter().map(|cell| (*cell).to_string()).collect())
                .collect(),
        )
    }

    /// Computes the stemmed token sequence of every cell.
    pub fn tokenize(&mut self, tokenizer: &dyn Tokenizer) {
        self.cell_tokens = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| tokenizer.stemmed_keyword_tokenize(cell))
                    .collect()
            })
            .collect();
    }

    /// Whether [`Table::tokenize`] has run.
    #[must_use]
    pub fn is_tokenized(&self) -> bool {
        self.cell_tokens.len() == self.rows.len()
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All rows, title row included.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// The title row, if the table has any rows.
    #[must_use]
    pub fn title_row(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Rows after the title row.
    #[must_use]
    pub fn content_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or_default()
    }

    /// Width of the widest row.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell text at `(row, col)`.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Stemmed tokens of the cell at `(row, col)`.
    #[must_use]
    pub fn cell_tokens(&self, row: usize, col: usize) -> Option<&[String]> {
        self.cell_tokens.get(row)?.get(col).map(Vec::as_slice)
    }

    /// All cell tokens flattened in row-major order.
    #[must_use]
    pub fn all_tokens(&self) -> Vec<String> {
        self.cell_tokens
            .iter()
            .flatten()
            .flatten()
            .cloned()
            .collect()
    }
}
