use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{error::TableError, index::TableIndex};

/// Two table columns the optimizer may align with each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedColumnAlignment {
    /// First table name.
    pub table1: String,
    /// Position of the first table.
    pub table1_index: usize,
    /// Column in the first table.
    pub col1: usize,
    /// Second table name.
    pub table2: String,
    /// Position of the second table.
    pub table2_index: usize,
    /// Column in the second table.
    pub col2: usize,
}

/// Named relation holding between two columns of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterColumnRelation {
    /// Table name.
    pub table: String,
    /// Table position.
    pub table_index: usize,
    /// Source column.
    pub col1: usize,
    /// Target column.
    pub col2: usize,
    /// Relation name, e.g. `has-part`.
    pub relation: String,
}

/// Surface pattern expressing a relation in question text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationPattern {
    /// Relation name declared by an [`InterColumnRelation`].
    pub relation: String,
    /// Text pattern, e.g. `is part of`.
    pub pattern: String,
    /// Whether the pattern reads target-to-source.
    pub flipped: bool,
}

/// Validated alignment and relation configuration for a table collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableConstraints {
    alignments: Vec<AllowedColumnAlignment>,
    relations: Vec<InterColumnRelation>,
    patterns: Vec<RelationPattern>,
}

impl TableConstraints {
    /// Parses the three configuration texts against `index`. Absent texts yield empty lists.
    pub fn parse(
        index: &TableIndex,
        alignments: Option<&str>,
        relations: Option<&str>,
        patterns: Option<&str>,
    ) -> Result<Self, TableError> {
        let alignments = match alignments {
            Some(text) => parse_column_alignments(text, "column_alignments", index)?,
            None => Vec::new(),
        };
        let relations = match relations {
            Some(text) => parse_relations(text, "relations", index)?,
            None => Vec::new(),
        };
        let patterns = match patterns {
            Some(text) => parse_relation_patterns(text, "relation_patterns", &relations)?,
            None => Vec::new(),
        };
        Ok(Self {
            alignments,
            relations,
            patterns,
        })
    }

    /// Reads and parses the configuration files that are provided.
    pub fn load(
        index: &TableIndex,
        alignments: Option<&Path>,
        relations: Option<&Path>,
        patterns: Option<&Path>,
    ) -> Result<Self, TableError> {
        let alignments = match alignments {
            Some(path) => {
                parse_column_alignments(&read(path)?, &path.display().to_string(), index)?
            }
            None => Vec::new(),
        };
        let relations = match relations {
            Some(path) => parse_relations(&read(path)?, &path.display().to_string(), index)?,
            None => Vec::new(),
        };
        let patterns = match patterns {
            Some(path) => parse_relation_patterns(
                &read(path)?,
                &path.display().to_string(),
                &relations,
            )?,
            None => Vec::new(),
        };
        Ok(Self {
            alignments,
            relations,
            patterns,
        })
    }

    /// Every allowed column alignment.
    #[must_use]
    pub fn alignments(&self) -> &[AllowedColumnAlignment] {
        &self.alignments
    }

    /// Every inter-column relation.
    #[must_use]
    pub fn relations(&self) -> &[InterColumnRelation] {
        &self.relations
    }

    /// Every relation pattern.
    #[must_use]
    pub fn patterns(&self) -> &[RelationPattern] {
        &self.patterns
    }

    /// Alignments from table `from` to table `to`.
    pub fn alignments_between(
        &self,
        from: usize,
        to: usize,
    ) -> impl Iterator<Item = &AllowedColumnAlignment> + '_ {
        self.alignments
            .iter()
            .filter(move |a| a.table1_index == from && a.table2_index == to)
    }

    /// Relations declared for `table`.
    pub fn relations_for(&self, table: usize) -> impl Iterator<Item = &InterColumnRelation> + '_ {
        self.relations.iter().filter(move |r| r.table_index == table)
    }

    /// Patterns expressing `relation`.
    pub fn patterns_for<'a>(
        &'a self,
        relation: &'a str,
    ) -> impl Iterator<Item = &'a RelationPattern> + 'a {
        self.patterns.iter().filter(move |p| p.relation == relation)
    }
}

fn read(path: &Path) -> Result<String, TableError> {
    fs::read_to_string(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses `table1, col1, table2, col2` rows.
pub fn parse_column_alignments(
    text: &str,
    source_name: &str,
    index: &TableIndex,
) -> Result<Vec<AllowedColumnAlignment>, TableError> {
    let mut out = Vec::new();
    for row in config_rows(text, source_name, 4)? {
        let (table1_index, col1) = row.table_column(index, 0, 1)?;
        let (table2_index, col2) = row.table_column(index, 2, 3)?;
        out.push(AllowedColumnAlignment {
            table1: row.cells[0].clone(),
            table1_index,
            col1,
            table2: row.cells[2].clone(),
            table2_index,
            col2,
        });
    }
    Ok(out)
}

/// Parses `table, col1, col2, relation` rows.
pub fn parse_relations(
    text: &str,
    source_name: &str,
    index: &TableIndex,
) -> Result<Vec<InterColumnRelation>, TableError> {
    let mut out = Vec::new();
    for row in config_rows(text, source_name, 4)? {
        let (table_index, col1) = row.table_column(index, 0, 1)?;
        let (_, col2) = row.table_column(index, 0, 2)?;
        out.push(InterColumnRelation {
            table: row.cells[0].clone(),
            table_index,
            col1,
            col2,
            relation: row.cells[3].clone(),
        });
    }
    Ok(out)
}

/// Parses `relation, pattern, flipped` rows; relations must already be declared.
pub fn parse_relation_patterns(
    text: &str,
    source_name: &str,
    relations: &[InterColumnRelation],
) -> Result<Vec<RelationPattern>, TableError> {
    let mut out = Vec::new();
    for row in config_rows(text, source_name, 3)? {
        let relation = row.cells[0].clone();
        if !relations.iter().any(|r| r.relation == relation) {
            return Err(TableError::UnknownRelation {
                source_name: source_name.to_string(),
                line: row.line,
                relation,
            });
        }
        let flipped = match row.cells[2].to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            other => return Err(row.malformed(format!("expected true/false, found `{other}`"))),
        };
        out.push(RelationPattern {
            relation,
            pattern: row.cells[1].clone(),
            flipped,
        });
    }
    Ok(out)
}

struct ConfigRow<'a> {
    source_name: &'a str,
    line: usize,
    cells: Vec<String>,
}

impl ConfigRow<'_> {
    fn malformed(&self, reason: String) -> TableError {
        TableError::MalformedRow {
            source_name: self.source_name.to_string(),
            line: self.line,
            reason,
        }
    }

    fn table_column(
        &self,
        index: &TableIndex,
        table_cell: usize,
        column_cell: usize,
    ) -> Result<(usize, usize), TableError> {
        let name = &self.cells[table_cell];
        let position = index
            .table_index(name)
            .ok_or_else(|| TableError::UnknownTable {
                source_name: self.source_name.to_string(),
                line: self.line,
                table: name.clone(),
            })?;
        let raw = &self.cells[column_cell];
        let column: usize = raw
            .parse()
            .map_err(|_| self.malformed(format!("column index `{raw}` is not a number")))?;
        let columns = index.table(position).map_or(0, |t| t.column_count());
        if column >= columns {
            return Err(TableError::ColumnOutOfRange {
                source_name: self.source_name.to_string(),
                line: self.line,
                table: name.clone(),
                column,
                columns,
            });
        }
        Ok((position, column))
    }
}

/// Splits configuration text into trimmed rows of exactly `width` cells,
/// skipping `//` comments and blank lines.
fn config_rows<'a>(
    text: &str,
    source_name: &'a str,
    width: usize,
) -> Result<Vec<ConfigRow<'a>>, TableError> {
    let mut rows = Vec::new();
    for (offset, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(trimmed.as_bytes());
        let Some(record) = reader.records().next() else {
            continue;
        };
        let record = record.map_err(|source| TableError::Csv {
            source_name: source_name.to_string(),
            source,
        })?;
        let row = ConfigRow {
            source_name,
            line: offset + 1,
            cells: record.iter().map(str::to_string).collect(),
        };
        if row.cells.len() != width {
            return Err(row.malformed(format!(
                "expected {width} columns, found {}",
                row.cells.len()
            )));
        }
        rows.push(row);
    }
    Ok(rows)
}
