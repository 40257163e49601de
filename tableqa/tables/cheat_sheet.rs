use std::{
    collections::HashMap,
    fs::File,
    path::{Path, PathBuf},
};

use once_cell::sync::OnceCell;
use serde_json::json;
use shared_logging::{LogLevel, Telemetry};

use crate::error::TableError;

/// Where cheat-sheet rows come from.
#[derive(Debug, Clone)]
pub enum CheatSheetSource {
    /// Rows already in memory: question text and table positions.
    Rows(Vec<(String, Vec<usize>)>),
    /// CSV file of `question, table[, table...]` rows.
    File(PathBuf),
}

/// Precomputed mapping from trimmed question text to relevant table positions.
///
/// The map is built on first lookup and immutable afterwards.
#[derive(Debug)]
pub struct QuestionTablesCache {
    source: CheatSheetSource,
    table_count: usize,
    entries: OnceCell<HashMap<String, Vec<usize>>>,
    telemetry: Option<Telemetry>,
}

impl QuestionTablesCache {
    /// Creates a lazily built cache; positions `>= table_count` are dropped.
    #[must_use]
    pub fn new(source: CheatSheetSource, table_count: usize) -> Self {
        Self {
            source,
            table_count,
            entries: OnceCell::new(),
            telemetry: None,
        }
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Tables stored for `question`, in stored order; empty when there is no entry.
    pub fn lookup(&self, question: &str) -> Result<Vec<usize>, TableError> {
        let entries = self.entries.get_or_try_init(|| self.load())?;
        Ok(entries.get(question.trim()).cloned().unwrap_or_default())
    }

    /// Number of questions in the cache (forces the build).
    pub fn len(&self) -> Result<usize, TableError> {
        Ok(self.entries.get_or_try_init(|| self.load())?.len())
    }

    /// Whether the map has been built yet.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.entries.get().is_some()
    }

    fn load(&self) -> Result<HashMap<String, Vec<usize>>, TableError> {
        let rows = match &self.source {
            CheatSheetSource::Rows(rows) => rows.clone(),
            CheatSheetSource::File(path) => read_rows(path)?,
        };
        let mut entries = HashMap::with_capacity(rows.len());
        for (question, tables) in rows {
            let mut kept = Vec::with_capacity(tables.len());
            for table in tables {
                if table < self.table_count {
                    kept.push(table);
                } else if let Some(tel) = &self.telemetry {
                    let _ = tel.log(
                        LogLevel::Warn,
                        "tables.cheat_sheet.bad_index",
                        json!({ "question": question, "table": table }),
                    );
                }
            }
            entries.insert(question.trim().to_string(), kept);
        }
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(
                LogLevel::Info,
                "tables.cheat_sheet.built",
                json!({ "questions": entries.len() }),
            );
        }
        Ok(entries)
    }
}

fn read_rows(path: &Path) -> Result<Vec<(String, Vec<usize>)>, TableError> {
    let source_name = path.display().to_string();
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    let mut rows = Vec::new();
    for (offset, record) in reader.records().enumerate() {
        let record = record.map_err(|source| TableError::Csv {
            source_name: source_name.clone(),
            source,
        })?;
        let mut cells = record.iter();
        let Some(question) = cells.next().filter(|q| !q.is_empty()) else {
            continue;
        };
        let tables = cells
            .filter(|cell| !cell.is_empty())
            .map(|cell| {
                cell.parse::<usize>().map_err(|_| TableError::MalformedRow {
                    source_name: source_name.clone(),
                    line: offset + 1,
                    reason: format!("table index `{cell}` is not a number"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push((question.to_string(), tables));
    }
    Ok(rows)
}
