use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use crate::{error::TableError, table::Table};

/// Reads every `*.tsv` file under `dir` as a table named after its file stem.
///
/// Files are loaded in file-name order so table positions are stable across runs.
pub fn load_tables_from_dir(dir: impl AsRef<Path>) -> Result<Vec<Table>, TableError> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|source| TableError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| TableError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("tsv") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut tables = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        let file = fs::File::open(&path).map_err(|source| TableError::Io {
            path: path.clone(),
            source,
        })?;
        tables.push(parse_table(name, file)?);
    }
    Ok(tables)
}

/// Parses tab-separated rows into a table. Blank rows are skipped.
pub fn parse_table(name: impl Into<String>, reader: impl Read) -> Result<Table, TableError> {
    let name = name.into();
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|source| TableError::Csv {
            source_name: name.clone(),
            source,
        })?;
        let row: Vec<String> = record.iter().map(|cell| cell.trim().to_string()).collect();
        if row.iter().all(String::is_empty) {
            continue;
        }
        rows.push(row);
    }
    Ok(Table::new(name, rows))
}
