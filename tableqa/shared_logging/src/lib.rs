#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! JSON-lines logging for the table QA crates.
//!
//! Every component writes [`LogRecord`]s through a [`Telemetry`] handle; the
//! file format is one serialized record per line so logs can be replayed with
//! [`read_log`].

use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Telemetry handle combining the logger with an optional event publisher.
pub mod telemetry;

pub use telemetry::{Telemetry, TelemetryBuilder};

/// Severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Diagnostics.
    Debug,
    /// Normal operation.
    Info,
    /// Recoverable anomaly, e.g. a skipped malformed row.
    Warn,
    /// Failure.
    Error,
}

impl LogLevel {
    /// Parses a case-insensitive level name; `warning` is accepted for `warn`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Upper-case label used in serialized records.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One line of a JSON-lines log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// UTC time the record was created.
    pub timestamp: DateTime<Utc>,
    /// Component that emitted it (`tables`, `alignment`, `solver`, ...).
    pub module: String,
    /// Severity.
    pub level: LogLevel,
    /// Dotted event name, e.g. `tables.rank.complete`.
    pub message: String,
    /// Structured fields; omitted from the line when empty.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl LogRecord {
    /// Record stamped with the current time and no fields.
    #[must_use]
    pub fn new(module: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            module: module.into(),
            level,
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Takes the fields of a JSON object; any other value is kept under `value`.
    #[must_use]
    pub fn with_fields(mut self, fields: Value) -> Self {
        match fields {
            Value::Object(map) => self.fields = map,
            Value::Null => {}
            other => {
                self.fields.insert("value".into(), other);
            }
        }
        self
    }

    /// Field lookup.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Append-only JSON-lines file writer shared between threads.
#[derive(Debug)]
pub struct JsonLogger {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLogger {
    /// Opens `path` for appending, creating it and its parent directories.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Appends `record` and flushes, so readers always see whole lines.
    pub fn write(&self, record: &LogRecord) -> Result<()> {
        let line = serde_json::to_vec(record)?;
        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// File being written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads back every record of a JSON-lines log; blank lines are skipped.
pub fn read_log(path: impl AsRef<Path>) -> Result<Vec<LogRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("opening log file {}", path.display()))?,
    );
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed log line", path.display(), line_no + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn records_round_trip_through_the_file() {
        let dir = tempdir().unwrap();
        let logger = JsonLogger::new(dir.path().join("nested/tables.jsonl")).unwrap();
        logger
            .write(
                &LogRecord::new("tables", LogLevel::Info, "tables.index.built")
                    .with_fields(json!({ "tables": 3 })),
            )
            .unwrap();
        logger
            .write(&LogRecord::new("tables", LogLevel::Warn, "tables.loader.skipped"))
            .unwrap();

        let raw = fs::read_to_string(logger.path()).unwrap();
        assert!(raw.contains("\"level\":\"INFO\""));
        assert!(!raw.lines().nth(1).unwrap().contains("fields"));

        let records = read_log(logger.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "tables.index.built");
        assert_eq!(records[0].field("tables"), Some(&json!(3)));
        assert_eq!(records[1].level, LogLevel::Warn);
    }

    #[test]
    fn scalar_fields_are_wrapped() {
        let record = LogRecord::new("solver", LogLevel::Debug, "solver.tick").with_fields(json!(7));
        assert_eq!(record.field("value"), Some(&json!(7)));
        let empty = LogRecord::new("solver", LogLevel::Debug, "solver.tick").with_fields(Value::Null);
        assert!(empty.fields.is_empty());
    }

    #[test]
    fn levels_are_ordered_and_parsed() {
        assert!(LogLevel::Debug < LogLevel::Warn);
        assert_eq!(LogLevel::parse(" Warning "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::Error.to_string(), "ERROR");
    }
}
