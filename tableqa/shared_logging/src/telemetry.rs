use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use tokio::runtime::{Builder, Handle};
use uuid::Uuid;

use crate::{JsonLogger, LogLevel, LogRecord};

/// Builder for telemetry sinks.
pub struct TelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl TelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            min_level: LogLevel::Debug,
            event_publisher: None,
        }
    }

    /// Sets the log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Drops records below `level`.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<Telemetry> {
        let logger = match self.log_path {
            Some(path) => Some(JsonLogger::new(path)?),
            None => None,
        };
        Ok(Telemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
                min_level: self.min_level,
                publisher: self.event_publisher,
            }),
        })
    }
}

/// Cloneable telemetry handle shared across components.
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("module", &self.inner.module)
            .field("min_level", &self.inner.min_level)
            .finish_non_exhaustive()
    }
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
    min_level: LogLevel,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl Telemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> TelemetryBuilder {
        TelemetryBuilder::new(module)
    }

    /// Module name stamped on every record.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Logs structured metadata.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if level < self.inner.min_level {
            return Ok(());
        }
        if let Some(logger) = &self.inner.logger {
            let record = LogRecord::new(&self.inner.module, level, message).with_fields(metadata);
            logger.write(&record)?;
        }
        Ok(())
    }

    /// Emits an event on the bus.
    ///
    /// Inside a tokio runtime the publish is spawned and this returns at once;
    /// outside of one a short-lived current-thread runtime drives it.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        let Some(publisher) = &self.inner.publisher else {
            return Ok(());
        };
        let record = EventRecord {
            id: format!("evt-{}", Uuid::new_v4()),
            source: self.inner.module.clone(),
            event_type: event_type.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            payload,
        };
        if let Ok(handle) = Handle::try_current() {
            let publisher = Arc::clone(publisher);
            handle.spawn(async move {
                if let Err(err) = publisher.publish(record).await {
                    eprintln!("telemetry event publish failed: {err:?}");
                }
            });
            Ok(())
        } else {
            Builder::new_current_thread()
                .build()?
                .block_on(publisher.publish(record))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_event_bus::MemoryEventBus;
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_log_and_event() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("solver.log");
        let bus = Arc::new(MemoryEventBus::new(16));
        let telemetry = Telemetry::builder("solver")
            .log_path(&path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "solver.answer.start", json!({ "choices": 4 }))
            .unwrap();
        telemetry
            .event("solver.answer.completed", json!({ "answers": 4 }))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("solver.answer.start"));
        assert_eq!(bus.snapshot().len(), 1);
    }

    #[test]
    fn records_below_min_level_are_dropped() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("tables.log");
        let telemetry = Telemetry::builder("tables")
            .log_path(&path)
            .min_level(LogLevel::Warn)
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Debug, "tables.rank.start", json!({}))
            .unwrap();
        telemetry
            .log(LogLevel::Warn, "tables.cheat_sheet.bad_index", json!({ "index": 9 }))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("tables.rank.start"));
        assert!(content.contains("tables.cheat_sheet.bad_index"));
    }
}
