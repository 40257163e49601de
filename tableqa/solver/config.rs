use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use shared_logging::{LogLevel, Telemetry};
use tableqa_alignment::{
    AlignmentSettings, AlignmentStrategy, DEFAULT_ENTAILMENT_OFFSET, DEFAULT_SENTINEL,
};
use tableqa_tables::{RankingPolicy, SelectionMode};

use crate::{error::ConfigError, orchestrator::SolverOptions};

/// Solver configuration loaded from TOML.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Table sources.
    pub tables: TablesSection,
    /// Validated selection mode.
    pub selection: SelectionMode,
    /// Alignment backend settings.
    pub alignment: AlignmentSettings,
    /// Word-vector file for the word2vec strategy.
    pub vectors: Option<PathBuf>,
    /// Orchestrator switches.
    pub solver: SolverOptions,
    /// Logging destination.
    pub telemetry: TelemetrySection,
    source_dir: PathBuf,
}

impl SolverConfig {
    /// Loads and validates a TOML file; relative paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading solver config {}", path.display()))?;
        let source_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_toml_str(&raw, source_dir).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses and validates TOML text, resolving relative paths against `source_dir`.
    pub fn from_toml_str(raw: &str, source_dir: impl Into<PathBuf>) -> Result<Self> {
        let source_dir = source_dir.into();
        let document: SolverConfigSerde = toml::from_str(raw)?;
        let selection = document.selection.validate(document.tables.cheat_sheet.is_some())?;
        let strategy: AlignmentStrategy = document.alignment.strategy.parse()?;
        if let Some(level) = &document.telemetry.min_level {
            LogLevel::parse(level).ok_or_else(|| ConfigError::UnknownLogLevel(level.clone()))?;
        }

        let mut config = Self {
            tables: document.tables,
            selection,
            alignment: AlignmentSettings {
                strategy,
                entailment_offset: document.alignment.entailment_offset,
                sentinel: document.alignment.sentinel,
            },
            vectors: document.alignment.vectors,
            solver: SolverOptions {
                name: document.solver.name,
                use_fallback: document.solver.use_fallback,
                tag_with_fallback_name: document.solver.tag_with_fallback_name,
                infeasible_as_failure: document.solver.infeasible_as_failure,
            },
            telemetry: document.telemetry,
            source_dir,
        };
        config.resolve_relative_paths();
        Ok(config)
    }

    /// Directory relative paths were resolved against.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Telemetry for `module` as configured; `None` without a log path.
    pub fn build_telemetry(&self, module: &str) -> Result<Option<Telemetry>> {
        let Some(log_path) = &self.telemetry.log_path else {
            return Ok(None);
        };
        let mut builder = Telemetry::builder(module).log_path(log_path);
        if let Some(level) = self.telemetry.min_level.as_deref().and_then(LogLevel::parse) {
            builder = builder.min_level(level);
        }
        Ok(Some(builder.build()?))
    }

    fn resolve_relative_paths(&mut self) {
        let resolve = |path: &mut PathBuf, base: &Path| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        let base = self.source_dir.clone();
        resolve(&mut self.tables.dir, &base);
        for path in [
            self.tables.column_alignments.as_mut(),
            self.tables.relations.as_mut(),
            self.tables.relation_patterns.as_mut(),
            self.tables.cheat_sheet.as_mut(),
            self.vectors.as_mut(),
            self.telemetry.log_path.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            resolve(path, &base);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SolverConfigSerde {
    #[serde(default)]
    tables: TablesSection,
    #[serde(default)]
    selection: SelectionSection,
    #[serde(default)]
    alignment: AlignmentSection,
    #[serde(default)]
    solver: SolverSection,
    #[serde(default)]
    telemetry: TelemetrySection,
}

/// Where tables and their auxiliary files live.
#[derive(Debug, Clone, Deserialize)]
pub struct TablesSection {
    /// Directory of `.tsv` tables.
    #[serde(default = "default_tables_dir")]
    pub dir: PathBuf,
    /// Tables loaded but never ranked.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Allowed column alignments CSV.
    #[serde(default)]
    pub column_alignments: Option<PathBuf>,
    /// Inter-column relations CSV.
    #[serde(default)]
    pub relations: Option<PathBuf>,
    /// Relation patterns CSV.
    #[serde(default)]
    pub relation_patterns: Option<PathBuf>,
    /// Question-to-tables cheat sheet CSV.
    #[serde(default)]
    pub cheat_sheet: Option<PathBuf>,
}

impl Default for TablesSection {
    fn default() -> Self {
        Self {
            dir: default_tables_dir(),
            ignore: Vec::new(),
            column_alignments: None,
            relations: None,
            relation_patterns: None,
            cheat_sheet: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SelectionSection {
    #[serde(default = "default_selection_mode")]
    mode: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    threshold: Option<f64>,
}

impl SelectionSection {
    fn validate(&self, has_cheat_sheet: bool) -> Result<SelectionMode, ConfigError> {
        match self.mode.trim().to_ascii_lowercase().as_str() {
            "cached" if has_cheat_sheet => Ok(SelectionMode::Cached),
            "cached" => Err(ConfigError::MissingCheatSheet),
            "ranked" | "" => match (self.top_k, self.threshold) {
                (Some(_), Some(_)) => Err(ConfigError::ConflictingRankingPolicies),
                (None, None) => Err(ConfigError::MissingRankingPolicy),
                (Some(0), None) => Err(ConfigError::ZeroTopK),
                (Some(k), None) => Ok(SelectionMode::Ranked(RankingPolicy::TopK(k))),
                (None, Some(t)) if !t.is_finite() => Err(ConfigError::InvalidThreshold(t)),
                (None, Some(t)) => Ok(SelectionMode::Ranked(RankingPolicy::Threshold(t))),
            },
            other => Err(ConfigError::UnknownSelectionMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AlignmentSection {
    #[serde(default = "default_strategy")]
    strategy: String,
    #[serde(default = "default_entailment_offset")]
    entailment_offset: f64,
    #[serde(default)]
    vectors: Option<PathBuf>,
    #[serde(default = "default_sentinel")]
    sentinel: String,
}

impl Default for AlignmentSection {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            entailment_offset: default_entailment_offset(),
            vectors: None,
            sentinel: default_sentinel(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SolverSection {
    #[serde(default = "default_solver_name")]
    name: String,
    #[serde(default)]
    use_fallback: bool,
    #[serde(default = "default_true")]
    tag_with_fallback_name: bool,
    #[serde(default = "default_true")]
    infeasible_as_failure: bool,
}

impl Default for SolverSection {
    fn default() -> Self {
        let options = SolverOptions::default();
        Self {
            name: options.name,
            use_fallback: options.use_fallback,
            tag_with_fallback_name: options.tag_with_fallback_name,
            infeasible_as_failure: options.infeasible_as_failure,
        }
    }
}

/// Structured log destination.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetrySection {
    /// JSON-lines log file; logging is off without one.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Minimum level written (`debug`, `info`, `warn`, `error`).
    #[serde(default)]
    pub min_level: Option<String>,
}

fn default_tables_dir() -> PathBuf {
    PathBuf::from("tables")
}

fn default_selection_mode() -> String {
    "ranked".into()
}

fn default_strategy() -> String {
    AlignmentStrategy::Entailment.name().into()
}

const fn default_entailment_offset() -> f64 {
    DEFAULT_ENTAILMENT_OFFSET
}

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.into()
}

fn default_solver_name() -> String {
    SolverOptions::default().name
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tableqa_alignment::AlignmentError;

    #[test]
    fn defaults_and_relative_paths() {
        let config = SolverConfig::from_toml_str(
            r#"
            [tables]
            dir = "data/tables"
            relations = "/etc/tableqa/relations.csv"

            [selection]
            top_k = 3

            [alignment]
            strategy = "word-overlap"

            [telemetry]
            log_path = "logs/solver.jsonl"
            "#,
            "/srv/tqa",
        )
        .unwrap();
        assert_eq!(config.source_dir(), Path::new("/srv/tqa"));
        assert_eq!(config.tables.dir, PathBuf::from("/srv/tqa/data/tables"));
        assert_eq!(
            config.tables.relations,
            Some(PathBuf::from("/etc/tableqa/relations.csv"))
        );
        assert_eq!(config.selection, SelectionMode::Ranked(RankingPolicy::TopK(3)));
        assert_eq!(config.alignment.strategy, AlignmentStrategy::WordOverlap);
        assert!((config.alignment.entailment_offset - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.alignment.sentinel, "</s>");
        assert_eq!(config.solver, SolverOptions::default());
        assert_eq!(
            config.telemetry.log_path,
            Some(PathBuf::from("/srv/tqa/logs/solver.jsonl"))
        );
    }

    #[test]
    fn ranking_policies_are_mutually_exclusive() {
        let both = SolverConfig::from_toml_str("[selection]\ntop_k = 2\nthreshold = 0.1\n", ".")
            .unwrap_err();
        assert!(matches!(
            both.downcast_ref::<ConfigError>(),
            Some(ConfigError::ConflictingRankingPolicies)
        ));
        let neither = SolverConfig::from_toml_str("[selection]\nmode = \"ranked\"\n", ".").unwrap_err();
        assert!(matches!(
            neither.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingRankingPolicy)
        ));
        let threshold =
            SolverConfig::from_toml_str("[selection]\nthreshold = 0.05\n", ".").unwrap();
        assert_eq!(
            threshold.selection,
            SelectionMode::Ranked(RankingPolicy::Threshold(0.05))
        );
    }

    #[test]
    fn cached_mode_needs_a_cheat_sheet() {
        let err = SolverConfig::from_toml_str("[selection]\nmode = \"cached\"\n", ".").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingCheatSheet)
        ));
        let config = SolverConfig::from_toml_str(
            "[tables]\ncheat_sheet = \"cheat.csv\"\n[selection]\nmode = \"cached\"\n",
            "/data",
        )
        .unwrap();
        assert_eq!(config.selection, SelectionMode::Cached);
        assert_eq!(config.tables.cheat_sheet, Some(PathBuf::from("/data/cheat.csv")));
    }

    #[test]
    fn unknown_strategy_is_fatal() {
        let err = SolverConfig::from_toml_str(
            "[selection]\ntop_k = 1\n[alignment]\nstrategy = \"lucene\"\n",
            ".",
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AlignmentError>(),
            Some(AlignmentError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn solver_switches_are_read() {
        let config = SolverConfig::from_toml_str(
            "[selection]\ntop_k = 1\n[solver]\nname = \"Tables\"\nuse_fallback = true\ntag_with_fallback_name = false\n",
            ".",
        )
        .unwrap();
        assert_eq!(config.solver.name, "Tables");
        assert!(config.solver.use_fallback);
        assert!(!config.solver.tag_with_fallback_name);
        assert!(config.solver.infeasible_as_failure);
    }
}
