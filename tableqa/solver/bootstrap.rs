use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use shared_logging::{LogLevel, Telemetry};
use tableqa_alignment::{
    AlignmentDependencies, AlignmentFactory, AlignmentStrategy, EntailmentService,
    InMemoryVectorModel, KeyValueCache,
};
use tableqa_tables::{
    load_tables_from_dir, CheatSheetSource, KeywordTokenizer, QuestionTablesCache, SelectionMode,
    TableConstraints, TableIndex, TableRanker, TableRetriever, Tokenizer,
};

use crate::{
    config::SolverConfig, error::ConfigError, fallback::FallbackSolver,
    optimizer::TableOptimizer, orchestrator::TableQaSolver,
};

/// Loads the tables and constraint files named in `config` into an index.
pub fn build_index(
    config: &SolverConfig,
    tokenizer: &dyn Tokenizer,
    telemetry: Option<&Telemetry>,
) -> Result<TableIndex> {
    let tables_dir = &config.tables.dir;
    if !tables_dir.is_dir() {
        return Err(ConfigError::MissingTablesDir(tables_dir.clone()).into());
    }
    let tables = load_tables_from_dir(tables_dir)
        .with_context(|| format!("loading tables from {}", tables_dir.display()))?;
    let index = TableIndex::build(tables, &config.tables.ignore, tokenizer, telemetry)
        .context("building table index")?;
    let constraints = TableConstraints::load(
        &index,
        config.tables.column_alignments.as_deref(),
        config.tables.relations.as_deref(),
        config.tables.relation_patterns.as_deref(),
    )
    .context("loading table constraints")?;
    Ok(index.with_constraints(constraints))
}

/// Ranker for the configured selection mode.
#[must_use]
pub fn build_retriever(
    config: &SolverConfig,
    index: Arc<TableIndex>,
    tokenizer: Arc<dyn Tokenizer>,
    telemetry: Option<Telemetry>,
) -> TableRanker {
    let ranker = match (config.selection, &config.tables.cheat_sheet) {
        (SelectionMode::Cached, Some(path)) => {
            let mut cheat_sheet =
                QuestionTablesCache::new(CheatSheetSource::File(path.clone()), index.len());
            if let Some(tel) = &telemetry {
                cheat_sheet = cheat_sheet.with_telemetry(tel.clone());
            }
            TableRanker::cached(index, tokenizer, Arc::new(cheat_sheet))
        }
        // Config validation rejects cached mode without a cheat sheet; an empty
        // cheat sheet keeps this total.
        (SelectionMode::Cached, None) => TableRanker::cached(
            Arc::clone(&index),
            tokenizer,
            Arc::new(QuestionTablesCache::new(
                CheatSheetSource::Rows(Vec::new()),
                index.len(),
            )),
        ),
        (SelectionMode::Ranked(policy), _) => TableRanker::ranked(index, tokenizer, policy),
    };
    match telemetry {
        Some(tel) => ranker.with_telemetry(tel),
        None => ranker,
    }
}

/// Wires a ready solver from `config` and the external collaborators.
///
/// Fails when tables or auxiliary files cannot be loaded, when the configured
/// strategy lacks its collaborator (entailment service or vectors), or when
/// `use_fallback` is set without a fallback solver.
pub fn build_solver(
    config: &SolverConfig,
    optimizer: Arc<dyn TableOptimizer>,
    fallback: Option<Arc<dyn FallbackSolver>>,
    entailment: Option<Arc<dyn EntailmentService>>,
    cache: Option<Arc<dyn KeyValueCache>>,
) -> Result<TableQaSolver> {
    if config.solver.use_fallback && fallback.is_none() {
        return Err(ConfigError::MissingFallbackSolver.into());
    }
    let telemetry = config.build_telemetry("solver")?;
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(KeywordTokenizer);
    let index = Arc::new(build_index(config, tokenizer.as_ref(), telemetry.as_ref())?);
    let retriever: Arc<dyn TableRetriever> = Arc::new(build_retriever(
        config,
        Arc::clone(&index),
        Arc::clone(&tokenizer),
        telemetry.clone(),
    ));

    let mut deps = AlignmentDependencies::new(Arc::clone(&tokenizer));
    deps.entailment = entailment;
    deps.cache = cache;
    deps.telemetry = telemetry.clone();
    if config.alignment.strategy == AlignmentStrategy::Word2Vec {
        if let Some(path) = &config.vectors {
            let model = InMemoryVectorModel::load(path)
                .with_context(|| format!("loading vectors from {}", path.display()))?;
            deps = deps.with_vectors(Arc::new(model));
        }
    }
    let alignment =
        AlignmentFactory::new(&config.alignment, deps).context("constructing alignment scorer")?;

    let mut solver = TableQaSolver::new(
        Arc::clone(&index),
        retriever,
        tokenizer,
        alignment,
        optimizer,
        config.solver.clone(),
    );
    if let Some(fallback) = fallback {
        solver = solver.with_fallback(fallback);
    }
    if let Some(tel) = telemetry {
        let _ = tel.log(
            LogLevel::Info,
            "solver.bootstrap.ready",
            json!({
                "tables": index.len(),
                "vocabulary": index.vocabulary_size(),
                "strategy": config.alignment.strategy.name(),
                "selection": format!("{:?}", config.selection),
            }),
        );
        solver = solver.with_telemetry(tel);
    }
    Ok(solver)
}
