use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use shared_logging::{LogLevel, Telemetry};
use tableqa_alignment::{
    AlignmentDependencies, AlignmentFactory, AlignmentOperation, AlignmentSettings,
    AlignmentStrategy, InMemoryVectorModel,
};
use tableqa_solver::{build_index, build_retriever, SolverConfig};
use tableqa_tables::{KeywordTokenizer, TableRetriever, Tokenizer};

#[derive(Parser, Debug)]
#[command(name = "tqa", version, about = "Table retrieval and alignment diagnostics")]
struct Cli {
    /// Append structured logs to this file.
    #[arg(long, global = true)]
    log_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarises the table collection named in a solver config.
    Stats {
        #[arg(long)]
        config: PathBuf,
    },
    /// Ranks tables for a question with the configured selection mode.
    Rank {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        question: String,
    },
    /// Scores a premise/hypothesis pair with every alignment operation.
    Align {
        #[arg(long, default_value = "word-overlap")]
        strategy: String,
        #[arg(long)]
        premise: String,
        #[arg(long)]
        hypothesis: String,
        /// word2vec text file, required by the word2vec strategy.
        #[arg(long)]
        vectors: Option<PathBuf>,
        #[arg(long, default_value = "</s>")]
        sentinel: String,
    },
}

#[derive(Debug, Serialize)]
struct RankedTable {
    table: usize,
    name: String,
    score: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let telemetry = match &cli.log_path {
        Some(path) => Some(
            Telemetry::builder("tqa")
                .log_path(path)
                .build()
                .with_context(|| format!("opening log {}", path.display()))?,
        ),
        None => None,
    };
    match cli.command {
        Commands::Stats { config } => handle_stats(&config, telemetry.as_ref()),
        Commands::Rank { config, question } => handle_rank(&config, &question, telemetry),
        Commands::Align {
            strategy,
            premise,
            hypothesis,
            vectors,
            sentinel,
        } => handle_align(&strategy, &premise, &hypothesis, vectors, sentinel, telemetry),
    }
}

fn handle_stats(config_path: &Path, telemetry: Option<&Telemetry>) -> Result<()> {
    let config = SolverConfig::load(config_path)?;
    let index = build_index(&config, &KeywordTokenizer, telemetry)?;
    println!("tables        {}", index.len());
    println!("searchable    {}", index.searchable_indices().len());
    println!("vocabulary    {}", index.vocabulary_size());
    println!("ignored       {:?}", index.ignored_names());
    println!("alignments    {}", index.constraints().alignments().len());
    println!("relations     {}", index.constraints().relations().len());
    println!("patterns      {}", index.constraints().patterns().len());
    println!("selection     {:?}", config.selection);
    Ok(())
}

fn handle_rank(config_path: &Path, question: &str, telemetry: Option<Telemetry>) -> Result<()> {
    let config = SolverConfig::load(config_path)?;
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(KeywordTokenizer);
    let index = Arc::new(build_index(&config, tokenizer.as_ref(), telemetry.as_ref())?);
    let ranker = build_retriever(&config, Arc::clone(&index), tokenizer, telemetry);
    let ranked: Vec<RankedTable> = ranker
        .rank(question)
        .context("ranking tables")?
        .into_iter()
        .map(|scored| RankedTable {
            table: scored.table,
            name: index
                .table(scored.table)
                .map(|table| table.name().to_string())
                .unwrap_or_default(),
            score: scored.score,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&ranked)?);
    Ok(())
}

fn handle_align(
    strategy: &str,
    premise: &str,
    hypothesis: &str,
    vectors: Option<PathBuf>,
    sentinel: String,
    telemetry: Option<Telemetry>,
) -> Result<()> {
    let strategy: AlignmentStrategy = strategy.parse()?;
    let mut deps = AlignmentDependencies::new(Arc::new(KeywordTokenizer));
    if let Some(path) = vectors {
        let model = InMemoryVectorModel::load(&path)
            .with_context(|| format!("loading vectors from {}", path.display()))?;
        deps = deps.with_vectors(Arc::new(model));
    }
    if let Some(tel) = &telemetry {
        deps = deps.with_telemetry(tel.clone());
    }
    let settings = AlignmentSettings {
        sentinel,
        ..AlignmentSettings::new(strategy)
    };
    let scorer = AlignmentFactory::new(&settings, deps)?.build();
    let scores: serde_json::Map<String, serde_json::Value> = AlignmentOperation::ALL
        .into_iter()
        .map(|operation| {
            (
                operation.name().to_string(),
                json!(scorer.score(operation, premise, hypothesis)),
            )
        })
        .collect();
    if let Some(tel) = &telemetry {
        let _ = tel.log(
            LogLevel::Info,
            "tqa.align.scored",
            json!({ "strategy": strategy.name(), "premise": premise, "hypothesis": hypothesis }),
        );
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "strategy": strategy.name(),
            "premise": premise,
            "hypothesis": hypothesis,
            "scores": scores,
        }))?
    );
    Ok(())
}
