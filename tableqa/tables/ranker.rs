use std::{cmp::Ordering, collections::HashSet, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::{LogLevel, Telemetry};

use crate::{
    cheat_sheet::QuestionTablesCache, error::TableError, index::TableIndex, tokenizer::Tokenizer,
};

/// Score assigned to cheat-sheet tables.
pub const CACHED_TABLE_SCORE: f64 = 1.0;

/// A table position paired with its relevance score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredTable {
    /// Table position in the index.
    pub table: usize,
    /// Relevance score.
    pub score: f64,
}

/// How ranked mode turns scores into a selection. The two are never combined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RankingPolicy {
    /// Keep the `k` best tables.
    TopK(usize),
    /// Keep every table scoring strictly above the threshold.
    Threshold(f64),
}

/// Selection mode of the ranker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Look the question up in the cheat sheet.
    Cached,
    /// Score every table with TF-IDF.
    Ranked(RankingPolicy),
}

/// Seam through which the answer pipeline retrieves candidate tables.
pub trait TableRetriever: Send + Sync {
    /// Candidate tables for `question`, best first.
    fn rank(&self, question: &str) -> Result<Vec<ScoredTable>, TableError>;
}

enum Strategy {
    Cached(Arc<QuestionTablesCache>),
    Ranked(RankingPolicy),
}

/// Selects tables for a question by cheat-sheet lookup or TF-IDF scoring.
pub struct TableRanker {
    index: Arc<TableIndex>,
    tokenizer: Arc<dyn Tokenizer>,
    strategy: Strategy,
    telemetry: Option<Telemetry>,
}

impl std::fmt::Debug for TableRanker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableRanker")
            .field("tables", &self.index.len())
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl TableRanker {
    /// Ranker scoring every non-ignored table.
    #[must_use]
    pub fn ranked(
        index: Arc<TableIndex>,
        tokenizer: Arc<dyn Tokenizer>,
        policy: RankingPolicy,
    ) -> Self {
        Self {
            index,
            tokenizer,
            strategy: Strategy::Ranked(policy),
            telemetry: None,
        }
    }

    /// Ranker answering from a precomputed cheat sheet.
    #[must_use]
    pub fn cached(
        index: Arc<TableIndex>,
        tokenizer: Arc<dyn Tokenizer>,
        cheat_sheet: Arc<QuestionTablesCache>,
    ) -> Self {
        Self {
            index,
            tokenizer,
            strategy: Strategy::Cached(cheat_sheet),
            telemetry: None,
        }
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Active selection mode.
    #[must_use]
    pub const fn mode(&self) -> SelectionMode {
        match self.strategy {
            Strategy::Cached(_) => SelectionMode::Cached,
            Strategy::Ranked(policy) => SelectionMode::Ranked(policy),
        }
    }

    /// Scores every non-ignored table, in original table order.
    #[must_use]
    pub fn score_all(&self, question: &str) -> Vec<ScoredTable> {
        let question_tokens = self
            .tokenizer
            .stemmed_keyword_tokenize(&question.to_lowercase());
        self.index
            .searchable_indices()
            .into_iter()
            .map(|table| ScoredTable {
                table,
                score: self.score_table(&question_tokens, table),
            })
            .collect()
    }

    /// TF-IDF relevance of one table, scaled by how much of each side the
    /// shared vocabulary covers.
    #[must_use]
    pub fn score_table(&self, question_tokens: &[String], table: usize) -> f64 {
        let table_tokens = self.index.table_tokens(table);
        if question_tokens.is_empty() || table_tokens.is_empty() {
            return 0.0;
        }
        let question_set: HashSet<&str> = question_tokens.iter().map(String::as_str).collect();
        let common: HashSet<&str> = table_tokens
            .iter()
            .map(String::as_str)
            .filter(|token| question_set.contains(token))
            .collect();
        if common.is_empty() {
            return 0.0;
        }
        let tfidf_sum: f64 = common
            .iter()
            .map(|token| {
                let tf = self.index.tf(token, table).unwrap_or(0.0);
                let idf = self.index.idf(token).unwrap_or(0.0);
                tf * idf
            })
            .sum();
        let qa_overlap = covered_fraction(question_tokens, &common);
        let table_overlap = covered_fraction(table_tokens, &common);
        tfidf_sum * qa_overlap * table_overlap
    }

    fn select(&self, question: &str, policy: RankingPolicy) -> Vec<ScoredTable> {
        let mut scored = self.score_all(question);
        // Stable sort: ties (including 0.0 against -0.0) keep original table order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        match policy {
            RankingPolicy::TopK(k) => {
                scored.truncate(k);
                scored
            }
            RankingPolicy::Threshold(threshold) => scored
                .into_iter()
                .filter(|candidate| candidate.score > threshold)
                .collect(),
        }
    }
}

impl TableRetriever for TableRanker {
    fn rank(&self, question: &str) -> Result<Vec<ScoredTable>, TableError> {
        let selection = match &self.strategy {
            Strategy::Cached(cheat_sheet) => cheat_sheet
                .lookup(question)?
                .into_iter()
                .map(|table| ScoredTable {
                    table,
                    score: CACHED_TABLE_SCORE,
                })
                .collect(),
            Strategy::Ranked(policy) => self.select(question, *policy),
        };
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(
                LogLevel::Debug,
                "tables.rank.complete",
                json!({
                    "mode": format!("{:?}", self.mode()),
                    "selected": selection.iter().map(|s| s.table).collect::<Vec<_>>(),
                }),
            );
        }
        Ok(selection)
    }
}

/// Fraction of `tokens` (counted with repetition) that fall in `common`.
fn covered_fraction(tokens: &[String], common: &HashSet<&str>) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let covered = tokens
        .iter()
        .filter(|token| common.contains(token.as_str()))
        .count();
    covered as f64 / tokens.len() as f64
}
