use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tableqa_alignment::AlignmentScorer;
use tableqa_tables::{ScoredTable, Table, TableIndex};

use crate::question::TableQuestion;

/// Everything the optimizer needs to build and solve one model.
#[derive(Debug)]
pub struct AlignmentProblem {
    /// The question being answered.
    pub question: TableQuestion,
    /// Candidate tables chosen by the ranker, best first.
    pub candidates: Vec<ScoredTable>,
    /// Scorer bound to this request.
    pub scorer: AlignmentScorer,
    /// Table collection with its constraint configuration.
    pub index: Arc<TableIndex>,
}

impl AlignmentProblem {
    /// Candidate tables paired with their ranking score.
    pub fn candidate_tables(&self) -> impl Iterator<Item = (&Table, f64)> + '_ {
        self.candidates.iter().filter_map(|candidate| {
            self.index
                .table(candidate.table)
                .map(|table| (table, candidate.score))
        })
    }
}

/// Outcome class reported by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// Feasible but not proven optimal.
    Feasible,
    /// No feasible assignment exists.
    Infeasible,
}

/// The optimizer's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IlpSolution {
    /// Outcome class.
    pub status: SolveStatus,
    /// Index of the selected choice, if any.
    pub best_choice: Option<usize>,
    /// Objective value of the solution.
    pub score: f64,
    /// Structured trace of the active alignments.
    pub trace: Value,
}

impl IlpSolution {
    /// A solution with no feasible assignment.
    #[must_use]
    pub fn infeasible() -> Self {
        Self {
            status: SolveStatus::Infeasible,
            best_choice: None,
            score: 0.0,
            trace: Value::Null,
        }
    }
}

/// External integer-programming engine. Solving blocks; the orchestrator runs
/// it on the blocking pool.
pub trait TableOptimizer: Send + Sync {
    /// Builds and solves the model for `problem`.
    fn solve(&self, problem: &AlignmentProblem) -> Result<IlpSolution>;
}
