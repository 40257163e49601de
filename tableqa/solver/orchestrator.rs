//! Question-to-answer pipeline: guard, retrieve, delegate, extract, fallback.

use std::{fmt, sync::Arc};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::{LogLevel, Telemetry};
use tableqa_alignment::AlignmentFactory;
use tableqa_tables::{ScoredTable, TableIndex, TableRetriever, Tokenizer};

use crate::{
    answer::{sort_answers, SelectedAnswer, FALLBACK_FEATURE},
    fallback::{FallbackSolver, SolverRequest},
    optimizer::{AlignmentProblem, IlpSolution, SolveStatus, TableOptimizer},
    question::{AnswerChoice, Question, QuestionFormat, TableQuestion},
};

/// Default solver identity.
pub const DEFAULT_SOLVER_NAME: &str = "TableILP";

/// Behavioural switches of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Identity stamped on primary answers.
    pub name: String,
    /// Consult the fallback solver when the primary path yields nothing.
    pub use_fallback: bool,
    /// Credit fallback answers to the fallback (true) or to this solver (false).
    pub tag_with_fallback_name: bool,
    /// Treat an infeasible model as "no answer".
    pub infeasible_as_failure: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_SOLVER_NAME.to_string(),
            use_fallback: false,
            tag_with_fallback_name: true,
            infeasible_as_failure: true,
        }
    }
}

/// Answers multiple-choice questions from tables.
///
/// All collaborators are shared read-only, so one solver can serve
/// concurrent requests; each request gets its own scorer.
pub struct TableQaSolver {
    index: Arc<TableIndex>,
    retriever: Arc<dyn TableRetriever>,
    tokenizer: Arc<dyn Tokenizer>,
    alignment: AlignmentFactory,
    optimizer: Arc<dyn TableOptimizer>,
    fallback: Option<Arc<dyn FallbackSolver>>,
    options: SolverOptions,
    telemetry: Option<Telemetry>,
}

impl fmt::Debug for TableQaSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableQaSolver")
            .field("tables", &self.index.len())
            .field("alignment", &self.alignment.strategy())
            .field("fallback", &self.fallback.as_ref().map(|fb| fb.name().to_string()))
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TableQaSolver {
    /// Creates a solver without a fallback.
    #[must_use]
    pub fn new(
        index: Arc<TableIndex>,
        retriever: Arc<dyn TableRetriever>,
        tokenizer: Arc<dyn Tokenizer>,
        alignment: AlignmentFactory,
        optimizer: Arc<dyn TableOptimizer>,
        options: SolverOptions,
    ) -> Self {
        Self {
            index,
            retriever,
            tokenizer,
            alignment,
            optimizer,
            fallback: None,
            options,
            telemetry: None,
        }
    }

    /// Registers the fallback solver.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackSolver>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Active options.
    #[must_use]
    pub const fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Answers `question`.
    ///
    /// Returns an empty set for non-multiple-choice or blank questions, and
    /// when neither the primary path nor the fallback produced anything.
    /// Ranking and optimizer failures are errors and never reach the fallback.
    pub async fn answer(&self, question: &Question) -> Result<Vec<SelectedAnswer>> {
        let choices = match &question.format {
            QuestionFormat::MultipleChoice(choices) if !question.text.trim().is_empty() => choices,
            _ => {
                self.log(
                    LogLevel::Info,
                    "solver.answer.guarded",
                    json!({ "multiple_choice": question.choices().is_some() }),
                );
                return Ok(Vec::new());
            }
        };

        let candidates = self.rank(&question.text).await?;
        self.log(
            LogLevel::Debug,
            "solver.tables.selected",
            json!({ "candidates": candidates.iter().map(|c| c.table).collect::<Vec<_>>() }),
        );

        let answers = if candidates.is_empty() {
            Vec::new()
        } else {
            let solution = self.solve(&question.text, choices, candidates).await?;
            self.extract(&solution, choices)
        };

        if answers.is_empty() {
            if let Some(fallback) = self.fallback.as_ref().filter(|_| self.options.use_fallback) {
                return self.delegate(fallback.as_ref(), question, choices).await;
            }
        }

        self.log(
            LogLevel::Info,
            "solver.answer.completed",
            json!({ "answers": answers.len(), "solver": self.options.name }),
        );
        if let Some(tel) = &self.telemetry {
            let _ = tel.event(
                "solver.answer.completed",
                json!({
                    "best": answers.first().map(|a| a.choice_index),
                    "score": answers.first().map(|a| a.score),
                }),
            );
        }
        Ok(answers)
    }

    /// Ranking scores every table and may read the cheat sheet from disk, so
    /// it runs on the blocking pool like the optimizer.
    async fn rank(&self, text: &str) -> Result<Vec<ScoredTable>> {
        let retriever = Arc::clone(&self.retriever);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || retriever.rank(&text))
            .await
            .context("table ranking task did not complete")?
            .context("ranking tables for question")
    }

    async fn solve(
        &self,
        text: &str,
        choices: &[AnswerChoice],
        candidates: Vec<ScoredTable>,
    ) -> Result<IlpSolution> {
        let problem = AlignmentProblem {
            question: TableQuestion::new(text, choices.to_vec(), self.tokenizer.as_ref()),
            candidates,
            scorer: self.alignment.build(),
            index: Arc::clone(&self.index),
        };
        let optimizer = Arc::clone(&self.optimizer);
        let solution = tokio::task::spawn_blocking(move || optimizer.solve(&problem))
            .await
            .context("optimizer task did not complete")?
            .context("optimizer failed")?;
        self.log(
            LogLevel::Debug,
            "solver.optimizer.solved",
            json!({
                "status": solution.status,
                "best_choice": solution.best_choice,
                "score": solution.score,
            }),
        );
        Ok(solution)
    }

    /// Best choice with full score and trace, then score-0 placeholders for
    /// every other choice, ordered by score.
    fn extract(&self, solution: &IlpSolution, choices: &[AnswerChoice]) -> Vec<SelectedAnswer> {
        if solution.status == SolveStatus::Infeasible && self.options.infeasible_as_failure {
            return Vec::new();
        }
        let Some(best) = solution.best_choice else {
            return Vec::new();
        };
        let Some(best_choice) = choices.get(best) else {
            self.log(
                LogLevel::Warn,
                "solver.optimizer.bad_choice",
                json!({ "best_choice": best, "choices": choices.len() }),
            );
            return Vec::new();
        };

        let primary = SelectedAnswer {
            choice_index: best,
            choice: best_choice.clone(),
            score: solution.score,
            analysis: Some(solution.trace.clone()),
            features: indexmap::IndexMap::new(),
            solver: self.options.name.clone(),
        };
        let mut answers: Vec<SelectedAnswer> = std::iter::once(primary)
            .chain(
                choices
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| *index != best)
                    .map(|(index, choice)| {
                        SelectedAnswer::placeholder(index, choice.clone(), &self.options.name)
                    }),
            )
            .map(|answer| answer.with_feature(FALLBACK_FEATURE, 0.0))
            .collect();
        sort_answers(&mut answers);
        answers
    }

    async fn delegate(
        &self,
        fallback: &dyn FallbackSolver,
        question: &Question,
        choices: &[AnswerChoice],
    ) -> Result<Vec<SelectedAnswer>> {
        let request = SolverRequest::new(question.clone());
        let request_id = request.id.clone();
        let response = fallback
            .solve(request)
            .await
            .with_context(|| format!("fallback solver {} failed", fallback.name()))?;
        let credited = if self.options.tag_with_fallback_name {
            response.solver.clone()
        } else {
            self.options.name.clone()
        };
        let mut answers: Vec<SelectedAnswer> = response
            .answers
            .into_iter()
            .filter_map(|answer| {
                let Some(choice) = choices.get(answer.choice) else {
                    self.log(
                        LogLevel::Warn,
                        "solver.fallback.bad_choice",
                        json!({ "choice": answer.choice, "choices": choices.len() }),
                    );
                    return None;
                };
                Some(
                    SelectedAnswer {
                        choice_index: answer.choice,
                        choice: choice.clone(),
                        score: answer.confidence,
                        analysis: answer.analysis,
                        features: indexmap::IndexMap::new(),
                        solver: credited.clone(),
                    }
                    .with_feature(FALLBACK_FEATURE, 1.0),
                )
            })
            .collect();
        sort_answers(&mut answers);

        self.log(
            LogLevel::Info,
            "solver.answer.fallback",
            json!({
                "request": request_id,
                "fallback": response.solver,
                "credited": credited,
                "answers": answers.len(),
            }),
        );
        if let Some(tel) = &self.telemetry {
            let _ = tel.event(
                "solver.answer.fallback",
                json!({ "request": request_id, "credited": credited }),
            );
        }
        Ok(answers)
    }

    fn log(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(level, message, metadata);
        }
    }
}
