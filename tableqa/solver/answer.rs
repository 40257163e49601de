use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::question::AnswerChoice;

/// Feature recording whether the fallback solver produced the answer.
pub const FALLBACK_FEATURE: &str = "fallback_solver_used";

/// One scored choice in the solver's answer set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedAnswer {
    /// Position of the choice in the question.
    pub choice_index: usize,
    /// The choice itself.
    pub choice: AnswerChoice,
    /// Score; 0 for placeholders.
    pub score: f64,
    /// Structured analysis from whichever solver produced the answer.
    pub analysis: Option<Value>,
    /// Named scalar features for downstream provenance.
    pub features: IndexMap<String, f64>,
    /// Identity of the solver credited with the answer.
    pub solver: String,
}

impl SelectedAnswer {
    /// Score-0 answer for a choice the optimizer did not select.
    #[must_use]
    pub fn placeholder(choice_index: usize, choice: AnswerChoice, solver: &str) -> Self {
        Self {
            choice_index,
            choice,
            score: 0.0,
            analysis: None,
            features: IndexMap::new(),
            solver: solver.to_string(),
        }
    }

    /// Sets a feature, replacing any previous value.
    #[must_use]
    pub fn with_feature(mut self, name: &str, value: f64) -> Self {
        self.features.insert(name.to_string(), value);
        self
    }
}

/// Orders answers by descending score; equal scores keep their order.
pub fn sort_answers(answers: &mut [SelectedAnswer]) {
    answers.sort_by(|a, b| b.score.total_cmp(&a.score));
}
