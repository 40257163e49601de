use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::question::Question;

/// The original request, forwarded untouched to the fallback solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverRequest {
    /// Request identifier for correlation in logs.
    pub id: String,
    /// The question as submitted.
    pub question: Question,
}

impl SolverRequest {
    /// Wraps `question` with a fresh id.
    #[must_use]
    pub fn new(question: Question) -> Self {
        Self {
            id: format!("req-{}", Uuid::new_v4()),
            question,
        }
    }
}

/// One answer from the fallback solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackAnswer {
    /// Index of the choice in the question.
    pub choice: usize,
    /// Confidence assigned by the fallback.
    pub confidence: f64,
    /// Optional structured analysis.
    pub analysis: Option<Value>,
}

/// The fallback solver's full response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackResponse {
    /// Identity of the solver that produced the answers.
    pub solver: String,
    /// Answers, in the fallback's own order.
    pub answers: Vec<FallbackAnswer>,
}

/// Secondary solver consulted when the table path yields nothing.
#[async_trait]
pub trait FallbackSolver: Send + Sync {
    /// Identity used for provenance.
    fn name(&self) -> &str;

    /// Answers the original request.
    async fn solve(&self, request: SolverRequest) -> Result<FallbackResponse>;
}
