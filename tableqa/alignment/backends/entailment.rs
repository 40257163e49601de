use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::{LogLevel, Telemetry};
use tableqa_tables::Tokenizer;

use super::SimilarityBackend;
use crate::cache::KeyValueCache;

/// Hypotheses too generic to count as evidence unless matched verbatim.
const IGNORED_HYPOTHESES: [&str; 3] = ["object", "measure", "part"];

const CACHE_KEY_SEPARATOR: &str = "----";

/// Confidence returned by an entailment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntailmentScore {
    /// Confidence that the premise entails the hypothesis.
    pub confidence: f64,
    /// Which model produced the score.
    pub provenance: String,
}

/// External textual-entailment service.
pub trait EntailmentService: Send + Sync {
    /// Confidence that `premise` entails `hypothesis`, both stemmed token sequences.
    fn entail(&self, premise: &[String], hypothesis: &[String]) -> Result<EntailmentScore>;
}

/// Directional entailment scoring with an optional write-back cache.
///
/// Returned scores are `raw - offset`, so they go negative when the service
/// is less confident than the offset.
pub struct EntailmentBackend {
    service: Arc<dyn EntailmentService>,
    tokenizer: Arc<dyn Tokenizer>,
    cache: Option<Arc<dyn KeyValueCache>>,
    offset: f64,
    telemetry: Option<Telemetry>,
}

impl EntailmentBackend {
    /// Creates the backend.
    #[must_use]
    pub fn new(
        service: Arc<dyn EntailmentService>,
        tokenizer: Arc<dyn Tokenizer>,
        cache: Option<Arc<dyn KeyValueCache>>,
        offset: f64,
    ) -> Self {
        Self {
            service,
            tokenizer,
            cache,
            offset,
            telemetry: None,
        }
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Option<Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Offset subtracted from every raw score.
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    /// Offset-adjusted entailment score of `text1` entailing `text2`.
    #[must_use]
    pub fn entail(&self, text1: &str, text2: &str) -> f64 {
        self.raw_score(text1, text2) - self.offset
    }

    fn raw_score(&self, text1: &str, text2: &str) -> f64 {
        let key = format!("{text1}{CACHE_KEY_SEPARATOR}{text2}");
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).and_then(|value| value.parse::<f64>().ok()) {
                return hit;
            }
        }
        let (score, complete) = self.compute(text1, text2);
        match &self.cache {
            Some(cache) if complete => cache.set(&key, &score.to_string()),
            _ => {}
        }
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(
                LogLevel::Debug,
                "alignment.entailment.computed",
                json!({ "key": key, "score": score, "complete": complete }),
            );
        }
        score
    }

    /// Max confidence over every surviving segment pair, and whether every
    /// service call succeeded.
    fn compute(&self, text1: &str, text2: &str) -> (f64, bool) {
        let premises = self.segments(text1);
        let hypotheses = self.segments(text2);
        let mut best: Option<f64> = None;
        let mut complete = true;
        for premise in &premises {
            for hypothesis in &hypotheses {
                if is_ignored_hypothesis(premise, hypothesis) {
                    continue;
                }
                match self.service.entail(premise, hypothesis) {
                    Ok(result) => {
                        best = Some(best.map_or(result.confidence, |b| b.max(result.confidence)));
                    }
                    Err(err) => {
                        complete = false;
                        if let Some(tel) = &self.telemetry {
                            let _ = tel.log(
                                LogLevel::Warn,
                                "alignment.entailment.service_error",
                                json!({ "error": err.to_string() }),
                            );
                        }
                    }
                }
            }
        }
        (best.unwrap_or(0.0), complete)
    }

    /// Splits on `;`, drops bracketed annotations, tokenizes the rest.
    fn segments(&self, text: &str) -> Vec<Vec<String>> {
        text.split(';')
            .map(str::trim)
            .filter(|segment| !segment.is_empty() && !is_bracketed(segment))
            .map(|segment| self.tokenizer.stemmed_keyword_tokenize(segment))
            .filter(|tokens| !tokens.is_empty())
            .collect()
    }
}

impl SimilarityBackend for EntailmentBackend {
    fn name(&self) -> &'static str {
        "entailment"
    }

    fn score(&self, premise: &str, hypothesis: &str) -> f64 {
        self.entail(premise, hypothesis)
    }
}

fn is_bracketed(segment: &str) -> bool {
    segment.starts_with('[') && segment.ends_with(']')
}

fn is_ignored_hypothesis(premise: &[String], hypothesis: &[String]) -> bool {
    let joined = hypothesis.join(" ").to_lowercase();
    IGNORED_HYPOTHESES.contains(&joined.as_str()) && premise != hypothesis
}
