use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::{LogLevel, Telemetry};
use tableqa_tables::Tokenizer;

use crate::{
    backends::{
        word2vec::DEFAULT_SENTINEL, EntailmentBackend, EntailmentService, SimilarityBackend,
        VectorModel, Word2VecBackend, WordOverlapBackend,
    },
    cache::KeyValueCache,
    combinators::{max_over, symmetric},
    error::AlignmentError,
};

/// Default offset subtracted from entailment confidences.
pub const DEFAULT_ENTAILMENT_OFFSET: f64 = 0.2;

/// Longest string, in whitespace-separated words, compared against wh-terms.
const MAX_WH_MATCH_WORDS: usize = 2;

/// The similarity backend behind a scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlignmentStrategy {
    /// External textual-entailment service.
    #[serde(rename = "entailment")]
    Entailment,
    /// Word-vector cosine similarity.
    #[serde(rename = "word2vec")]
    Word2Vec,
    /// Stemmed word-overlap coverage.
    #[serde(rename = "word-overlap", alias = "wordoverlap", alias = "word_overlap")]
    WordOverlap,
}

impl AlignmentStrategy {
    /// Canonical configuration name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Entailment => "entailment",
            Self::Word2Vec => "word2vec",
            Self::WordOverlap => "word-overlap",
        }
    }
}

impl FromStr for AlignmentStrategy {
    type Err = AlignmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "entailment" => Ok(Self::Entailment),
            "word2vec" => Ok(Self::Word2Vec),
            "word-overlap" | "wordoverlap" | "word_overlap" => Ok(Self::WordOverlap),
            _ => Err(AlignmentError::UnknownStrategy(value.to_string())),
        }
    }
}

impl fmt::Display for AlignmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The seven scoring operations consumed by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentOperation {
    /// Title against title.
    TitleTitle,
    /// Cell against cell.
    CellCell,
    /// Cell against a question constituent.
    CellQCons,
    /// Title against a question constituent.
    TitleQCons,
    /// Cell against an answer choice.
    CellQChoice,
    /// Title against an answer choice.
    TitleQChoice,
    /// Short string against the question's wh-terms.
    StrWhTerms,
}

impl AlignmentOperation {
    /// Every operation, in a fixed order.
    pub const ALL: [Self; 7] = [
        Self::TitleTitle,
        Self::CellCell,
        Self::CellQCons,
        Self::TitleQCons,
        Self::CellQChoice,
        Self::TitleQChoice,
        Self::StrWhTerms,
    ];

    /// Whether swapping the operands leaves the score unchanged.
    #[must_use]
    pub const fn is_symmetric(self) -> bool {
        matches!(self, Self::TitleTitle | Self::CellCell)
    }

    /// Stable name for logs and reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TitleTitle => "title_title",
            Self::CellCell => "cell_cell",
            Self::CellQCons => "cell_qcons",
            Self::TitleQCons => "title_qcons",
            Self::CellQChoice => "cell_qchoice",
            Self::TitleQChoice => "title_qchoice",
            Self::StrWhTerms => "str_wh_terms",
        }
    }
}

/// Scores table content against question fragments through one backend.
#[derive(Clone)]
pub struct AlignmentScorer {
    strategy: AlignmentStrategy,
    backend: Arc<dyn SimilarityBackend>,
}

impl fmt::Debug for AlignmentScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignmentScorer")
            .field("strategy", &self.strategy)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl AlignmentScorer {
    /// Wraps an already constructed backend.
    #[must_use]
    pub fn new(strategy: AlignmentStrategy, backend: Arc<dyn SimilarityBackend>) -> Self {
        Self { strategy, backend }
    }

    /// Strategy of the wrapped backend.
    #[must_use]
    pub const fn strategy(&self) -> AlignmentStrategy {
        self.strategy
    }

    /// Symmetric title similarity.
    #[must_use]
    pub fn score_title_title(&self, title1: &str, title2: &str) -> f64 {
        symmetric(|a, b| self.backend.score(a, b), title1, title2)
    }

    /// Symmetric cell similarity.
    #[must_use]
    pub fn score_cell_cell(&self, cell1: &str, cell2: &str) -> f64 {
        symmetric(|a, b| self.backend.score(a, b), cell1, cell2)
    }

    /// How well a cell supports a question constituent.
    #[must_use]
    pub fn score_cell_qcons(&self, cell: &str, qcons: &str) -> f64 {
        self.backend.score(cell, qcons)
    }

    /// How well a title supports a question constituent.
    #[must_use]
    pub fn score_title_qcons(&self, title: &str, qcons: &str) -> f64 {
        self.backend.score(title, qcons)
    }

    /// How well an answer choice supports a cell.
    #[must_use]
    pub fn score_cell_qchoice(&self, cell: &str, qchoice: &str) -> f64 {
        self.backend.score(qchoice, cell)
    }

    /// How well an answer choice supports a title.
    #[must_use]
    pub fn score_title_qchoice(&self, title: &str, qchoice: &str) -> f64 {
        self.backend.score(qchoice, title)
    }

    /// Best match of `text` against any wh-term.
    ///
    /// Only strings of at most two words are compared; longer strings and an
    /// empty term list score 0 without touching the backend.
    #[must_use]
    pub fn score_str_wh_terms<S: AsRef<str>>(&self, text: &str, wh_terms: &[S]) -> f64 {
        if text.split_whitespace().count() > MAX_WH_MATCH_WORDS {
            return 0.0;
        }
        max_over(|a, b| self.backend.score(a, b), text, wh_terms).unwrap_or(0.0)
    }

    /// Dispatches `operation` on a single pair; for [`AlignmentOperation::StrWhTerms`]
    /// `right` is treated as the only wh-term.
    #[must_use]
    pub fn score(&self, operation: AlignmentOperation, left: &str, right: &str) -> f64 {
        match operation {
            AlignmentOperation::TitleTitle => self.score_title_title(left, right),
            AlignmentOperation::CellCell => self.score_cell_cell(left, right),
            AlignmentOperation::CellQCons => self.score_cell_qcons(left, right),
            AlignmentOperation::TitleQCons => self.score_title_qcons(left, right),
            AlignmentOperation::CellQChoice => self.score_cell_qchoice(left, right),
            AlignmentOperation::TitleQChoice => self.score_title_qchoice(left, right),
            AlignmentOperation::StrWhTerms => self.score_str_wh_terms(left, &[right]),
        }
    }
}

/// Tunables for scorer construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentSettings {
    /// Backend to use.
    pub strategy: AlignmentStrategy,
    /// Offset subtracted from entailment confidences.
    #[serde(default = "default_entailment_offset")]
    pub entailment_offset: f64,
    /// Out-of-vocabulary token for the vector backend.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
}

const fn default_entailment_offset() -> f64 {
    DEFAULT_ENTAILMENT_OFFSET
}

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}

impl AlignmentSettings {
    /// Settings for `strategy` with default offset and sentinel.
    #[must_use]
    pub fn new(strategy: AlignmentStrategy) -> Self {
        Self {
            strategy,
            entailment_offset: DEFAULT_ENTAILMENT_OFFSET,
            sentinel: default_sentinel(),
        }
    }
}

/// External collaborators a backend may need.
#[derive(Clone)]
pub struct AlignmentDependencies {
    /// Stemming tokenizer.
    pub tokenizer: Arc<dyn Tokenizer>,
    /// Entailment service, required by the entailment strategy.
    pub entailment: Option<Arc<dyn EntailmentService>>,
    /// Vector model, required by the word2vec strategy.
    pub vectors: Option<Arc<dyn VectorModel>>,
    /// Optional entailment score cache.
    pub cache: Option<Arc<dyn KeyValueCache>>,
    /// Optional telemetry.
    pub telemetry: Option<Telemetry>,
}

impl AlignmentDependencies {
    /// Dependencies with only a tokenizer.
    #[must_use]
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            entailment: None,
            vectors: None,
            cache: None,
            telemetry: None,
        }
    }

    /// Sets the entailment service.
    #[must_use]
    pub fn with_entailment(mut self, service: Arc<dyn EntailmentService>) -> Self {
        self.entailment = Some(service);
        self
    }

    /// Sets the vector model.
    #[must_use]
    pub fn with_vectors(mut self, vectors: Arc<dyn VectorModel>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    /// Sets the score cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn KeyValueCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }
}

/// Validates a strategy against its dependencies once, then hands out scorers.
#[derive(Clone)]
pub struct AlignmentFactory {
    strategy: AlignmentStrategy,
    backend: Arc<dyn SimilarityBackend>,
}

impl fmt::Debug for AlignmentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignmentFactory")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl AlignmentFactory {
    /// Builds the backend for `settings.strategy`, failing when a required
    /// collaborator is missing.
    pub fn new(
        settings: &AlignmentSettings,
        deps: AlignmentDependencies,
    ) -> Result<Self, AlignmentError> {
        let strategy = settings.strategy;
        let backend: Arc<dyn SimilarityBackend> = match strategy {
            AlignmentStrategy::Entailment => {
                let service = deps.entailment.ok_or(AlignmentError::MissingDependency {
                    strategy: strategy.name(),
                    dependency: "entailment service",
                })?;
                Arc::new(
                    EntailmentBackend::new(
                        service,
                        deps.tokenizer,
                        deps.cache,
                        settings.entailment_offset,
                    )
                    .with_telemetry(deps.telemetry.clone()),
                )
            }
            AlignmentStrategy::Word2Vec => {
                let vectors = deps.vectors.ok_or(AlignmentError::MissingDependency {
                    strategy: strategy.name(),
                    dependency: "vector model",
                })?;
                Arc::new(Word2VecBackend::new(vectors, settings.sentinel.clone())?)
            }
            AlignmentStrategy::WordOverlap => Arc::new(WordOverlapBackend::new(deps.tokenizer)),
        };
        if let Some(tel) = &deps.telemetry {
            let _ = tel.log(
                LogLevel::Info,
                "alignment.factory.ready",
                json!({ "strategy": strategy.name() }),
            );
        }
        Ok(Self { strategy, backend })
    }

    /// Configured strategy.
    #[must_use]
    pub const fn strategy(&self) -> AlignmentStrategy {
        self.strategy
    }

    /// A fresh scorer for one request.
    #[must_use]
    pub fn build(&self) -> AlignmentScorer {
        AlignmentScorer::new(self.strategy, Arc::clone(&self.backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{EntailmentScore, InMemoryVectorModel};
    use tableqa_tables::KeywordTokenizer;

    struct OverlapService;

    impl EntailmentService for OverlapService {
        fn entail(
            &self,
            premise: &[String],
            hypothesis: &[String],
        ) -> anyhow::Result<EntailmentScore> {
            let hits = hypothesis.iter().filter(|t| premise.contains(t)).count();
            Ok(EntailmentScore {
                confidence: hits as f64 / hypothesis.len() as f64,
                provenance: "overlap".into(),
            })
        }
    }

    fn vectors() -> Arc<dyn VectorModel> {
        let mut model = InMemoryVectorModel::new();
        model.insert(DEFAULT_SENTINEL, vec![0.3, 0.3, 0.3]);
        model.insert("ice", vec![1.0, 0.2, 0.0]);
        model.insert("water", vec![0.8, 0.6, 0.0]);
        model.insert("steam", vec![0.1, 1.0, 0.4]);
        Arc::new(model)
    }

    fn deps() -> AlignmentDependencies {
        AlignmentDependencies::new(Arc::new(KeywordTokenizer))
            .with_entailment(Arc::new(OverlapService))
            .with_vectors(vectors())
    }

    fn all_scorers() -> Vec<AlignmentScorer> {
        [
            AlignmentStrategy::Entailment,
            AlignmentStrategy::Word2Vec,
            AlignmentStrategy::WordOverlap,
        ]
        .into_iter()
        .map(|strategy| {
            AlignmentFactory::new(&AlignmentSettings::new(strategy), deps())
                .unwrap()
                .build()
        })
        .collect()
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!("word2vec".parse::<AlignmentStrategy>().unwrap(), AlignmentStrategy::Word2Vec);
        assert_eq!(
            "WordOverlap".parse::<AlignmentStrategy>().unwrap(),
            AlignmentStrategy::WordOverlap
        );
        assert_eq!(
            "word_overlap".parse::<AlignmentStrategy>().unwrap(),
            AlignmentStrategy::WordOverlap
        );
        assert!(matches!(
            "bm25".parse::<AlignmentStrategy>(),
            Err(AlignmentError::UnknownStrategy(name)) if name == "bm25"
        ));
    }

    #[test]
    fn missing_dependencies_fail_at_construction() {
        let bare = AlignmentDependencies::new(Arc::new(KeywordTokenizer));
        let err = AlignmentFactory::new(
            &AlignmentSettings::new(AlignmentStrategy::Entailment),
            bare.clone(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AlignmentError::MissingDependency { strategy: "entailment", .. }
        ));
        let err = AlignmentFactory::new(&AlignmentSettings::new(AlignmentStrategy::Word2Vec), bare)
            .unwrap_err();
        assert!(matches!(err, AlignmentError::MissingDependency { strategy: "word2vec", .. }));
    }

    #[test]
    fn symmetric_operations_ignore_argument_order() {
        let pairs = [("ice", "frozen water"), ("steam", "water vapor"), ("Material", "State")];
        for scorer in all_scorers() {
            for (a, b) in pairs {
                assert_eq!(
                    scorer.score_title_title(a, b).to_bits(),
                    scorer.score_title_title(b, a).to_bits(),
                    "{:?}",
                    scorer.strategy()
                );
                assert_eq!(
                    scorer.score_cell_cell(a, b).to_bits(),
                    scorer.score_cell_cell(b, a).to_bits()
                );
            }
        }
    }

    #[test]
    fn wh_guard_returns_zero_for_every_backend() {
        let no_terms: [&str; 0] = [];
        for scorer in all_scorers() {
            assert!(scorer.score_str_wh_terms("water", &no_terms).abs() < f64::EPSILON);
            assert!(scorer
                .score_str_wh_terms("liquid water boils", &["water"])
                .abs()
                < f64::EPSILON);
        }
    }

    #[test]
    fn choice_operations_use_the_choice_as_premise() {
        let scorer = AlignmentFactory::new(
            &AlignmentSettings::new(AlignmentStrategy::WordOverlap),
            deps(),
        )
        .unwrap()
        .build();
        // choice "ice" covers half of the cell's tokens; the cell covers all of the choice.
        assert!((scorer.score_cell_qchoice("melting ice", "ice") - 0.5).abs() < f64::EPSILON);
        assert!((scorer.score_cell_qcons("melting ice", "ice") - 1.0).abs() < f64::EPSILON);
        assert!((scorer.score_cell_qchoice("4", "4") - 1.0).abs() < f64::EPSILON);
        assert!(
            (scorer.score(AlignmentOperation::StrWhTerms, "legs", "legs") - 1.0).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn entailment_scores_carry_the_offset() {
        let mut settings = AlignmentSettings::new(AlignmentStrategy::Entailment);
        settings.entailment_offset = 0.5;
        let scorer = AlignmentFactory::new(&settings, deps()).unwrap().build();
        assert!((scorer.score_cell_qcons("frozen water", "water") - 0.5).abs() < 1e-12);
        assert!((scorer.score_cell_qcons("steam", "water") + 0.5).abs() < 1e-12);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: AlignmentSettings =
            serde_json::from_str(r#"{ "strategy": "wordoverlap" }"#).unwrap();
        assert_eq!(settings.strategy, AlignmentStrategy::WordOverlap);
        assert!((settings.entailment_offset - 0.2).abs() < f64::EPSILON);
        assert_eq!(settings.sentinel, "</s>");
    }
}
