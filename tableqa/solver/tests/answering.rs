use std::{
    fs,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, ThreadId},
};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use shared_event_bus::MemoryEventBus;
use shared_logging::Telemetry;
use tableqa_alignment::{
    AlignmentDependencies, AlignmentFactory, AlignmentSettings, AlignmentStrategy,
};
use tableqa_solver::{
    build_solver, AlignmentProblem, ConfigError, FallbackAnswer, FallbackResponse, FallbackSolver,
    IlpSolution, Question, SolveStatus, SolverConfig, SolverOptions, SolverRequest,
    TableOptimizer, TableQaSolver, FALLBACK_FEATURE,
};
use tableqa_tables::{
    KeywordTokenizer, ScoredTable, Table, TableError, TableIndex, TableRetriever, Tokenizer,
};
use tempfile::tempdir;

const LEGS_QUESTION: &str = "How many legs does a cat have?";
const LEG_CHOICES: [&str; 4] = ["2", "4", "6", "8"];

/// Picks the choice best supported by a row that matches the question.
#[derive(Default)]
struct RowMatchOptimizer {
    calls: AtomicUsize,
}

impl TableOptimizer for RowMatchOptimizer {
    fn solve(&self, problem: &AlignmentProblem) -> Result<IlpSolution> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scorer = &problem.scorer;
        let mut best: Option<(usize, f64)> = None;
        for (table, _) in problem.candidate_tables() {
            for row in table.content_rows() {
                let relevance: f64 = problem
                    .question
                    .constituents
                    .iter()
                    .map(|cons| {
                        row.iter()
                            .map(|cell| scorer.score_cell_qcons(cell, cons))
                            .fold(0.0, f64::max)
                    })
                    .sum();
                for (index, choice) in problem.question.choices.iter().enumerate() {
                    let support = row
                        .iter()
                        .map(|cell| scorer.score_cell_qchoice(cell, &choice.text))
                        .fold(0.0, f64::max);
                    let score = relevance * support;
                    if best.map_or(score > 0.0, |(_, b)| score > b) {
                        best = Some((index, score));
                    }
                }
            }
        }
        Ok(match best {
            Some((index, score)) => IlpSolution {
                status: SolveStatus::Optimal,
                best_choice: Some(index),
                score,
                trace: json!({ "wh_terms": problem.question.wh_terms }),
            },
            None => IlpSolution::infeasible(),
        })
    }
}

struct FixedOptimizer {
    solution: Option<IlpSolution>,
    calls: AtomicUsize,
}

impl FixedOptimizer {
    fn new(solution: Option<IlpSolution>) -> Self {
        Self {
            solution,
            calls: AtomicUsize::new(0),
        }
    }
}

impl TableOptimizer for FixedOptimizer {
    fn solve(&self, _: &AlignmentProblem) -> Result<IlpSolution> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.solution
            .clone()
            .ok_or_else(|| anyhow::anyhow!("solver license expired"))
    }
}

struct SpyRetriever {
    selection: Vec<ScoredTable>,
    calls: AtomicUsize,
    threads: Mutex<Vec<ThreadId>>,
}

impl SpyRetriever {
    fn new(selection: Vec<ScoredTable>) -> Self {
        Self {
            selection,
            calls: AtomicUsize::new(0),
            threads: Mutex::new(Vec::new()),
        }
    }
}

impl TableRetriever for SpyRetriever {
    fn rank(&self, _: &str) -> Result<Vec<ScoredTable>, TableError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.threads.lock().push(thread::current().id());
        Ok(self.selection.clone())
    }
}

struct StubFallback {
    answers: Vec<FallbackAnswer>,
    requests: Mutex<Vec<SolverRequest>>,
}

impl StubFallback {
    fn new(answers: Vec<FallbackAnswer>) -> Self {
        Self {
            answers,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FallbackSolver for StubFallback {
    fn name(&self) -> &str {
        "IR"
    }

    async fn solve(&self, request: SolverRequest) -> Result<FallbackResponse> {
        self.requests.lock().push(request);
        Ok(FallbackResponse {
            solver: "IR".into(),
            answers: self.answers.clone(),
        })
    }
}

fn animals_index(tokenizer: &dyn Tokenizer) -> Arc<TableIndex> {
    Arc::new(
        TableIndex::build(
            vec![Table::from_strs(
                "animals",
                &[&["Animal", "Legs"], &["cat", "4"], &["bird", "2"]],
            )],
            &[],
            tokenizer,
            None,
        )
        .unwrap(),
    )
}

fn solver(
    retriever: Arc<dyn TableRetriever>,
    optimizer: Arc<dyn TableOptimizer>,
    options: SolverOptions,
) -> TableQaSolver {
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(KeywordTokenizer);
    let alignment = AlignmentFactory::new(
        &AlignmentSettings::new(AlignmentStrategy::WordOverlap),
        AlignmentDependencies::new(Arc::clone(&tokenizer)),
    )
    .unwrap();
    TableQaSolver::new(
        animals_index(tokenizer.as_ref()),
        retriever,
        tokenizer,
        alignment,
        optimizer,
        options,
    )
}

fn with_fallback() -> SolverOptions {
    SolverOptions {
        use_fallback: true,
        ..SolverOptions::default()
    }
}

fn fallback_answers() -> Vec<FallbackAnswer> {
    vec![
        FallbackAnswer {
            choice: 0,
            confidence: 0.2,
            analysis: None,
        },
        FallbackAnswer {
            choice: 3,
            confidence: 0.6,
            analysis: Some(json!({ "hits": 12 })),
        },
    ]
}

#[tokio::test]
async fn guarded_questions_touch_nothing() {
    let retriever = Arc::new(SpyRetriever::new(vec![ScoredTable { table: 0, score: 1.0 }]));
    let optimizer = Arc::new(FixedOptimizer::new(None));
    let fallback = Arc::new(StubFallback::new(fallback_answers()));
    let solver = solver(retriever.clone(), optimizer.clone(), with_fallback())
        .with_fallback(fallback.clone());

    let free = solver
        .answer(&Question::free_response(LEGS_QUESTION))
        .await
        .unwrap();
    let blank = solver
        .answer(&Question::multiple_choice("", &LEG_CHOICES))
        .await
        .unwrap();
    assert!(free.is_empty());
    assert!(blank.is_empty());
    assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
    assert_eq!(optimizer.calls.load(Ordering::SeqCst), 0);
    assert!(fallback.requests.lock().is_empty());
}

#[tokio::test]
async fn cat_question_is_answered_from_the_animal_table() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("tables")).unwrap();
    fs::write(
        dir.path().join("tables/animals.tsv"),
        "Animal\tLegs\ncat\t4\nbird\t2\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("tables/planets.tsv"),
        "Planet\tMoons\nMars\t2\nEarth\t1\n",
    )
    .unwrap();
    let config_path = dir.path().join("solver.toml");
    fs::write(
        &config_path,
        r#"
        [tables]
        dir = "tables"

        [selection]
        mode = "ranked"
        top_k = 1

        [alignment]
        strategy = "word-overlap"

        [telemetry]
        log_path = "logs/solver.jsonl"
        "#,
    )
    .unwrap();
    let config = SolverConfig::load(&config_path).unwrap();
    let optimizer = Arc::new(RowMatchOptimizer::default());
    let solver = build_solver(&config, optimizer.clone(), None, None, None).unwrap();

    let answers = solver
        .answer(&Question::multiple_choice(LEGS_QUESTION, &LEG_CHOICES))
        .await
        .unwrap();
    assert_eq!(optimizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(answers.len(), 4);
    assert_eq!(answers[0].choice.text, "4");
    assert_eq!(answers[0].score.to_bits(), 1.0f64.to_bits());
    assert_eq!(answers[0].analysis, Some(json!({ "wh_terms": ["how many"] })));
    assert!(answers[1..].iter().all(|a| a.score.abs() < f64::EPSILON));
    let mut indices: Vec<_> = answers.iter().map(|a| a.choice_index).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2, 3]);

    let log = fs::read_to_string(dir.path().join("logs/solver.jsonl")).unwrap();
    assert!(log.contains("solver.bootstrap.ready"));
    assert!(log.contains("solver.answer.completed"));
}

#[test]
fn enabled_fallback_without_a_fallback_solver_is_rejected() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("tables")).unwrap();
    fs::write(
        dir.path().join("tables/animals.tsv"),
        "Animal\tLegs\ncat\t4\nbird\t2\n",
    )
    .unwrap();
    let config = SolverConfig::from_toml_str(
        r#"
        [tables]
        dir = "tables"

        [selection]
        top_k = 1

        [alignment]
        strategy = "word-overlap"

        [solver]
        use_fallback = true
        "#,
        dir.path(),
    )
    .unwrap();
    let optimizer = Arc::new(FixedOptimizer::new(Some(IlpSolution::infeasible())));

    let err = build_solver(&config, optimizer.clone(), None, None, None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::MissingFallbackSolver)
    ));

    let fallback: Arc<dyn FallbackSolver> = Arc::new(StubFallback::new(fallback_answers()));
    assert!(build_solver(&config, optimizer, Some(fallback), None, None).is_ok());
}

#[tokio::test]
async fn ranking_runs_off_the_async_executor() {
    let retriever = Arc::new(SpyRetriever::new(vec![ScoredTable { table: 0, score: 1.0 }]));
    let optimizer = Arc::new(FixedOptimizer::new(Some(IlpSolution {
        status: SolveStatus::Optimal,
        best_choice: Some(1),
        score: 0.9,
        trace: json!({}),
    })));
    let solver = solver(retriever.clone(), optimizer, SolverOptions::default());

    let answers = solver
        .answer(&Question::multiple_choice(LEGS_QUESTION, &LEG_CHOICES))
        .await
        .unwrap();
    assert_eq!(answers[0].choice_index, 1);
    let threads = retriever.threads.lock().clone();
    assert_eq!(threads.len(), 1);
    // The test body runs on the current-thread runtime's own thread.
    assert_ne!(threads[0], thread::current().id());
}

#[tokio::test]
async fn infeasible_model_hands_the_request_to_the_fallback() {
    let retriever = Arc::new(SpyRetriever::new(vec![ScoredTable { table: 0, score: 0.4 }]));
    let optimizer = Arc::new(FixedOptimizer::new(Some(IlpSolution::infeasible())));
    let fallback = Arc::new(StubFallback::new(fallback_answers()));
    let solver = solver(retriever, optimizer, with_fallback()).with_fallback(fallback.clone());
    let question = Question::multiple_choice(LEGS_QUESTION, &LEG_CHOICES);

    let answers = solver.answer(&question).await.unwrap();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0].choice_index, 3);
    assert_eq!(answers[1].choice_index, 0);
    assert!(answers.iter().all(|a| a.solver == "IR"));
    assert!(answers
        .iter()
        .all(|a| (a.features[FALLBACK_FEATURE] - 1.0).abs() < f64::EPSILON));
    assert_eq!(answers[0].analysis, Some(json!({ "hits": 12 })));

    let requests = fallback.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].question, question);
}

#[tokio::test]
async fn fallback_answers_can_be_credited_to_this_solver() {
    let retriever = Arc::new(SpyRetriever::new(Vec::new()));
    let optimizer = Arc::new(FixedOptimizer::new(None));
    let options = SolverOptions {
        tag_with_fallback_name: false,
        ..with_fallback()
    };
    let solver = solver(retriever, optimizer.clone(), options)
        .with_fallback(Arc::new(StubFallback::new(fallback_answers())));

    let answers = solver
        .answer(&Question::multiple_choice(LEGS_QUESTION, &LEG_CHOICES))
        .await
        .unwrap();
    // No candidate tables: the optimizer is skipped entirely.
    assert_eq!(optimizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(answers.len(), 2);
    assert!(answers.iter().all(|a| a.solver == "TableILP"));
}

#[tokio::test]
async fn disabled_fallback_leaves_the_answer_set_empty() {
    let retriever = Arc::new(SpyRetriever::new(vec![ScoredTable { table: 0, score: 0.4 }]));
    let optimizer = Arc::new(FixedOptimizer::new(Some(IlpSolution::infeasible())));
    let fallback = Arc::new(StubFallback::new(fallback_answers()));
    let solver =
        solver(retriever, optimizer, SolverOptions::default()).with_fallback(fallback.clone());

    let answers = solver
        .answer(&Question::multiple_choice(LEGS_QUESTION, &LEG_CHOICES))
        .await
        .unwrap();
    assert!(answers.is_empty());
    assert!(fallback.requests.lock().is_empty());
}

#[tokio::test]
async fn optimizer_failure_is_an_error_not_a_fallback() {
    let retriever = Arc::new(SpyRetriever::new(vec![ScoredTable { table: 0, score: 0.4 }]));
    let optimizer = Arc::new(FixedOptimizer::new(None));
    let fallback = Arc::new(StubFallback::new(fallback_answers()));
    let solver = solver(retriever, optimizer, with_fallback()).with_fallback(fallback.clone());

    let err = solver
        .answer(&Question::multiple_choice(LEGS_QUESTION, &LEG_CHOICES))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("solver license expired"));
    assert!(fallback.requests.lock().is_empty());
}

#[tokio::test]
async fn answer_events_reach_the_bus() {
    let bus = MemoryEventBus::new(16);
    let telemetry = Telemetry::builder("solver")
        .event_publisher(Arc::new(bus.clone()))
        .build()
        .unwrap();
    let retriever = Arc::new(SpyRetriever::new(Vec::new()));
    let optimizer = Arc::new(FixedOptimizer::new(None));
    let solver = solver(retriever, optimizer, with_fallback())
        .with_fallback(Arc::new(StubFallback::new(fallback_answers())))
        .with_telemetry(telemetry);

    solver
        .answer(&Question::multiple_choice(LEGS_QUESTION, &LEG_CHOICES))
        .await
        .unwrap();
    for _ in 0..10 {
        if !bus.snapshot().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    let events = bus.events_of_type("solver.answer.fallback");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["credited"], "IR");
}
