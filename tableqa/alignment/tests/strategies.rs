use std::{
    fs,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use shared_logging::Telemetry;
use tableqa_alignment::{
    AlignmentDependencies, AlignmentFactory, AlignmentSettings, AlignmentStrategy,
    EntailmentScore, EntailmentService, InMemoryVectorModel, MemoryCache,
};
use tableqa_tables::KeywordTokenizer;
use tempfile::tempdir;

#[derive(Default)]
struct ScriptedService {
    calls: AtomicUsize,
}

impl EntailmentService for ScriptedService {
    fn entail(&self, premise: &[String], hypothesis: &[String]) -> anyhow::Result<EntailmentScore> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let confidence = if premise == hypothesis { 0.9 } else { 0.3 };
        Ok(EntailmentScore {
            confidence,
            provenance: "scripted".into(),
        })
    }
}

#[test]
fn word_overlap_matches_identical_cell_and_choice() {
    let factory = AlignmentFactory::new(
        &AlignmentSettings::new(AlignmentStrategy::WordOverlap),
        AlignmentDependencies::new(Arc::new(KeywordTokenizer)),
    )
    .unwrap();
    let scorer = factory.build();
    assert!((scorer.score_cell_qchoice("4", "4") - 1.0).abs() < f64::EPSILON);
    assert!(scorer.score_cell_qchoice("2", "4").abs() < f64::EPSILON);
}

#[test]
fn entailment_cache_is_shared_across_scorers_and_logged() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("alignment.jsonl");
    let telemetry = Telemetry::builder("alignment")
        .log_path(&log_path)
        .build()
        .unwrap();
    let service = Arc::new(ScriptedService::default());
    let cache = Arc::new(MemoryCache::new());
    let deps = AlignmentDependencies::new(Arc::new(KeywordTokenizer))
        .with_entailment(service.clone())
        .with_cache(cache.clone())
        .with_telemetry(telemetry);
    let factory =
        AlignmentFactory::new(&AlignmentSettings::new(AlignmentStrategy::Entailment), deps)
            .unwrap();

    let first = factory.build().score_title_qcons("spider", "spider");
    let calls = service.calls.load(Ordering::SeqCst);
    let second = factory.build().score_title_qcons("spider", "spider");
    assert_eq!(first.to_bits(), second.to_bits());
    assert_eq!(service.calls.load(Ordering::SeqCst), calls);
    assert!((first - 0.7).abs() < 1e-12);
    assert_eq!(cache.len(), 1);

    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("alignment.factory.ready"));
    assert!(log.contains("alignment.entailment.computed"));
}

#[test]
fn word2vec_loads_vector_file_and_totalizes_unknown_phrases() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vectors.txt");
    fs::write(
        &path,
        "3 2\n</s> 1.0 1.0\nsolid 1.0 0.0\nliquid_water 0.0 1.0\n",
    )
    .unwrap();
    let model = InMemoryVectorModel::load(&path).unwrap();
    let deps = AlignmentDependencies::new(Arc::new(KeywordTokenizer)).with_vectors(Arc::new(model));
    let scorer = AlignmentFactory::new(&AlignmentSettings::new(AlignmentStrategy::Word2Vec), deps)
        .unwrap()
        .build();

    assert!(scorer.score_cell_cell("solid", "Liquid Water").abs() < 1e-12);
    let unseen = scorer.score_cell_cell("plasma", "vapor");
    assert!((unseen - 1.0).abs() < 1e-9);
}
