//! End-to-end imports through the corpus context
//!
//! Every test runs against an in-memory SQLite pool and the in-process graph
//! store, with the corpus directories under a temporary root.

use annograph_common::config::CorpusPaths;
use annograph_common::{Annotation, AnnotationType, DiscourseData, Segment};
use annograph_import::acoustics::AcousticAnalyzer;
use annograph_import::db;
use annograph_import::graph::{AnchorKey, GraphError};
use annograph_import::{CorpusContext, CorpusState, ImportError, MemoryGraphStore, WordKey};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

async fn open_context(root: &TempDir) -> CorpusContext<MemoryGraphStore> {
    let paths = CorpusPaths::new(root.path(), "test");
    paths.ensure_directories().unwrap();
    let pool = db::init_memory_pool().await.unwrap();
    CorpusContext::from_parts(paths, pool, MemoryGraphStore::new(), CorpusState::default())
}

/// "cat dog" over six untimed phones
fn cat_dog(name: &str) -> DiscourseData {
    let mut word = AnnotationType::new("word").anchor();
    word.add(
        [
            Annotation::new("cat").with_reference("phone", 0, 3),
            Annotation::new("dog").with_reference("phone", 3, 6),
        ],
        true,
    );
    let mut phone = AnnotationType::new("phone").base().with_supertype("word");
    phone.add(["k", "æ", "t", "d", "ɒ", "g"].map(Segment::new), true);
    DiscourseData::new(name, [word, phone])
}

#[derive(Default)]
struct RecordingAnalyzer {
    seen: Mutex<Vec<String>>,
}

impl AcousticAnalyzer for RecordingAnalyzer {
    fn analyze_discourse(&self, discourse: &str, _wav_path: &Path) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(discourse.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn test_untimed_import_populates_both_stores() {
    let root = TempDir::new().unwrap();
    let ctx = open_context(&root).await;

    let summary = ctx.add_discourse(cat_dog("d1")).await.unwrap();
    assert_eq!(summary.anchors, 7);
    assert_eq!(summary.spans["word"], 2);
    assert_eq!(summary.spans["phone"], 6);
    assert_eq!(summary.tokens, 2);
    assert!(!summary.is_timed);
    assert!(summary.dropped.is_empty());

    let extents: Vec<(AnchorKey, AnchorKey)> = ctx
        .with_graph(|graph| {
            let discourse = graph.discourse("test", "d1").unwrap();
            discourse
                .spans_of_type("word")
                .map(|s| {
                    (
                        discourse.anchor(s.begin).unwrap().key,
                        discourse.anchor(s.end).unwrap().key,
                    )
                })
                .collect()
        })
        .await;
    assert_eq!(
        extents,
        vec![
            (AnchorKey::Index(0), AnchorKey::Index(3)),
            (AnchorKey::Index(3), AnchorKey::Index(6)),
        ]
    );

    let cat = db::words::load_word(&ctx.db, "cat", "k.æ.t").await.unwrap().unwrap();
    assert_eq!(cat.frequency, 1);
    let dog = db::words::load_word(&ctx.db, "dog", "d.ɒ.g").await.unwrap().unwrap();
    assert_eq!(dog.frequency, 1);
    assert_eq!(ctx.discourses().await.unwrap(), vec!["d1".to_string()]);

    let lexicon = ctx.lexicon().await;
    assert_eq!(lexicon.get(&WordKey::new("cat", "k.æ.t")).unwrap().frequency, 1);
}

#[tokio::test]
async fn test_reimport_is_rejected_until_reset() {
    let root = TempDir::new().unwrap();
    let ctx = open_context(&root).await;

    ctx.add_discourse(cat_dog("d1")).await.unwrap();
    let err = ctx.add_discourse(cat_dog("d1")).await.unwrap_err();
    assert!(matches!(err, ImportError::Graph(GraphError::DiscourseExists { .. })));

    // the rejected import touched neither the relational side nor the lexicon
    let cat = db::words::load_word(&ctx.db, "cat", "k.æ.t").await.unwrap().unwrap();
    assert_eq!(cat.frequency, 1);
    assert_eq!(ctx.lexicon().await.get(&WordKey::new("cat", "k.æ.t")).unwrap().frequency, 1);

    ctx.reset().await.unwrap();
    assert!(ctx.discourses().await.unwrap().is_empty());
    assert!(ctx.lexicon().await.is_empty());

    ctx.add_discourse(cat_dog("d1")).await.unwrap();
    let cat = db::words::load_word(&ctx.db, "cat", "k.æ.t").await.unwrap().unwrap();
    assert_eq!(cat.frequency, 1);
}

#[tokio::test]
async fn test_rejected_load_retracts_load_constraints() {
    let root = TempDir::new().unwrap();
    let ctx = open_context(&root).await;

    ctx.add_discourse(cat_dog("d1")).await.unwrap();
    assert!(ctx.with_graph(|graph| graph.active_constraints().is_empty()).await);

    assert!(ctx.add_discourse(cat_dog("d1")).await.is_err());
    let active = ctx.with_graph(|graph| graph.active_constraints().clone()).await;
    assert!(active.is_empty(), "constraints left active: {active:?}");

    // indexes persist across loads
    assert!(ctx.with_graph(|graph| !graph.indexes().is_empty()).await);
}

#[tokio::test]
async fn test_second_discourse_accumulates_frequency() {
    let root = TempDir::new().unwrap();
    let ctx = open_context(&root).await;

    ctx.add_discourse(cat_dog("d1")).await.unwrap();
    ctx.add_discourse(cat_dog("d2")).await.unwrap();

    let cat = db::words::load_word(&ctx.db, "cat", "k.æ.t").await.unwrap().unwrap();
    assert_eq!(cat.frequency, 2);
    assert_eq!(db::words::word_count(&ctx.db).await.unwrap(), 2);

    // type nodes are shared across discourses
    let word_types = ctx
        .with_graph(|graph| {
            graph
                .type_nodes("test")
                .into_iter()
                .filter(|t| t.key.annotation_type == "word")
                .count()
        })
        .await;
    assert_eq!(word_types, 2);

    ctx.remove_discourse("d1").await.unwrap();
    assert_eq!(ctx.discourses().await.unwrap(), vec!["d2".to_string()]);
    let names = ctx.with_graph(|graph| graph.discourse_names("test")).await;
    assert_eq!(names, vec!["d2".to_string()]);
}

#[tokio::test]
async fn test_independent_runs_agree() {
    let mut results = Vec::new();
    for _ in 0..2 {
        let root = TempDir::new().unwrap();
        let ctx = open_context(&root).await;
        let summary = ctx.add_discourse(cat_dog("d1")).await.unwrap();
        let cat = db::words::load_word(&ctx.db, "cat", "k.æ.t").await.unwrap().unwrap();
        results.push((summary.spans, summary.anchors, cat.frequency));
    }
    assert_eq!(results[0], results[1]);
}

#[tokio::test]
async fn test_relational_failure_reports_partial_import() {
    let root = TempDir::new().unwrap();
    let ctx = open_context(&root).await;
    ctx.db.close().await;

    let err = ctx.add_discourse(cat_dog("d1")).await.unwrap_err();
    match err {
        ImportError::PartialImport { discourse, .. } => assert_eq!(discourse, "d1"),
        other => panic!("expected PartialImport, got {other:?}"),
    }

    // the graph kept the discourse, the lexicon did not change
    let loaded = ctx.with_graph(|graph| graph.discourse("test", "d1").is_some()).await;
    assert!(loaded);
    assert!(ctx.lexicon().await.is_empty());
    assert!(ctx.state().await.relationship_types.contains("word"));
}

#[tokio::test]
async fn test_cyclic_hierarchy_touches_no_store() {
    let root = TempDir::new().unwrap();
    let ctx = open_context(&root).await;

    let mut data = cat_dog("d1");
    data.insert(AnnotationType::new("a").with_supertype("b"));
    data.insert(AnnotationType::new("b").with_supertype("a"));

    let err = ctx.add_discourse(data).await.unwrap_err();
    assert!(matches!(err, ImportError::Common(_)));
    let names = ctx.with_graph(|graph| graph.discourse_names("test")).await;
    assert!(names.is_empty());
    assert!(ctx.discourses().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_timed_import_uses_segment_times() {
    let root = TempDir::new().unwrap();
    let ctx = open_context(&root).await;

    let mut word = AnnotationType::new("word").anchor();
    word.add([Annotation::new("hi").with_reference("phone", 0, 2)], true);
    let mut phone = AnnotationType::new("phone").base().with_supertype("word");
    phone.add([Segment::timed("h", 0.5, 0.6), Segment::timed("aɪ", 0.6, 0.9)], true);
    let data = DiscourseData::new("timed", [word, phone]);

    let summary = ctx.add_discourse(data).await.unwrap();
    assert!(summary.is_timed);
    assert_eq!(summary.anchors, 3);
    assert!(ctx.state().await.is_timed);

    let extent = ctx
        .with_graph(|graph| {
            let discourse = graph.discourse("test", "timed").unwrap();
            let span = discourse.spans_of_type("word").next().unwrap();
            (
                discourse.anchor(span.begin).unwrap().key.as_f64(),
                discourse.anchor(span.end).unwrap().key.as_f64(),
            )
        })
        .await;
    assert_eq!(extent, (0.5, 0.9));
}

#[tokio::test]
async fn test_speaker_tiers_collapse_before_projection() {
    let root = TempDir::new().unwrap();
    let ctx = open_context(&root).await;

    let mut tiers = Vec::new();
    for (speaker, label, phones) in [("A", "cat", ["k", "æ", "t"]), ("B", "dog", ["d", "ɒ", "g"])] {
        let mut word = AnnotationType::new(format!("{speaker} - word")).anchor().with_speaker(speaker);
        word.add([Annotation::new(label).with_reference(format!("{speaker} - phone"), 0, 3)], true);
        let mut phone = AnnotationType::new(format!("{speaker} - phone"))
            .base()
            .with_supertype(format!("{speaker} - word"))
            .with_speaker(speaker);
        phone.add(phones.map(Segment::new), true);
        tiers.push(word);
        tiers.push(phone);
    }

    let summary = ctx.add_discourse(DiscourseData::new("dialogue", tiers)).await.unwrap();
    assert_eq!(summary.spans["word"], 2);
    assert_eq!(summary.spans["phone"], 6);
    assert_eq!(summary.anchors, 7);
    assert!(db::words::load_word(&ctx.db, "dog", "d.ɒ.g").await.unwrap().is_some());
}

#[tokio::test]
async fn test_annotation_type_lookup() {
    let root = TempDir::new().unwrap();
    let ctx = open_context(&root).await;
    ctx.add_discourse(cat_dog("d1")).await.unwrap();

    assert_eq!(ctx.annotation_type("phone").await.unwrap(), Some("word".to_string()));
    assert_eq!(ctx.annotation_type("word").await.unwrap(), None);

    let err = ctx.annotation_type("syllable").await.unwrap_err();
    match err {
        ImportError::UnknownAnnotationType { name, available } => {
            assert_eq!(name, "syllable");
            assert!(available.contains("phone"));
            assert!(available.contains("word"));
        }
        other => panic!("expected UnknownAnnotationType, got {other:?}"),
    }
}

#[tokio::test]
async fn test_acoustics_require_sound_files() {
    let root = TempDir::new().unwrap();
    let ctx = open_context(&root).await;
    ctx.add_discourse(cat_dog("d1")).await.unwrap();

    assert!(!ctx.has_sound_files().await.unwrap());
    assert!(matches!(ctx.analyze_acoustics().await, Err(ImportError::NoSoundFiles(_))));
    assert!(matches!(ctx.query_acoustics("word").await, Err(ImportError::NoSoundFiles(_))));
}

#[tokio::test]
async fn test_sound_file_runs_analyzer() {
    let root = TempDir::new().unwrap();
    let analyzer = Arc::new(RecordingAnalyzer::default());
    let ctx = open_context(&root).await.with_acoustics(analyzer.clone());

    let wav: PathBuf = root.path().join("d1.wav");
    std::fs::write(&wav, b"RIFF").unwrap();
    let mut data = cat_dog("d1");
    data.wav_path = Some(wav.clone());

    let summary = ctx.add_discourse(data).await.unwrap();
    assert!(summary.acoustics_run);
    assert_eq!(ctx.discourse_sound_file("d1").await.unwrap(), Some(wav.clone()));

    let files = ctx.query_acoustics("phone").await.unwrap();
    assert_eq!(files, vec![("d1".to_string(), wav)]);

    assert_eq!(ctx.analyze_acoustics().await.unwrap(), 1);
    assert_eq!(*analyzer.seen.lock().unwrap(), vec!["d1".to_string(), "d1".to_string()]);
}

#[tokio::test]
async fn test_close_persists_state() {
    let root = TempDir::new().unwrap();
    let ctx = open_context(&root).await;
    ctx.add_discourse(cat_dog("d1")).await.unwrap();
    ctx.close().await.unwrap();

    let paths = CorpusPaths::new(root.path(), "test");
    let state = CorpusState::load(&paths.state_path()).unwrap();
    assert!(state.relationship_types.contains("phone"));
    assert_eq!(state.hierarchy["phone"], Some("word".to_string()));
    assert!(!paths.temp_dir.exists());
}
