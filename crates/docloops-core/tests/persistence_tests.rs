mod common;

use std::sync::Arc;

use common::{controller, ScriptedEvaluator, ScriptedImprover};
use docloops_core::{CycleArchive, CycleOptions, CycleRecord, Document, StopReason};
use docloops_history::{HistoryQuery, HistoryStore};
use tempfile::TempDir;
use tokio::task::JoinSet;

fn scripted() -> (Arc<ScriptedEvaluator>, Arc<ScriptedImprover>) {
    (
        Arc::new(ScriptedEvaluator::new(&[("v0", 60), ("v1", 75), ("v2", 74)])),
        Arc::new(ScriptedImprover::new(&["v1", "v2"])),
    )
}

#[tokio::test]
async fn test_cycle_is_recorded_in_history() {
    let (evaluator, improver) = scripted();
    let history = Arc::new(HistoryStore::in_memory());
    let controller = controller(&evaluator, &improver).with_history(history.clone());

    let document = Document::new("v0", "readme").with_filename("README.md");
    controller
        .run_cycle(document, &CycleOptions::default())
        .await
        .unwrap();

    let query = HistoryQuery::for_document("readme", "README.md");
    assert_eq!(history.evaluations(&query).len(), 3);

    let improvements = history.improvements(&query);
    assert_eq!(improvements.len(), 2);
    let mut gains: Vec<i64> = improvements.iter().map(|i| i.improvement).collect();
    gains.sort();
    assert_eq!(gains, vec![-1, 15]);

    let cycles = history.cycles(&query);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].score_trajectory, vec![60, 75, 74]);
    assert_eq!(cycles[0].final_score, 75);
    assert_eq!(cycles[0].total_improvement, 15);
    assert_eq!(cycles[0].stop_reason, "insufficient_improvement");
}

#[tokio::test]
async fn test_no_history_when_saving_disabled() {
    let (evaluator, improver) = scripted();
    let history = Arc::new(HistoryStore::in_memory());
    let controller = controller(&evaluator, &improver).with_history(history.clone());

    controller
        .run_cycle(Document::new("v0", "readme"), &CycleOptions::default().without_saving())
        .await
        .unwrap();

    let all = HistoryQuery::default();
    assert!(history.evaluations(&all).is_empty());
    assert!(history.improvements(&all).is_empty());
    assert!(history.cycles(&all).is_empty());
}

#[tokio::test]
async fn test_single_evaluation_uses_metadata_doc_id() {
    let (evaluator, improver) = scripted();
    let history = Arc::new(HistoryStore::in_memory());
    let controller = controller(&evaluator, &improver).with_history(history.clone());

    let mut metadata = docloops_eval::Metadata::new();
    metadata.insert("doc_id".into(), "guide".into());
    controller.evaluate("v0", "readme", &metadata).await.unwrap();
    controller
        .evaluate("v1", "readme", &Default::default())
        .await
        .unwrap();

    let named = history.evaluations(&HistoryQuery::for_document("readme", "guide"));
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].score, 60);

    let fingerprinted = history.evaluations(&HistoryQuery::for_document(
        "readme",
        docloops_eval::short_fingerprint("v1"),
    ));
    assert_eq!(fingerprinted.len(), 1);
}

#[tokio::test]
async fn test_archive_layout() {
    let temp = TempDir::new().unwrap();
    let (evaluator, improver) = scripted();
    let archive = CycleArchive::new(temp.path());
    let controller = controller(&evaluator, &improver).with_archive(archive.clone());

    let record = controller
        .run_cycle(
            Document::new("v0", "readme").with_filename("README.md"),
            &CycleOptions::default(),
        )
        .await
        .unwrap();

    let cycle_dir = archive.cycle_dir(&record);
    assert!(cycle_dir.starts_with(temp.path().join("readme")));
    assert!(!cycle_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .contains(':'));

    assert_eq!(std::fs::read_to_string(cycle_dir.join("original.md")).unwrap(), "v0");
    assert_eq!(std::fs::read_to_string(cycle_dir.join("final.md")).unwrap(), "v1");
    assert!(std::fs::read_to_string(cycle_dir.join("report.md"))
        .unwrap()
        .contains("Final Score: 75"));

    let json = std::fs::read_to_string(cycle_dir.join("cycle.json")).unwrap();
    let restored: CycleRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, record);

    for index in 1..=2 {
        let iter_dir = cycle_dir.join(format!("iteration_{}", index));
        for file in ["report.md", "before.md", "after.md", "eval_before.json", "eval_after.json"] {
            assert!(iter_dir.join(file).exists(), "missing {}/{}", index, file);
        }
    }
    assert_eq!(
        std::fs::read_to_string(cycle_dir.join("iteration_2").join("after.md")).unwrap(),
        "v2"
    );
}

#[tokio::test]
async fn test_archive_failure_does_not_fail_cycle() {
    let temp = TempDir::new().unwrap();
    // A file where the archive directory should be
    let blocked = temp.path().join("blocked");
    std::fs::write(&blocked, "not a directory").unwrap();

    let (evaluator, improver) = scripted();
    let controller = controller(&evaluator, &improver).with_archive(CycleArchive::new(&blocked));

    let record = controller
        .run_cycle(Document::new("v0", "readme"), &CycleOptions::default())
        .await
        .unwrap();
    assert_eq!(record.final_score, 75);
}

#[tokio::test]
async fn test_concurrent_cycles_share_history() {
    let evaluator = Arc::new(ScriptedEvaluator::new(&[("v0", 60), ("v1", 70)]));
    let history = Arc::new(HistoryStore::in_memory());

    let mut tasks = JoinSet::new();
    for i in 0..4 {
        let improver = Arc::new(ScriptedImprover::new(&["v1", "v1"]));
        let controller = controller(&evaluator, &improver).with_history(history.clone());
        tasks.spawn(async move {
            let document = Document::new("v0", "readme").with_filename(format!("doc{}.md", i));
            controller.run_cycle(document, &CycleOptions::default()).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let record = joined.unwrap().unwrap();
        assert_eq!(record.final_score, 70);
        assert_eq!(record.stop_reason, StopReason::InsufficientImprovement);
    }

    let cycles = history.cycles(&HistoryQuery::default());
    assert_eq!(cycles.len(), 4);
    let mut ids: Vec<&str> = cycles.iter().map(|c| c.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}
