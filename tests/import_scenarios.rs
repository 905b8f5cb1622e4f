//! Import Scenario Tests
//!
//! End-to-end runs of the orchestrator against deterministic fakes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use shelfsync::core::{ImportLimits, RunControl};
use shelfsync::domain::{ImportState, RunFailure};
use tokio_test::assert_ok;

#[tokio::test]
async fn test_duplicates_collapse_and_dlc_is_unmatched() {
    let catalog = Arc::new(FakeCatalog::new(vec![
        game(1, "Foo Game", Some(80.0)),
        dlc(2, "Bar DLC"),
    ]));
    let source = Arc::new(
        FakeSource::new(&[("10", "Foo Game™"), ("11", "Foo Game"), ("12", "Bar DLC")])
            .with_achievements("10", 7, 10),
    );
    let store = Arc::new(MemoryStore::default());

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.state, ImportState::Done);
    let summary = assert_ok!(run.outcome());
    assert_eq!(summary.imported_count, 1);
    assert_eq!(summary.unmatched_total, 1);
    assert_eq!(summary.unmatched_sample, vec!["Bar DLC".to_string()]);

    // Both spellings go out as a single name
    let batches = catalog.batch_calls();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], vec!["Foo Game".to_string(), "Bar DLC".to_string()]);

    // The first-seen source entry supplies the progress
    let owned = store.entries(USER);
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].catalog_id, 1);
    assert_eq!(owned[0].progress_percent, 70);
    assert_eq!(source.achievement_calls(), vec!["10".to_string()]);
}

#[tokio::test]
async fn test_failed_batch_falls_through_to_search() {
    let catalog = Arc::new(
        FakeCatalog::new(vec![game(1, "Alpha", Some(70.0)), game(2, "Beta", None)])
            .fail_batch_with("Alpha"),
    );
    let source = Arc::new(FakeSource::new(&[("1", "Alpha"), ("2", "Beta")]));
    let store = Arc::new(MemoryStore::default());

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.state, ImportState::Done);
    assert_eq!(run.summary.imported_count, 2);
    assert_eq!(run.summary.unmatched_total, 0);
    assert_eq!(
        catalog.search_calls(),
        vec!["Alpha".to_string(), "Beta".to_string()]
    );
}

#[tokio::test]
async fn test_persistence_failure_writes_nothing() {
    let catalog = Arc::new(FakeCatalog::new(vec![
        game(1, "Alpha", Some(70.0)),
        game(2, "Beta", Some(60.0)),
    ]));
    let source = Arc::new(FakeSource::new(&[("1", "Alpha"), ("2", "Beta")]));
    let store = Arc::new(MemoryStore::default());
    store.fail_writes();

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.state, ImportState::Failed);
    assert!(matches!(run.failure, Some(RunFailure::Persistence { .. })));
    assert_eq!(run.summary.imported_count, 0);
    assert!(store.entries(USER).is_empty());
}

#[tokio::test]
async fn test_second_run_imports_nothing_new() {
    let catalog = Arc::new(FakeCatalog::new(vec![
        game(1, "Alpha", Some(70.0)),
        game(2, "Beta", Some(60.0)),
    ]));
    let source = Arc::new(FakeSource::new(&[("1", "Alpha"), ("2", "Beta")]));
    let store = Arc::new(MemoryStore::default());
    let orch = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled());

    let first = orch.run_import(USER, STEAM_ID, &RunControl::new()).await;
    assert_eq!(first.summary.imported_count, 2);

    let second = orch.run_import(USER, STEAM_ID, &RunControl::new()).await;
    assert_eq!(second.state, ImportState::Done);
    assert_eq!(second.summary.imported_count, 0);
    assert_eq!(second.summary.unmatched_total, 0);
    assert_eq!(store.entries(USER).len(), 2);
}

#[tokio::test]
async fn test_already_owned_titles_are_skipped() {
    let catalog = Arc::new(FakeCatalog::new(vec![
        game(1, "Alpha", Some(70.0)),
        game(2, "Beta", Some(60.0)),
    ]));
    let source = Arc::new(FakeSource::new(&[("1", "Alpha"), ("2", "Beta")]));
    let store = Arc::new(MemoryStore::with_owned(USER, &[1]));

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.summary.imported_count, 1);
    assert_eq!(source.achievement_calls(), vec!["2".to_string()]);
    let ids: Vec<_> = store.entries(USER).iter().map(|e| e.catalog_id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_case_variants_import_once() {
    let catalog = Arc::new(FakeCatalog::new(vec![game(5, "Gamma", Some(88.0))]));
    let source = Arc::new(FakeSource::new(&[("1", "Gamma"), ("2", "gamma")]));
    let store = Arc::new(MemoryStore::default());

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.summary.imported_count, 1);
    assert_eq!(catalog.batch_calls(), vec![vec!["Gamma".to_string()]]);
    assert_eq!(source.achievement_calls(), vec!["1".to_string()]);
}

#[tokio::test]
async fn test_batch_and_search_hits_on_one_title_import_once() {
    // "Foo Game" resolves by exact name; "Foo" only through search, to the same id
    let catalog = Arc::new(FakeCatalog::new(vec![game(1, "Foo Game", Some(80.0))]));
    let source = Arc::new(
        FakeSource::new(&[("1", "Foo Game"), ("2", "Foo")]).with_achievements("1", 1, 2),
    );
    let store = Arc::new(MemoryStore::default());

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.state, ImportState::Done);
    assert_eq!(catalog.search_calls(), vec!["Foo".to_string()]);
    assert_eq!(run.summary.imported_count, 1);
    assert_eq!(run.summary.unmatched_total, 0);

    let owned = store.entries(USER);
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].catalog_id, 1);
    assert_eq!(owned[0].progress_percent, 50);
    assert_eq!(source.achievement_calls(), vec!["1".to_string()]);
}

#[tokio::test]
async fn test_achievement_failure_defaults_progress_to_zero() {
    let catalog = Arc::new(FakeCatalog::new(vec![
        game(1, "Alpha", Some(70.0)),
        game(2, "Beta", Some(60.0)),
    ]));
    let source = Arc::new(
        FakeSource::new(&[("1", "Alpha"), ("2", "Beta")])
            .fail_achievements_for("1")
            .with_achievements("2", 1, 8),
    );
    let store = Arc::new(MemoryStore::default());

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.state, ImportState::Done);
    assert_eq!(run.summary.imported_count, 2);
    assert_eq!(store.progress_of(USER, 1), Some(0));
    assert_eq!(store.progress_of(USER, 2), Some(13));
}

#[tokio::test]
async fn test_source_unavailable_fails_run() {
    let catalog = Arc::new(FakeCatalog::default());
    let source = Arc::new(FakeSource::unavailable());
    let store = Arc::new(MemoryStore::default());

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.state, ImportState::Failed);
    match run.outcome() {
        Err(RunFailure::SourceUnavailable { error }) => assert!(error.contains("private")),
        other => panic!("expected SourceUnavailable, got {:?}", other),
    }
    assert!(catalog.batch_calls().is_empty());
}

#[tokio::test]
async fn test_empty_library_is_nothing_to_import() {
    let catalog = Arc::new(FakeCatalog::default());
    let source = Arc::new(FakeSource::new(&[]));
    let store = Arc::new(MemoryStore::default());

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.state, ImportState::Done);
    assert!(run.summary.nothing_to_import);
    assert_eq!(run.summary.imported_count, 0);
    assert!(catalog.batch_calls().is_empty());
}

#[tokio::test]
async fn test_owned_library_read_failure_fails_run() {
    let catalog = Arc::new(FakeCatalog::new(vec![game(1, "Alpha", None)]));
    let source = Arc::new(FakeSource::new(&[("1", "Alpha")]));
    let store = Arc::new(MemoryStore::default());
    store.fail_reads();

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.state, ImportState::Failed);
    assert!(matches!(run.failure, Some(RunFailure::Persistence { .. })));
    assert!(catalog.batch_calls().is_empty());
}

#[tokio::test]
async fn test_unmatched_sample_is_capped() {
    let titles: Vec<(String, String)> = (0..15)
        .map(|i| (i.to_string(), format!("Obscure Title {}", i)))
        .collect();
    let refs: Vec<(&str, &str)> = titles
        .iter()
        .map(|(id, name)| (id.as_str(), name.as_str()))
        .collect();

    let catalog = Arc::new(FakeCatalog::default());
    let source = Arc::new(FakeSource::new(&refs));
    let store = Arc::new(MemoryStore::default());

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.summary.unmatched_total, 15);
    assert_eq!(run.summary.unmatched_sample.len(), 10);
    assert_eq!(run.summary.unmatched_sample[0], "Obscure Title 0");
    assert_eq!(run.summary.unmatched_sample[9], "Obscure Title 9");
}

#[tokio::test]
async fn test_blank_names_are_reported_unmatched() {
    let catalog = Arc::new(FakeCatalog::new(vec![game(1, "Alpha", None)]));
    let source = Arc::new(FakeSource::new(&[("1", "™"), ("2", "Alpha"), ("3", "™")]));
    let store = Arc::new(MemoryStore::default());

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &RunControl::new())
        .await;

    assert_eq!(run.summary.imported_count, 1);
    assert_eq!(run.summary.unmatched_sample, vec!["™".to_string()]);
    // Blank names never reach the catalog
    assert_eq!(catalog.batch_calls(), vec![vec!["Alpha".to_string()]]);
    assert!(catalog.search_calls().is_empty());
}

#[tokio::test]
async fn test_cancellation_persists_nothing() {
    let control = RunControl::new();
    let catalog = Arc::new(
        FakeCatalog::new(vec![game(1, "Alpha", None)]).cancel_on_search(control.clone()),
    );
    let source = Arc::new(FakeSource::new(&[
        ("1", "Alpha"),
        ("2", "Unknown A"),
        ("3", "Unknown B"),
    ]));
    let store = Arc::new(MemoryStore::default());

    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &control)
        .await;

    assert_eq!(run.state, ImportState::Cancelled);
    assert!(matches!(run.failure, Some(RunFailure::Cancelled { .. })));
    // Cancelled before the second search went out
    assert_eq!(catalog.search_calls(), vec!["Unknown A".to_string()]);
    assert!(store.entries(USER).is_empty());
}

#[tokio::test]
async fn test_expired_deadline_cancels_before_fetching() {
    let catalog = Arc::new(FakeCatalog::new(vec![game(1, "Alpha", None)]));
    let source = Arc::new(FakeSource::new(&[("1", "Alpha")]));
    let store = Arc::new(MemoryStore::default());

    let control = RunControl::with_timeout(Duration::ZERO);
    let run = orchestrator(&catalog, &source, &store, ImportLimits::unthrottled())
        .run_import(USER, STEAM_ID, &control)
        .await;

    assert_eq!(run.state, ImportState::Cancelled);
    assert!(catalog.batch_calls().is_empty());
    assert!(store.entries(USER).is_empty());
}
