//! Chunked report assembly against the sled-backed store.

use crate::integration::test_utils::{project_dataset, ProjectSeed, ScriptedGenerator};
use benchline::delay::RecordingSleeper;
use benchline::error::ReportError;
use benchline::model::{SectionKind, TemplateTier};
use benchline::report::{BuildRequest, BuilderConfig, ChunkedReportBuilder, ReportBuilder};
use benchline::store::{EntityStore, SledEntityStore};
use std::sync::Arc;
use tempfile::TempDir;

fn sled_store(dir: &TempDir, seed: ProjectSeed<'_>) -> Arc<SledEntityStore> {
    let store = SledEntityStore::open(dir.path().join("store")).unwrap();
    store.import(&project_dataset(&seed)).unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_peers_processed_in_bounded_chunks_with_overflow_summary() {
    let dir = TempDir::new().unwrap();
    let store = sled_store(&dir, ProjectSeed::active("proj-chunks", 7));
    let config = BuilderConfig {
        chunk_size: 3,
        max_peer_sections: 5,
        ..BuilderConfig::default()
    };
    let sleeper = Arc::new(RecordingSleeper::new());
    let generator = Arc::new(ScriptedGenerator::new());
    let builder = ChunkedReportBuilder::new(store.clone(), generator.clone(), config)
        .with_sleeper(sleeper.clone());

    let report = builder
        .build(&BuildRequest::new("proj-chunks", TemplateTier::Comprehensive))
        .await
        .unwrap();

    assert_eq!(report.metadata.chunk_sizes, vec![3, 3, 1]);
    assert_eq!(report.metadata.peer_count, 7);
    assert_eq!(report.peer_sections().count(), 5);
    // overflow peers are summarised, never sent to the generator
    assert_eq!(generator.calls(), 5);
    assert_eq!(sleeper.requested().len(), 2);

    let kinds: Vec<_> = report.sections.iter().map(|s| s.kind).collect();
    assert_eq!(kinds[5], SectionKind::AdditionalPeers);
    assert_eq!(kinds[6], SectionKind::Recommendations);
    assert!(report
        .sections
        .iter()
        .enumerate()
        .all(|(i, s)| s.position == i));
    assert!(report.version.content.contains("## Additional peers"));
    assert!(report.version.content.starts_with("# Initial comparative report"));

    let stored = store
        .find_initial_report("proj-chunks")
        .await
        .unwrap()
        .expect("persisted report");
    assert_eq!(stored.id, report.id);
}

#[tokio::test]
async fn test_second_build_resolves_to_existing_initial_report() {
    let dir = TempDir::new().unwrap();
    let store = sled_store(&dir, ProjectSeed::active("proj-twice", 2));
    let builder = ChunkedReportBuilder::new(
        store.clone(),
        Arc::new(ScriptedGenerator::new()),
        BuilderConfig::default(),
    )
    .with_sleeper(Arc::new(RecordingSleeper::new()));
    let request = BuildRequest::new("proj-twice", TemplateTier::Standard);

    let first = builder.build(&request).await.unwrap();
    let second = builder.build(&request).await.unwrap();

    assert_eq!(first.id, second.id);
    let stored = store.get_report(&first.id).await.unwrap().unwrap();
    assert!(stored.is_initial);
}

#[tokio::test]
async fn test_missing_project_fails_with_storage_error() {
    let dir = TempDir::new().unwrap();
    let store = sled_store(&dir, ProjectSeed::active("proj-present", 1));
    let builder = ChunkedReportBuilder::new(
        store,
        Arc::new(ScriptedGenerator::new()),
        BuilderConfig::default(),
    );

    let err = builder
        .build(&BuildRequest::new("proj-absent", TemplateTier::Basic))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Storage(ref msg) if msg.contains("proj-absent")));
}
