//! End-to-end generation against the sled store, including reopen.

use crate::integration::test_utils::{pipeline, project_dataset, ProjectSeed, ScriptedGenerator};
use benchline::generation::{GenerationContext, GenerationService};
use benchline::model::{ProjectStatus, ReportStatus};
use benchline::store::{EntityStore, ProjectFilter, SledEntityStore};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_import_and_filter_projects() {
    let dir = TempDir::new().unwrap();
    let store = SledEntityStore::open(dir.path()).unwrap();
    let mut dataset = project_dataset(&ProjectSeed::active("proj-live", 2));
    let paused = project_dataset(&ProjectSeed {
        id: "proj-paused",
        status: ProjectStatus::Paused,
        peers: 1,
        with_subject: false,
        age_days: 40,
    });
    dataset.projects.extend(paused.projects);
    dataset.peers.extend(paused.peers);
    dataset.snapshots.extend(paused.snapshots);

    let records = store.import(&dataset).unwrap();
    assert_eq!(records, dataset.record_count());

    let active = store
        .list_projects(&ProjectFilter {
            statuses: vec![ProjectStatus::Active],
            ..ProjectFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "proj-live");

    let all = store.list_projects(&ProjectFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let records = store
        .load_peers(&active[0].peer_ids, 5)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    // newest snapshot first
    assert!(records[0].snapshots[0].captured_at > records[0].snapshots[1].captured_at);
}

#[tokio::test]
async fn test_generated_report_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let report_id = {
        let store = Arc::new(SledEntityStore::open(dir.path()).unwrap());
        store
            .import(&project_dataset(&ProjectSeed::active("proj-durable", 3)))
            .unwrap();
        let p = pipeline(store.clone(), Arc::new(ScriptedGenerator::new()), 0);
        let result = p
            .coordinator
            .ensure_initial_report("proj-durable", &GenerationContext::default())
            .await;
        assert!(result.success, "{:?}", result.error);
        result.report_id.unwrap()
    };

    let store = Arc::new(SledEntityStore::open(dir.path()).unwrap());
    let report = store
        .find_initial_report("proj-durable")
        .await
        .unwrap()
        .expect("report after reopen");
    assert_eq!(report.id, report_id);
    assert_eq!(report.status, ReportStatus::Completed);

    // a fresh coordinator sees the stored report and does not rebuild
    let p = pipeline(store.clone(), Arc::new(ScriptedGenerator::new()), 0);
    let again = p
        .coordinator
        .ensure_initial_report("proj-durable", &GenerationContext::default())
        .await;
    assert!(again.already_existed);
    assert_eq!(again.report_id.as_deref(), Some(report_id.as_str()));
    assert_eq!(p.builder.calls(), 0);
}

#[tokio::test]
async fn test_failed_report_releases_the_initial_slot() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledEntityStore::open(dir.path()).unwrap());
    store
        .import(&project_dataset(&ProjectSeed::active("proj-retry", 2)))
        .unwrap();
    let p = pipeline(store.clone(), Arc::new(ScriptedGenerator::new()), 0);
    let context = GenerationContext::default();

    let first = p.coordinator.ensure_initial_report("proj-retry", &context).await;
    let first_id = first.report_id.unwrap();
    store
        .set_report_status(&first_id, ReportStatus::Failed)
        .await
        .unwrap();
    assert!(store.find_initial_report("proj-retry").await.unwrap().is_none());

    let second = p.coordinator.ensure_initial_report("proj-retry", &context).await;
    assert!(second.success);
    assert!(!second.already_existed);
    assert_ne!(second.report_id.as_deref(), Some(first_id.as_str()));
    assert_eq!(p.builder.calls(), 2);
}
