//! At most one generation per project, however many callers ask at once.

use crate::integration::test_utils::{pipeline, seed, ProjectSeed, ScriptedGenerator};
use benchline::generation::{GenerationContext, GenerationService};
use benchline::store::MemoryEntityStore;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_two_concurrent_calls_share_one_generation() {
    let store = Arc::new(MemoryEntityStore::new());
    seed(&store, ProjectSeed::active("proj-sf", 3));
    let generator = Arc::new(ScriptedGenerator::new().with_delay(Duration::from_millis(50)));
    let p = pipeline(store.clone(), generator, 0);
    let context = GenerationContext::default();

    let (first, second) = tokio::join!(
        p.coordinator.ensure_initial_report("proj-sf", &context),
        p.coordinator.ensure_initial_report("proj-sf", &context),
    );

    assert!(first.success, "{:?}", first.error);
    assert!(second.success, "{:?}", second.error);
    assert_eq!(first.report_id, second.report_id);
    assert_eq!(p.builder.calls(), 1);
    // exactly one of them attached to the other's generation
    assert!(first.deduplicated ^ second.deduplicated);
    assert_eq!(store.reports_for_project("proj-sf").len(), 1);
    assert_eq!(p.coordinator.in_flight().active_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_spawned_callers_get_the_same_report() {
    let store = Arc::new(MemoryEntityStore::new());
    seed(&store, ProjectSeed::active("proj-many", 4));
    let generator = Arc::new(ScriptedGenerator::new().with_delay(Duration::from_millis(20)));
    let p = pipeline(store.clone(), generator, 0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = p.coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .ensure_initial_report("proj-many", &GenerationContext::default())
                    .await
            })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert!(results.iter().all(|r| r.success));
    let report_id = results[0].report_id.clone();
    assert!(report_id.is_some());
    assert!(results.iter().all(|r| r.report_id == report_id));
    assert_eq!(p.builder.calls(), 1);
    assert_eq!(store.reports_for_project("proj-many").len(), 1);
}

#[tokio::test]
async fn test_different_projects_generate_independently() {
    let store = Arc::new(MemoryEntityStore::new());
    seed(&store, ProjectSeed::active("proj-a", 2));
    seed(&store, ProjectSeed::active("proj-b", 2));
    let generator = Arc::new(ScriptedGenerator::new().with_delay(Duration::from_millis(10)));
    let p = pipeline(store.clone(), generator, 0);
    let context = GenerationContext::default();

    let (a, b) = tokio::join!(
        p.coordinator.ensure_initial_report("proj-a", &context),
        p.coordinator.ensure_initial_report("proj-b", &context),
    );

    assert!(a.success && b.success);
    assert!(!a.deduplicated && !b.deduplicated);
    assert_ne!(a.report_id, b.report_id);
    assert_eq!(p.builder.calls(), 2);
}

#[tokio::test]
async fn test_repeat_call_after_completion_is_idempotent() {
    let store = Arc::new(MemoryEntityStore::new());
    seed(&store, ProjectSeed::active("proj-idem", 2));
    let p = pipeline(store.clone(), Arc::new(ScriptedGenerator::new()), 0);
    let context = GenerationContext::default();

    let first = p.coordinator.ensure_initial_report("proj-idem", &context).await;
    let second = p.coordinator.ensure_initial_report("proj-idem", &context).await;

    assert!(first.success && !first.already_existed);
    assert!(second.success && second.already_existed);
    assert_eq!(first.report_id, second.report_id);
    assert_eq!(second.attempts, 0);
    assert_eq!(p.builder.calls(), 1);
}
