//! Retries with exponential backoff and degraded-content fallback.

use crate::integration::test_utils::{pipeline, seed, ProjectSeed, ScriptedGenerator};
use benchline::error::ReportError;
use benchline::generation::{GenerationContext, GenerationService};
use benchline::model::{ReportQuality, SectionSource};
use benchline::provider::DisabledGenerator;
use benchline::store::{EntityStore, MemoryEntityStore};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_rate_limited_attempts_back_off_then_succeed_degraded() {
    let store = Arc::new(MemoryEntityStore::new());
    seed(&store, ProjectSeed::active("proj-rl", 3));
    let p = pipeline(store.clone(), Arc::new(ScriptedGenerator::new()), 2);

    let result = p
        .coordinator
        .ensure_initial_report("proj-rl", &GenerationContext::default())
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.attempts, 3);
    assert!(result.fallback_used);
    assert_eq!(
        p.sleeper.requested(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );

    let requests = p.builder.requests.lock();
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests.iter().map(|r| r.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(requests[1..].iter().all(|r| r.allow_fallback));
    assert!(requests[1..].iter().all(|r| !r.require_fresh_snapshots));
}

#[tokio::test]
async fn test_backfill_origin_gets_the_small_retry_budget() {
    let store = Arc::new(MemoryEntityStore::new());
    seed(&store, ProjectSeed::active("proj-bf", 2));
    let p = pipeline(store.clone(), Arc::new(ScriptedGenerator::new()), 10);

    let result = p
        .coordinator
        .ensure_initial_report("proj-bf", &GenerationContext::backfill())
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    match &result.error {
        Some(ReportError::PermanentGeneration {
            attempts,
            last_error,
        }) => {
            assert_eq!(*attempts, 2);
            assert!(last_error.contains("rate limit"), "{}", last_error);
        }
        other => panic!("expected permanent failure, got {:?}", other),
    }
    assert_eq!(p.sleeper.requested(), vec![Duration::from_secs(2)]);
    assert!(store.find_initial_report("proj-bf").await.unwrap().is_none());
    assert!(!p.coordinator.in_flight().contains("proj-bf"));
}

#[tokio::test]
async fn test_single_peer_failure_is_templated_without_retry() {
    let store = Arc::new(MemoryEntityStore::new());
    seed(&store, ProjectSeed::active("proj-mix", 3));
    let generator = Arc::new(ScriptedGenerator::new().failing_for("Peer 1"));
    let p = pipeline(store.clone(), generator.clone(), 0);

    let result = p
        .coordinator
        .ensure_initial_report("proj-mix", &GenerationContext::default())
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.attempts, 1);
    assert!(result.fallback_used);
    assert_eq!(generator.calls(), 3);

    let report = store
        .find_initial_report("proj-mix")
        .await
        .unwrap()
        .expect("initial report");
    let sources: Vec<_> = report.peer_sections().map(|s| s.source).collect();
    assert_eq!(
        sources
            .iter()
            .filter(|s| **s == SectionSource::Template)
            .count(),
        1
    );
    assert_eq!(report.metadata.generated_sections, 2);
    assert_eq!(report.metadata.fallback_sections, 1);
}

#[tokio::test]
async fn test_unavailable_provider_yields_fully_templated_report() {
    let store = Arc::new(MemoryEntityStore::new());
    seed(&store, ProjectSeed::active("proj-off", 3));
    let p = pipeline(store.clone(), Arc::new(DisabledGenerator::new()), 0);

    let result = p
        .coordinator
        .ensure_initial_report("proj-off", &GenerationContext::default())
        .await;

    // the first attempt refuses an all-template report, the degraded retry accepts it
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.attempts, 2);
    assert!(result.fallback_used);

    let report = store
        .find_initial_report("proj-off")
        .await
        .unwrap()
        .expect("initial report");
    assert!(report
        .peer_sections()
        .all(|s| s.source == SectionSource::Template));
    assert_eq!(report.metadata.generated_sections, 0);
    assert!(report.metadata.quality < ReportQuality::High);
}
