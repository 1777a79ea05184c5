//! Auto-repair of projects with no peers or a draft status.

use crate::integration::test_utils::{pipeline, project_dataset, seed, ProjectSeed, ScriptedGenerator};
use benchline::error::ReportError;
use benchline::generation::{
    auto_repair, CoordinatorConfig, GenerationContext, GenerationCoordinator, GenerationService,
};
use benchline::model::ProjectStatus;
use benchline::provider::DisabledGenerator;
use benchline::report::{BuilderConfig, ChunkedReportBuilder};
use benchline::store::MemoryEntityStore;
use benchline::validation::{CheckKind, PrerequisiteValidator, ValidateOptions, ValidatorConfig};
use std::sync::Arc;

/// A draft project with no peers, plus three unattached peers in the store.
fn repairable_store() -> Arc<MemoryEntityStore> {
    let store = MemoryEntityStore::new();
    seed(
        &store,
        ProjectSeed {
            id: "proj-empty",
            status: ProjectStatus::Draft,
            peers: 0,
            with_subject: true,
            age_days: 2,
        },
    );
    let mut donor = project_dataset(&ProjectSeed::active("pool", 3));
    donor.projects.clear();
    donor.subjects.clear();
    store.import(donor);
    Arc::new(store)
}

#[tokio::test]
async fn test_repair_clears_blocking_issues() {
    let store = repairable_store();
    let validator = PrerequisiteValidator::new(store.clone(), ValidatorConfig::default());
    let options = ValidateOptions::default();

    let before = validator.validate("proj-empty", &options).await;
    assert!(!before.can_proceed);
    assert!(before
        .blocking_issues
        .iter()
        .any(|issue| issue.contains("no peers")));
    assert!(!before.check(CheckKind::ProjectActive).unwrap().passed);

    let outcome = auto_repair(store.as_ref(), "proj-empty", 5).await.unwrap();
    assert_eq!(outcome.attached_peers.len(), 3);
    assert!(outcome.activated);

    let after = validator.validate("proj-empty", &options).await;
    assert!(after.blocking_issues.is_empty(), "{:?}", after.blocking_issues);
    assert!(after.can_proceed);
    assert_eq!(store.project("proj-empty").unwrap().status, ProjectStatus::Active);
}

#[tokio::test]
async fn test_coordinator_repairs_then_generates() {
    let store = repairable_store();
    let p = pipeline(store.clone(), Arc::new(ScriptedGenerator::new()), 0);

    let result = p
        .coordinator
        .ensure_initial_report("proj-empty", &GenerationContext::default())
        .await;

    assert!(result.success, "{:?}", result.error);
    let project = store.project("proj-empty").unwrap();
    assert_eq!(project.peer_ids.len(), 3);
    assert_eq!(project.status, ProjectStatus::Active);
    assert_eq!(store.reports_for_project("proj-empty").len(), 1);
}

#[tokio::test]
async fn test_disabled_repair_leaves_project_blocked() {
    let store = repairable_store();
    let builder = Arc::new(ChunkedReportBuilder::new(
        store.clone(),
        Arc::new(DisabledGenerator::new()),
        BuilderConfig::default(),
    ));
    let coordinator = GenerationCoordinator::new(
        store.clone(),
        PrerequisiteValidator::new(store.clone(), ValidatorConfig::default()),
        builder,
        CoordinatorConfig {
            auto_repair: false,
            ..CoordinatorConfig::default()
        },
    );

    let result = coordinator
        .ensure_initial_report("proj-empty", &GenerationContext::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 0);
    match result.error {
        Some(ReportError::ValidationBlocked { issues }) => {
            assert!(issues.iter().any(|i| i.contains("no peers")), "{:?}", issues);
        }
        other => panic!("expected blocked validation, got {:?}", other),
    }
    assert_eq!(store.project("proj-empty").unwrap().status, ProjectStatus::Draft);
    assert_eq!(store.report_count(), 0);
}
