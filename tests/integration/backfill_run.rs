//! Backfill runs driving the real coordinator over a seeded store.

use crate::integration::test_utils::{pipeline, seed, ProjectSeed, ScriptedGenerator};
use benchline::backfill::{
    BackfillConfig, BackfillOptions, BatchBackfillScheduler, PriorityTier, ProjectOutcome,
};
use benchline::delay::RecordingSleeper;
use benchline::generation::{GenerationContext, GenerationService};
use benchline::model::{ProjectStatus, ReportStatus};
use benchline::store::{EntityStore, MemoryEntityStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    store: Arc<MemoryEntityStore>,
    scheduler: BatchBackfillScheduler,
    sleeper: Arc<RecordingSleeper>,
}

async fn fixture(generator: ScriptedGenerator) -> Fixture {
    let store = Arc::new(MemoryEntityStore::new());
    for (id, age_days) in [("proj-fresh", 1), ("proj-month", 40), ("proj-old", 100)] {
        seed(
            &store,
            ProjectSeed {
                age_days,
                ..ProjectSeed::active(id, 3)
            },
        );
    }
    seed(&store, ProjectSeed::active("proj-done", 3));
    seed(
        &store,
        ProjectSeed {
            status: ProjectStatus::Archived,
            ..ProjectSeed::active("proj-archived", 3)
        },
    );

    let p = pipeline(store.clone(), Arc::new(generator), 0);
    let existing = p
        .coordinator
        .ensure_initial_report("proj-done", &GenerationContext::default())
        .await;
    assert!(existing.success);

    let sleeper = Arc::new(RecordingSleeper::new());
    let scheduler = BatchBackfillScheduler::new(
        store.clone(),
        p.coordinator.clone(),
        BackfillConfig::default(),
    )
    .with_sleeper(sleeper.clone());
    Fixture {
        store,
        scheduler,
        sleeper,
    }
}

fn options(output: &TempDir) -> BackfillOptions {
    BackfillOptions {
        batch_size: 2,
        max_concurrent_projects: 1,
        output_dir: Some(output.path().to_path_buf()),
        ..BackfillOptions::default()
    }
}

#[tokio::test]
async fn test_backfill_generates_missing_reports_in_priority_order() {
    let output = TempDir::new().unwrap();
    let f = fixture(ScriptedGenerator::new()).await;

    let summary = f.scheduler.run(&options(&output)).await.unwrap();

    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.already_reported, 1);
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.success_rate, 100.0);
    assert!(!summary.stopped_early);
    assert_eq!(summary.tiers.high, 3);

    let order: Vec<_> = summary.results.iter().map(|r| r.project_id.as_str()).collect();
    assert_eq!(order, vec!["proj-fresh", "proj-month", "proj-old"]);
    assert_eq!(summary.batches.len(), 2);
    assert_eq!(summary.batches[0].project_ids.len(), 2);

    // one group pause inside the first batch, one pause between batches
    assert_eq!(
        f.sleeper.requested(),
        vec![Duration::from_millis(1_000), Duration::from_millis(2_000)]
    );

    for id in ["proj-fresh", "proj-month", "proj-old"] {
        let report = f.store.find_initial_report(id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Completed);
    }
    assert!(f.store.reports_for_project("proj-archived").is_empty());

    assert_eq!(summary.artifacts.len(), 2);
    assert!(summary.json_path(output.path()).exists());
    let markdown = std::fs::read_to_string(summary.markdown_path(output.path())).unwrap();
    assert!(markdown.contains("Project proj-month"));
}

#[tokio::test]
async fn test_second_run_finds_nothing_left() {
    let output = TempDir::new().unwrap();
    let f = fixture(ScriptedGenerator::new()).await;
    f.scheduler.run(&options(&output)).await.unwrap();

    let again = f.scheduler.run(&options(&output)).await.unwrap();
    assert_eq!(again.candidates, 0);
    assert_eq!(again.already_reported, 4);
    assert_eq!(again.total_processed, 0);
    assert_eq!(again.success_rate, 100.0);
}

#[tokio::test]
async fn test_dry_run_plans_without_generating() {
    let output = TempDir::new().unwrap();
    let f = fixture(ScriptedGenerator::new()).await;
    let opts = BackfillOptions {
        dry_run: true,
        ..options(&output)
    };

    let summary = f.scheduler.run(&opts).await.unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.results.len(), 3);
    assert!(summary
        .results
        .iter()
        .all(|r| r.outcome == ProjectOutcome::Planned));
    assert_eq!(summary.total_processed, 0);
    assert!(f.sleeper.requested().is_empty());
    assert!(f.store.reports_for_project("proj-fresh").is_empty());
}

#[tokio::test]
async fn test_age_window_and_tier_filter_narrow_the_plan() {
    let output = TempDir::new().unwrap();
    let f = fixture(ScriptedGenerator::new()).await;

    let opts = BackfillOptions {
        min_age_days: 30,
        ..options(&output)
    };
    let (candidates, _) = f.scheduler.plan(&opts).await.unwrap();
    let ids: Vec<_> = candidates.iter().map(|c| c.project_id.as_str()).collect();
    assert_eq!(ids, vec!["proj-month", "proj-old"]);

    let opts = BackfillOptions {
        max_age_days: Some(30),
        priority_filter: Some(PriorityTier::Low),
        ..options(&output)
    };
    let (candidates, _) = f.scheduler.plan(&opts).await.unwrap();
    assert!(candidates.is_empty());
}
