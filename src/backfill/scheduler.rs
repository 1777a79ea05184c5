//! Batch backfill scheduler
//!
//! Finds projects without an initial report, orders them by priority, and
//! drives the generation service over sequential batches of concurrency-capped
//! groups. One project's failure never aborts its batch.

use crate::backfill::priority::{candidate_order, Candidate, PriorityTier};
use crate::backfill::summary::{
    BatchSummary, ProcessingResult, ProcessingSummary, ProjectOutcome, TierCounts,
};
use crate::delay::{Sleeper, TokioSleeper};
use crate::error::ReportError;
use crate::generation::{GenerationContext, GenerationService};
use crate::model::ProjectStatus;
use crate::store::{EntityStore, ProjectFilter};
use crate::types::new_run_id;
use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Backfill defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    pub batch_size: usize,
    pub max_concurrent_projects: usize,
    pub group_delay_ms: u64,
    pub batch_delay_ms: u64,
    pub high_threshold: u8,
    pub medium_threshold: u8,
    pub statuses: Vec<ProjectStatus>,
    pub min_age_days: u64,
    pub max_age_days: Option<u64>,
    pub continue_on_error: bool,
    pub output_dir: PathBuf,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_concurrent_projects: 3,
            group_delay_ms: 1_000,
            batch_delay_ms: 2_000,
            high_threshold: 70,
            medium_threshold: 40,
            statuses: vec![
                ProjectStatus::Active,
                ProjectStatus::Draft,
                ProjectStatus::Paused,
            ],
            min_age_days: 0,
            max_age_days: None,
            continue_on_error: true,
            output_dir: PathBuf::from("reports/backfill"),
        }
    }
}

/// Options for a single run, seeded from `BackfillConfig`
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillOptions {
    pub dry_run: bool,
    pub priority_filter: Option<PriorityTier>,
    pub statuses: Vec<ProjectStatus>,
    pub min_age_days: u64,
    pub max_age_days: Option<u64>,
    pub max_projects: Option<usize>,
    pub batch_size: usize,
    pub max_concurrent_projects: usize,
    pub continue_on_error: bool,
    /// Where summary artifacts go; `None` skips writing them
    pub output_dir: Option<PathBuf>,
}

impl BackfillOptions {
    pub fn from_config(config: &BackfillConfig) -> Self {
        Self {
            dry_run: false,
            priority_filter: None,
            statuses: config.statuses.clone(),
            min_age_days: config.min_age_days,
            max_age_days: config.max_age_days,
            max_projects: None,
            batch_size: config.batch_size,
            max_concurrent_projects: config.max_concurrent_projects,
            continue_on_error: config.continue_on_error,
            output_dir: Some(config.output_dir.clone()),
        }
    }
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self::from_config(&BackfillConfig::default())
    }
}

pub struct BatchBackfillScheduler {
    store: Arc<dyn EntityStore>,
    service: Arc<dyn GenerationService>,
    config: BackfillConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl BatchBackfillScheduler {
    pub fn new(
        store: Arc<dyn EntityStore>,
        service: Arc<dyn GenerationService>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            store,
            service,
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Scan, score, filter, and order the projects lacking an initial report.
    /// Returns the ordered candidates and how many were already reported.
    pub async fn plan(
        &self,
        options: &BackfillOptions,
    ) -> Result<(Vec<Candidate>, usize), ReportError> {
        let now = Utc::now();
        let filter = ProjectFilter {
            statuses: options.statuses.clone(),
            created_after: options
                .max_age_days
                .map(|days| now - ChronoDuration::days(days as i64)),
            created_before: (options.min_age_days > 0)
                .then(|| now - ChronoDuration::days(options.min_age_days as i64)),
        };

        let projects = self.store.list_projects(&filter).await?;
        let mut already_reported = 0;
        let mut candidates = Vec::new();
        for project in projects {
            if self.store.find_initial_report(&project.id).await?.is_some() {
                already_reported += 1;
                continue;
            }
            candidates.push(Candidate::from_project(
                &project,
                now,
                self.config.high_threshold,
                self.config.medium_threshold,
            ));
        }

        if let Some(tier) = options.priority_filter {
            candidates.retain(|c| c.tier == tier);
        }
        candidates.sort_by(candidate_order);
        if let Some(limit) = options.max_projects {
            candidates.truncate(limit);
        }
        Ok((candidates, already_reported))
    }

    async fn process(
        &self,
        candidate: &Candidate,
        batch: usize,
        context: &GenerationContext,
    ) -> ProcessingResult {
        let started = Instant::now();
        let call = AssertUnwindSafe(
            self.service
                .ensure_initial_report(&candidate.project_id, context),
        )
        .catch_unwind()
        .await;

        let mut result = ProcessingResult {
            project_id: candidate.project_id.clone(),
            project_name: candidate.name.clone(),
            batch,
            priority_score: candidate.score,
            tier: candidate.tier,
            outcome: ProjectOutcome::Failed,
            report_id: None,
            attempts: 0,
            fallback_used: false,
            duration_ms: 0,
            error: None,
        };
        match call {
            Ok(generation) => {
                result.outcome = match (generation.success, generation.already_existed) {
                    (true, true) => ProjectOutcome::Skipped,
                    (true, false) => ProjectOutcome::Succeeded,
                    (false, _) => ProjectOutcome::Failed,
                };
                result.error = generation.error_message();
                result.report_id = generation.report_id;
                result.attempts = generation.attempts;
                result.fallback_used = generation.fallback_used;
            }
            Err(_) => {
                error!(project_id = %candidate.project_id, "Backfill generation panicked");
                result.error = Some("generation panicked".to_string());
            }
        }
        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    pub async fn run(&self, options: &BackfillOptions) -> Result<ProcessingSummary, ReportError> {
        let run_id = new_run_id();
        let started_at = Utc::now();
        let started = Instant::now();

        let (candidates, already_reported) = self.plan(options).await?;
        let mut tiers = TierCounts::default();
        for candidate in &candidates {
            tiers.record(candidate.tier);
        }
        info!(
            run_id = %run_id,
            candidates = candidates.len(),
            already_reported,
            dry_run = options.dry_run,
            "Backfill run planned"
        );

        let batch_size = options.batch_size.max(1);
        let group_size = options.max_concurrent_projects.max(1);
        let batches: Vec<&[Candidate]> = candidates.chunks(batch_size).collect();
        let mut results = Vec::with_capacity(candidates.len());
        let mut batch_summaries = Vec::new();
        let mut stopped_early = false;

        if options.dry_run {
            for (index, batch) in batches.iter().enumerate() {
                for candidate in batch.iter() {
                    results.push(ProcessingResult {
                        project_id: candidate.project_id.clone(),
                        project_name: candidate.name.clone(),
                        batch: index,
                        priority_score: candidate.score,
                        tier: candidate.tier,
                        outcome: ProjectOutcome::Planned,
                        report_id: None,
                        attempts: 0,
                        fallback_used: false,
                        duration_ms: 0,
                        error: None,
                    });
                }
                batch_summaries.push(BatchSummary {
                    index,
                    project_ids: batch.iter().map(|c| c.project_id.clone()).collect(),
                    ..BatchSummary::default()
                });
            }
        } else {
            let context = GenerationContext {
                requested_by: Some(run_id.clone()),
                ..GenerationContext::backfill()
            };
            let group_delay = Duration::from_millis(self.config.group_delay_ms);
            let batch_delay = Duration::from_millis(self.config.batch_delay_ms);

            for (index, batch) in batches.iter().enumerate() {
                let batch_started = Instant::now();
                let mut batch_results = Vec::with_capacity(batch.len());
                let groups: Vec<&[Candidate]> = batch.chunks(group_size).collect();

                for (group_index, group) in groups.iter().enumerate() {
                    debug!(run_id = %run_id, batch = index + 1, group = group_index + 1, projects = group.len(), "Processing backfill group");
                    let outcomes = join_all(
                        group
                            .iter()
                            .map(|candidate| self.process(candidate, index, &context)),
                    )
                    .await;
                    batch_results.extend(outcomes);
                    if group_index + 1 < groups.len() {
                        self.sleeper.sleep(group_delay).await;
                    }
                }

                let count = |outcome: ProjectOutcome| {
                    batch_results.iter().filter(|r| r.outcome == outcome).count()
                };
                let summary = BatchSummary {
                    index,
                    project_ids: batch.iter().map(|c| c.project_id.clone()).collect(),
                    successful: count(ProjectOutcome::Succeeded),
                    failed: count(ProjectOutcome::Failed),
                    skipped: count(ProjectOutcome::Skipped),
                    duration_ms: batch_started.elapsed().as_millis() as u64,
                };
                info!(
                    run_id = %run_id,
                    batch = index + 1,
                    batches = batches.len(),
                    successful = summary.successful,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    duration_ms = summary.duration_ms,
                    "Backfill batch finished"
                );
                let batch_failed = summary.failed > 0;
                batch_summaries.push(summary);
                results.extend(batch_results);

                if batch_failed && !options.continue_on_error {
                    warn!(run_id = %run_id, batch = index + 1, "Stopping backfill after failed batch");
                    stopped_early = index + 1 < batches.len();
                    break;
                }
                if index + 1 < batches.len() {
                    self.sleeper.sleep(batch_delay).await;
                }
            }
        }

        let mut summary = ProcessingSummary {
            run_id,
            dry_run: options.dry_run,
            started_at,
            finished_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            candidates: candidates.len(),
            already_reported,
            tiers,
            total_processed: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            success_rate: 0.0,
            stopped_early,
            batches: batch_summaries,
            results,
            artifacts: Vec::new(),
        };
        summary.tally();

        if let Some(dir) = &options.output_dir {
            match summary.write_artifacts(dir) {
                Ok(paths) => summary.artifacts = paths,
                Err(err) => {
                    error!(run_id = %summary.run_id, dir = %dir.display(), error = %err, "Failed to write backfill summary");
                }
            }
        }

        info!(
            run_id = %summary.run_id,
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            success_rate = summary.success_rate,
            duration_ms = summary.duration_ms,
            "Backfill run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::RecordingSleeper;
    use crate::generation::GenerationResult;
    use crate::model::Project;
    use crate::store::MemoryEntityStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// Succeeds for every project except those listed in `failing`.
    struct ScriptedService {
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerationService for ScriptedService {
        async fn ensure_initial_report(
            &self,
            project_id: &str,
            _context: &GenerationContext,
        ) -> GenerationResult {
            self.calls.lock().push(project_id.to_string());
            if self.failing.contains(project_id) {
                return GenerationResult::failure(
                    project_id,
                    2,
                    1,
                    ReportError::TransientGeneration("provider down".to_string()),
                );
            }
            let mut result = GenerationResult::failure(project_id, 1, 1, ReportError::Config(String::new()));
            result.success = true;
            result.error = None;
            result.report_id = Some(format!("rpt_{}", project_id));
            result
        }
    }

    fn store_with_projects(count: usize) -> Arc<MemoryEntityStore> {
        let store = MemoryEntityStore::new();
        for i in 0..count {
            store.put_project(Project {
                id: format!("proj-{:02}", i),
                name: format!("Project {}", i),
                status: ProjectStatus::Active,
                created_at: Utc::now() - ChronoDuration::days(i as i64),
                owner_contact: None,
                peer_ids: Vec::new(),
                subject_id: None,
            });
        }
        Arc::new(store)
    }

    fn options(batch_size: usize) -> BackfillOptions {
        BackfillOptions {
            batch_size,
            output_dir: None,
            ..BackfillOptions::default()
        }
    }

    #[tokio::test]
    async fn processes_batches_in_groups_with_delays() {
        let store = store_with_projects(7);
        let service = Arc::new(ScriptedService::new(&["proj-03"]));
        let sleeper = Arc::new(RecordingSleeper::new());
        let scheduler = BatchBackfillScheduler::new(store, service.clone(), BackfillConfig::default())
            .with_sleeper(sleeper.clone());

        let summary = scheduler.run(&options(4)).await.unwrap();

        assert_eq!(summary.candidates, 7);
        assert_eq!(summary.batches.len(), 2);
        assert_eq!(summary.successful, 6);
        assert_eq!(summary.failed, 1);
        assert_eq!(service.calls.lock().len(), 7);
        // batch 1: groups of 3 + 1 (one group delay), batch delay, batch 2: one group
        assert_eq!(
            sleeper.requested(),
            vec![Duration::from_millis(1_000), Duration::from_millis(2_000)]
        );
    }

    #[tokio::test]
    async fn dry_run_never_calls_the_service() {
        let store = store_with_projects(3);
        let service = Arc::new(ScriptedService::new(&[]));
        let scheduler =
            BatchBackfillScheduler::new(store, service.clone(), BackfillConfig::default());

        let summary = scheduler
            .run(&BackfillOptions {
                dry_run: true,
                ..options(2)
            })
            .await
            .unwrap();

        assert!(service.calls.lock().is_empty());
        assert_eq!(summary.results.len(), 3);
        assert!(summary
            .results
            .iter()
            .all(|r| r.outcome == ProjectOutcome::Planned));
        assert_eq!(summary.total_processed, 0);
    }

    #[tokio::test]
    async fn stop_on_error_skips_remaining_batches() {
        let store = store_with_projects(6);
        // newest projects score highest, so proj-00 lands in the first batch
        let service = Arc::new(ScriptedService::new(&["proj-00"]));
        let scheduler = BatchBackfillScheduler::new(store, service.clone(), BackfillConfig::default())
            .with_sleeper(Arc::new(RecordingSleeper::new()));

        let summary = scheduler
            .run(&BackfillOptions {
                continue_on_error: false,
                ..options(3)
            })
            .await
            .unwrap();

        assert!(summary.stopped_early);
        assert_eq!(summary.batches.len(), 1);
        assert_eq!(service.calls.lock().len(), 3);
    }

    #[tokio::test]
    async fn tier_filter_and_limit_apply_before_batching() {
        let store = store_with_projects(5);
        let service = Arc::new(ScriptedService::new(&[]));
        let scheduler =
            BatchBackfillScheduler::new(store, service, BackfillConfig::default());

        let (all, _) = scheduler.plan(&options(10)).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0].score >= w[1].score));

        let (high, _) = scheduler
            .plan(&BackfillOptions {
                priority_filter: Some(PriorityTier::High),
                ..options(10)
            })
            .await
            .unwrap();
        assert!(high.is_empty());

        let (limited, _) = scheduler
            .plan(&BackfillOptions {
                max_projects: Some(2),
                ..options(10)
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].project_id, "proj-00");
    }
}
