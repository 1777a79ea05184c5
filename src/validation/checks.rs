//! Individual readiness checks.
//!
//! Each check reads what it needs through the entity store and scores one
//! aspect of the project. Checks return `Err` only for store failures; the
//! validator turns those into zero-scored, blocking results.

use crate::error::StorageError;
use crate::model::{PeerSnapshotStats, Project, ProjectStatus, ReportStatus};
use crate::store::EntityStore;
use crate::validation::resources::ResourceSnapshot;
use crate::validation::result::{CheckKind, CheckResult};
use crate::validation::validator::ValidatorConfig;
use chrono::{DateTime, Duration, Utc};

/// Shared, read-only inputs for one validation pass
pub struct CheckInputs<'a> {
    pub project_id: &'a str,
    /// Project loaded once up front; `Err` carries the store failure message.
    pub project: Result<Option<Project>, String>,
    pub store: &'a dyn EntityStore,
    pub config: &'a ValidatorConfig,
    pub resources: ResourceSnapshot,
    pub now: DateTime<Utc>,
}

impl CheckInputs<'_> {
    fn project(&self) -> Option<&Project> {
        self.project.as_ref().ok().and_then(|p| p.as_ref())
    }
}

pub async fn run(kind: CheckKind, inputs: &CheckInputs<'_>) -> Result<CheckResult, StorageError> {
    match kind {
        CheckKind::ProjectActive => Ok(project_active(inputs)),
        CheckKind::SubjectEntity => subject_entity(inputs).await,
        CheckKind::PeerSnapshots => peer_snapshots(inputs).await,
        CheckKind::PeerData => peer_data(inputs).await,
        CheckKind::DataFreshness => data_freshness(inputs).await,
        CheckKind::DataCompleteness => data_completeness(inputs).await,
        CheckKind::SystemResources => Ok(system_resources(inputs)),
        CheckKind::GenerationConflict => generation_conflict(inputs).await,
    }
}

fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round().min(100.0) as u8
}

fn project_active(inputs: &CheckInputs<'_>) -> CheckResult {
    let kind = CheckKind::ProjectActive;
    let project = match &inputs.project {
        Err(message) => return CheckResult::errored(kind, message.clone()),
        Ok(None) => {
            return CheckResult::fail(kind, 0)
                .blocking(format!("Project {} does not exist", inputs.project_id))
        }
        Ok(Some(project)) => project,
    };

    match project.status {
        ProjectStatus::Active => CheckResult::pass(kind, 100),
        ProjectStatus::Draft | ProjectStatus::Paused => CheckResult::fail(kind, 0)
            .blocking(format!(
                "Project status is {}; generation requires an active project",
                project.status
            ))
            .recommend("Activate the project before generating its initial report"),
        ProjectStatus::Archived => {
            CheckResult::fail(kind, 0).blocking("Project is archived and cannot be reported on")
        }
    }
}

async fn subject_entity(inputs: &CheckInputs<'_>) -> Result<CheckResult, StorageError> {
    let kind = CheckKind::SubjectEntity;
    let Some(project) = inputs.project() else {
        return Ok(CheckResult::fail(kind, 0));
    };
    let Some(subject_id) = &project.subject_id else {
        return Ok(CheckResult::pass(kind, 50)
            .warning("No subject entity configured; the report will lack a comparison baseline")
            .recommend("Link the project's own product to enable side-by-side comparison"));
    };

    let Some(subject) = inputs.store.get_subject(subject_id).await? else {
        return Ok(CheckResult::fail(kind, 20).warning(format!(
            "Subject entity {} is referenced but missing",
            subject_id
        )));
    };

    let captured = inputs
        .store
        .subject_snapshots(subject_id, 1)
        .await?
        .iter()
        .any(|s| s.capture_succeeded);

    let result = match (subject.is_complete(), captured) {
        (true, true) => CheckResult::pass(kind, 100),
        (true, false) => CheckResult::pass(kind, 85)
            .warning("Subject entity has no successful snapshot yet"),
        (false, _) => CheckResult::pass(kind, 70)
            .warning("Subject entity profile is incomplete")
            .recommend("Add positioning text to the subject entity"),
    };
    Ok(result)
}

async fn peer_stats(inputs: &CheckInputs<'_>) -> Result<Vec<PeerSnapshotStats>, StorageError> {
    inputs.store.peer_snapshot_stats(inputs.project_id).await
}

async fn peer_snapshots(inputs: &CheckInputs<'_>) -> Result<CheckResult, StorageError> {
    let kind = CheckKind::PeerSnapshots;
    if inputs.project().is_none() {
        return Ok(CheckResult::fail(kind, 0));
    }
    let stats = peer_stats(inputs).await?;
    if stats.is_empty() {
        return Ok(CheckResult::fail(kind, 0)
            .blocking("Project has no peers configured")
            .recommend("Attach at least one peer before generating a report"));
    }

    let missing: Vec<&str> = stats
        .iter()
        .filter(|s| s.successful() == 0)
        .map(|s| s.peer_id.as_str())
        .collect();
    let valid = stats.len() - missing.len();
    if valid == 0 {
        return Ok(CheckResult::fail(kind, 0).blocking(format!(
            "None of the {} peers has a successful snapshot",
            stats.len()
        )));
    }

    let mut result = CheckResult::pass(kind, percent(valid, stats.len()));
    if !missing.is_empty() {
        result = result.warning(format!(
            "{} of {} peers have no successful snapshot: {}",
            missing.len(),
            stats.len(),
            missing.join(", ")
        ));
    }
    Ok(result)
}

async fn peer_data(inputs: &CheckInputs<'_>) -> Result<CheckResult, StorageError> {
    let kind = CheckKind::PeerData;
    if inputs.project().is_none() {
        return Ok(CheckResult::fail(kind, 0));
    }
    let stats = peer_stats(inputs).await?;
    if stats.is_empty() {
        return Ok(CheckResult::fail(kind, 0).warning("No peer data available"));
    }

    let target = inputs.config.target_peer_count.max(1);
    let low_quality = stats.iter().filter(|s| s.low_quality).count();
    let coverage = stats.len().min(target) as f64 / target as f64;
    let quality = 1.0 - 0.5 * (low_quality as f64 / stats.len() as f64);
    let score = (100.0 * coverage * quality).round() as u8;

    let mut result = CheckResult::new(kind, score >= 60, score);
    if stats.len() < target {
        result = result.warning(format!(
            "Only {} peers tracked; {} or more give a fuller comparison",
            stats.len(),
            target
        ));
    }
    if low_quality > 0 {
        result = result.warning(format!(
            "{} peers are missing a name or locator",
            low_quality
        ));
    }
    Ok(result)
}

async fn data_freshness(inputs: &CheckInputs<'_>) -> Result<CheckResult, StorageError> {
    let kind = CheckKind::DataFreshness;
    if inputs.project().is_none() {
        return Ok(CheckResult::fail(kind, 0));
    }
    let stats = peer_stats(inputs).await?;
    let ages: Vec<Duration> = stats
        .iter()
        .flat_map(|s| s.captures.iter())
        .filter(|c| c.succeeded)
        .map(|c| inputs.now - c.captured_at)
        .collect();
    if ages.is_empty() {
        return Ok(CheckResult::fail(kind, 0).warning("No successful snapshots to assess freshness"));
    }

    let fresh_window = Duration::hours(inputs.config.fresh_hours as i64);
    let stale_window = Duration::days(inputs.config.stale_days as i64);
    let fresh = ages.iter().filter(|age| **age <= fresh_window).count();
    let recent = ages.iter().filter(|age| **age <= stale_window).count();

    let fresh_ratio = fresh as f64 / ages.len() as f64;
    let recent_ratio = recent as f64 / ages.len() as f64;
    let score = (50.0 * fresh_ratio + 50.0 * recent_ratio).round() as u8;

    let mut result = CheckResult::new(kind, score >= 50, score);
    if recent < ages.len() {
        result = result.warning(format!(
            "{}% of snapshots are older than {} days",
            percent(ages.len() - recent, ages.len()),
            inputs.config.stale_days
        ));
    }
    if fresh == 0 {
        result = result.recommend("Refresh peer snapshots before generating");
    }
    Ok(result)
}

async fn data_completeness(inputs: &CheckInputs<'_>) -> Result<CheckResult, StorageError> {
    let kind = CheckKind::DataCompleteness;
    let Some(project) = inputs.project() else {
        return Ok(CheckResult::fail(kind, 0));
    };
    let stats = peer_stats(inputs).await?;
    let min_bytes = inputs.config.min_snapshot_bytes;
    let with_content = stats
        .iter()
        .filter(|s| {
            s.captures
                .iter()
                .any(|c| c.succeeded && c.content_bytes >= min_bytes)
        })
        .count();
    let peer_part = if stats.is_empty() {
        0.0
    } else {
        with_content as f64 / stats.len() as f64
    };

    let subject_part = match &project.subject_id {
        None => 0.0,
        Some(id) => match inputs.store.get_subject(id).await? {
            Some(subject) if subject.is_complete() => 1.0,
            Some(_) => 0.5,
            None => 0.25,
        },
    };

    let score = (70.0 * peer_part + 30.0 * subject_part).round() as u8;
    let mut result = CheckResult::new(kind, score >= 50, score);
    if !result.passed {
        result = result.blocking(format!(
            "Aggregate data completeness is {}%, below the 50% minimum",
            score
        ));
    } else if with_content < stats.len() {
        result = result.warning(format!(
            "{} peers have no snapshot with usable content",
            stats.len() - with_content
        ));
    }
    Ok(result)
}

fn system_resources(inputs: &CheckInputs<'_>) -> CheckResult {
    let kind = CheckKind::SystemResources;
    let limit = inputs.config.max_concurrent_generations.max(1);
    let active = inputs.resources.active_generations;
    if active > limit {
        return CheckResult::fail(kind, 0).blocking(format!(
            "System at capacity: {} generations in flight (limit {})",
            active, limit
        ));
    }

    let load = active as f64 / limit as f64;
    let score = if load <= 0.5 {
        100
    } else {
        (100.0 - (load - 0.5) * 160.0).round() as u8
    };
    let mut result = CheckResult::pass(kind, score);
    if load > 0.8 {
        result = result.warning(format!(
            "Generation capacity is nearly exhausted ({}/{})",
            active, limit
        ));
    }
    result
}

async fn generation_conflict(inputs: &CheckInputs<'_>) -> Result<CheckResult, StorageError> {
    let kind = CheckKind::GenerationConflict;
    let result = match inputs.store.find_initial_report(inputs.project_id).await? {
        Some(report) if report.status == ReportStatus::Generating => CheckResult::fail(kind, 0)
            .warning(format!(
                "Initial report {} is already generating for this project",
                report.id
            )),
        Some(report) => CheckResult::pass(kind, 100).recommend(format!(
            "Initial report {} already exists and will be reused",
            report.id
        )),
        None => CheckResult::pass(kind, 100),
    };
    Ok(result)
}
