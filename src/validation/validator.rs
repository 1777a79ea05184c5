//! Prerequisite validator
//!
//! Runs every readiness check concurrently, each under its own timeout and
//! panic guard, and folds the outcomes into one `ValidationResult`.

use crate::store::EntityStore;
use crate::validation::checks::{self, CheckInputs};
use crate::validation::resources::{IdleResourceProbe, ResourceProbe};
use crate::validation::result::{CheckKind, CheckResult, ValidationResult};
use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Importance of each check (1-10)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckWeights {
    pub project_active: u8,
    pub subject_entity: u8,
    pub peer_snapshots: u8,
    pub peer_data: u8,
    pub data_freshness: u8,
    pub data_completeness: u8,
    pub system_resources: u8,
    pub generation_conflict: u8,
}

impl Default for CheckWeights {
    fn default() -> Self {
        Self {
            project_active: 10,
            subject_entity: 9,
            peer_snapshots: 9,
            peer_data: 7,
            data_freshness: 6,
            data_completeness: 8,
            system_resources: 5,
            generation_conflict: 4,
        }
    }
}

impl CheckWeights {
    pub fn weight(&self, kind: CheckKind) -> u8 {
        match kind {
            CheckKind::ProjectActive => self.project_active,
            CheckKind::SubjectEntity => self.subject_entity,
            CheckKind::PeerSnapshots => self.peer_snapshots,
            CheckKind::PeerData => self.peer_data,
            CheckKind::DataFreshness => self.data_freshness,
            CheckKind::DataCompleteness => self.data_completeness,
            CheckKind::SystemResources => self.system_resources,
            CheckKind::GenerationConflict => self.generation_conflict,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = (CheckKind, u8)> + '_ {
        CheckKind::ALL.iter().map(move |kind| (*kind, self.weight(*kind)))
    }
}

/// Validator thresholds and check parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Overall score needed to pass
    pub pass_threshold: u8,
    pub strict_pass_threshold: u8,
    /// Lower bar for proceeding with degraded quality
    pub proceed_threshold: u8,
    pub fallback_proceed_threshold: u8,
    pub check_timeout_ms: u64,
    pub fresh_hours: u64,
    pub stale_days: u64,
    /// Peer count at which peer coverage scores full marks
    pub target_peer_count: usize,
    /// Smallest snapshot payload that counts as usable content
    pub min_snapshot_bytes: usize,
    pub max_concurrent_generations: usize,
    pub weights: CheckWeights,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 70,
            strict_pass_threshold: 80,
            proceed_threshold: 60,
            fallback_proceed_threshold: 50,
            check_timeout_ms: 10_000,
            fresh_hours: 24,
            stale_days: 7,
            target_peer_count: 3,
            min_snapshot_bytes: 64,
            max_concurrent_generations: 10,
            weights: CheckWeights::default(),
        }
    }
}

/// Per-call validation switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateOptions {
    /// Use the strict pass threshold
    pub strict: bool,
    /// Lower the proceed bar because degraded content is acceptable
    pub allow_fallback: bool,
}

pub struct PrerequisiteValidator {
    store: Arc<dyn EntityStore>,
    config: ValidatorConfig,
    probe: Arc<dyn ResourceProbe>,
}

impl PrerequisiteValidator {
    pub fn new(store: Arc<dyn EntityStore>, config: ValidatorConfig) -> Self {
        Self {
            store,
            config,
            probe: Arc::new(IdleResourceProbe),
        }
    }

    pub fn with_resource_probe(mut self, probe: Arc<dyn ResourceProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Score a project's readiness. Never fails: store errors, panics, and
    /// timeouts inside a check become zero-scored blocking results.
    pub async fn validate(&self, project_id: &str, options: &ValidateOptions) -> ValidationResult {
        let started = Instant::now();

        let project = match AssertUnwindSafe(self.store.get_project(project_id))
            .catch_unwind()
            .await
        {
            Ok(loaded) => loaded.map_err(|e| e.to_string()),
            Err(_) => Err("project lookup panicked".to_string()),
        };

        let inputs = CheckInputs {
            project_id,
            project,
            store: self.store.as_ref(),
            config: &self.config,
            resources: self.probe.snapshot(),
            now: Utc::now(),
        };

        let checks = join_all(
            CheckKind::ALL
                .iter()
                .map(|kind| self.run_check(*kind, &inputs)),
        )
        .await;

        let result = ValidationResult::aggregate(
            project_id,
            checks,
            options,
            &self.config,
            started.elapsed().as_millis() as u64,
        );

        info!(
            project_id = %project_id,
            score = result.overall_score,
            passed = result.overall_passed,
            can_proceed = result.can_proceed,
            blocking = result.blocking_issues.len(),
            quality = %result.estimated_quality,
            duration_ms = result.duration_ms,
            "Prerequisite validation finished"
        );
        result
    }

    async fn run_check(&self, kind: CheckKind, inputs: &CheckInputs<'_>) -> CheckResult {
        let started = Instant::now();
        let limit = Duration::from_millis(self.config.check_timeout_ms);
        let outcome = tokio::time::timeout(
            limit,
            AssertUnwindSafe(checks::run(kind, inputs)).catch_unwind(),
        )
        .await;

        let mut result = match outcome {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(err))) => {
                warn!(project_id = %inputs.project_id, check = kind.label(), error = %err, "Validation check failed");
                CheckResult::errored(kind, err.to_string())
            }
            Ok(Err(_)) => {
                warn!(project_id = %inputs.project_id, check = kind.label(), "Validation check panicked");
                CheckResult::errored(kind, "check panicked")
            }
            Err(_) => {
                warn!(project_id = %inputs.project_id, check = kind.label(), timeout_ms = self.config.check_timeout_ms, "Validation check timed out");
                CheckResult::errored(kind, format!("timed out after {}ms", limit.as_millis()))
            }
        };
        result.weight = self.config.weights.weight(kind);
        result.duration_ms = started.elapsed().as_millis() as u64;

        debug!(
            project_id = %inputs.project_id,
            check = kind.label(),
            passed = result.passed,
            score = result.score,
            duration_ms = result.duration_ms,
            "Validation check completed"
        );
        result
    }
}
