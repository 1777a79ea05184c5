//! Generation coordinator
//!
//! The retry boundary of the pipeline. One call per project runs at a time;
//! concurrent callers share its result. Every path ends in a structured
//! `GenerationResult`.

use crate::delay::{Sleeper, TokioSleeper};
use crate::error::{ReportError, StorageError};
use crate::generation::in_flight::{Admission, InFlightRegistry};
use crate::generation::repair::auto_repair;
use crate::generation::requirements::{
    backoff_delay, GenerationContext, GenerationRequirements, Priority,
};
use crate::model::{Report, ReportQuality, ReportStatus};
use crate::report::ReportBuilder;
use crate::store::EntityStore;
use crate::types::{ProjectId, ReportId};
use crate::validation::{PrerequisiteValidator, ValidateOptions, ValidationResult};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize, Serializer};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Retry, timeout, and repair settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub retries_high: usize,
    pub retries_normal: usize,
    pub retries_low: usize,
    pub attempt_timeout_ms: u64,
    pub total_timeout_ms: u64,
    pub validation_timeout_ms: u64,
    pub auto_repair: bool,
    /// Peers attached when repairing a project with none
    pub repair_peer_limit: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            base_backoff_ms: 2_000,
            max_backoff_ms: 30_000,
            retries_high: 3,
            retries_normal: 2,
            retries_low: 1,
            attempt_timeout_ms: 120_000,
            total_timeout_ms: 600_000,
            validation_timeout_ms: 30_000,
            auto_repair: true,
            repair_peer_limit: 5,
        }
    }
}

impl CoordinatorConfig {
    pub fn retries_for(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.retries_high,
            Priority::Normal => self.retries_normal,
            Priority::Low => self.retries_low,
        }
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<ReportError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Outcome of `ensure_initial_report`
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub project_id: ProjectId,
    pub success: bool,
    pub report_id: Option<ReportId>,
    pub attempts: usize,
    pub processing_time_ms: u64,
    pub fallback_used: bool,
    /// The initial report existed before this call
    pub already_existed: bool,
    /// This caller attached to another caller's generation
    pub deduplicated: bool,
    pub quality: Option<ReportQuality>,
    pub validation_score: Option<u8>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ReportError>,
}

impl GenerationResult {
    pub fn failure(
        project_id: &str,
        attempts: usize,
        processing_time_ms: u64,
        error: ReportError,
    ) -> Self {
        Self {
            project_id: project_id.to_string(),
            success: false,
            report_id: None,
            attempts,
            processing_time_ms,
            fallback_used: false,
            already_existed: false,
            deduplicated: false,
            quality: None,
            validation_score: None,
            error: Some(error),
        }
    }

    fn existing(report: &Report, processing_time_ms: u64) -> Self {
        Self {
            project_id: report.project_id.clone(),
            success: true,
            report_id: Some(report.id.clone()),
            attempts: 0,
            processing_time_ms,
            fallback_used: report.metadata.fallback_sections > 0,
            already_existed: true,
            deduplicated: false,
            quality: Some(report.metadata.quality),
            validation_score: None,
            error: None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

/// Entry point shared by interactive callers and the backfill scheduler
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn ensure_initial_report(
        &self,
        project_id: &str,
        context: &GenerationContext,
    ) -> GenerationResult;
}

pub struct GenerationCoordinator {
    store: Arc<dyn EntityStore>,
    validator: PrerequisiteValidator,
    builder: Arc<dyn ReportBuilder>,
    config: CoordinatorConfig,
    in_flight: Arc<InFlightRegistry>,
    sleeper: Arc<dyn Sleeper>,
}

impl GenerationCoordinator {
    /// Wires the validator's resource check to this coordinator's in-flight registry.
    pub fn new(
        store: Arc<dyn EntityStore>,
        validator: PrerequisiteValidator,
        builder: Arc<dyn ReportBuilder>,
        config: CoordinatorConfig,
    ) -> Self {
        let in_flight = Arc::new(InFlightRegistry::new());
        let validator = validator.with_resource_probe(in_flight.clone());
        Self {
            store,
            validator,
            builder,
            config,
            in_flight,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn in_flight(&self) -> &Arc<InFlightRegistry> {
        &self.in_flight
    }

    pub fn validator(&self) -> &PrerequisiteValidator {
        &self.validator
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    async fn validate(
        &self,
        project_id: &str,
        options: &ValidateOptions,
    ) -> Result<ValidationResult, ReportError> {
        let limit = Duration::from_millis(self.config.validation_timeout_ms);
        tokio::time::timeout(limit, self.validator.validate(project_id, options))
            .await
            .map_err(|_| ReportError::timeout("prerequisite validation", limit))
    }

    /// Validate, repairing once if the first pass blocks.
    async fn validate_and_repair(
        &self,
        project_id: &str,
        context: &GenerationContext,
    ) -> Result<ValidationResult, ReportError> {
        let options = ValidateOptions {
            strict: context.strict_validation,
            allow_fallback: context.allow_fallback,
        };
        let mut validation = self.validate(project_id, &options).await?;

        if !validation.can_proceed && self.config.auto_repair {
            match auto_repair(self.store.as_ref(), project_id, self.config.repair_peer_limit).await
            {
                Ok(outcome) if outcome.applied() => {
                    validation = self.validate(project_id, &options).await?;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(project_id = %project_id, error = %err, "Auto-repair failed");
                }
            }
        }

        if validation.can_proceed {
            return Ok(validation);
        }
        let mut issues = validation.blocking_issues.clone();
        if issues.is_empty() {
            issues.push(format!(
                "Readiness score {} is below the proceed threshold",
                validation.overall_score
            ));
        }
        Err(ReportError::ValidationBlocked { issues })
    }

    /// Confirm the persisted report belongs to the project and holds the initial slot.
    async fn verify(&self, project_id: &str, report: &Report) -> Result<(), ReportError> {
        let stored = self
            .store
            .get_report(&report.id)
            .await?
            .ok_or_else(|| {
                ReportError::Integrity(format!("report {} was not persisted", report.id))
            })?;
        if stored.project_id != project_id {
            return Err(ReportError::Integrity(format!(
                "report {} belongs to project {}, expected {}",
                stored.id, stored.project_id, project_id
            )));
        }
        if !stored.is_initial {
            return Err(ReportError::Integrity(format!(
                "report {} is not flagged as the initial report",
                stored.id
            )));
        }
        Ok(())
    }

    /// Take a report that failed verification out of circulation, so it can
    /// neither be served nor keep an initial slot occupied.
    async fn discard(&self, report_id: &ReportId) {
        match self
            .store
            .set_report_status(report_id, ReportStatus::Failed)
            .await
        {
            Ok(()) => warn!(report_id = %report_id, "Marked unverified report as failed"),
            Err(StorageError::ReportNotFound(_)) => {}
            Err(err) => {
                warn!(report_id = %report_id, error = %err, "Could not mark unverified report as failed")
            }
        }
    }

    async fn run(
        &self,
        project_id: &str,
        context: &GenerationContext,
        started: Instant,
    ) -> GenerationResult {
        let elapsed = || started.elapsed().as_millis() as u64;

        match self.store.find_initial_report(project_id).await {
            Ok(Some(report)) => {
                info!(project_id = %project_id, report_id = %report.id, "Initial report already exists");
                return GenerationResult::existing(&report, elapsed());
            }
            Ok(None) => {}
            Err(err) => return GenerationResult::failure(project_id, 0, elapsed(), err.into()),
        }

        let validation = match self.validate_and_repair(project_id, context).await {
            Ok(validation) => validation,
            Err(err) => {
                warn!(project_id = %project_id, error = %err, "Generation blocked by validation");
                return GenerationResult::failure(project_id, 0, elapsed(), err);
            }
        };

        let (peer_count, has_subject) = match self.store.get_project(project_id).await {
            Ok(Some(project)) => (project.peer_ids.len(), project.subject_id.is_some()),
            Ok(None) => (0, false),
            Err(err) => return GenerationResult::failure(project_id, 0, elapsed(), err.into()),
        };
        let requirements =
            GenerationRequirements::derive(&validation, peer_count, has_subject, context, &self.config);
        debug!(
            project_id = %project_id,
            priority = ?requirements.priority,
            tier = ?requirements.template_tier,
            max_retries = requirements.max_retries,
            "Derived generation requirements"
        );

        let deadline = started + requirements.total_timeout;
        let base = Duration::from_millis(self.config.base_backoff_ms);
        let cap = Duration::from_millis(self.config.max_backoff_ms);
        let max_attempts = requirements.max_retries + 1;
        let mut last_error = None;
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if attempt > 1 {
                let delay = backoff_delay(attempt - 1, base, cap);
                if delay >= remaining {
                    last_error = Some(ReportError::timeout(
                        "total generation",
                        requirements.total_timeout,
                    ));
                    break;
                }
                debug!(project_id = %project_id, attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                self.sleeper.sleep(delay).await;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                last_error = Some(ReportError::timeout(
                    "total generation",
                    requirements.total_timeout,
                ));
                break;
            }
            attempts = attempt;
            let budget = requirements.attempt_timeout.min(remaining);
            let request = requirements.build_request(project_id, attempt);
            let call = AssertUnwindSafe(self.builder.build(&request)).catch_unwind();

            let err = match tokio::time::timeout(budget, call).await {
                Ok(Ok(Ok(report))) => {
                    if let Err(err) = self.verify(project_id, &report).await {
                        error!(project_id = %project_id, report_id = %report.id, error = %err, "Integrity check failed");
                        self.discard(&report.id).await;
                        return GenerationResult::failure(project_id, attempt, elapsed(), err);
                    }
                    let result = GenerationResult {
                        project_id: project_id.to_string(),
                        success: true,
                        report_id: Some(report.id.clone()),
                        attempts: attempt,
                        processing_time_ms: elapsed(),
                        fallback_used: request.allow_fallback
                            || report.metadata.fallback_sections > 0,
                        already_existed: false,
                        deduplicated: false,
                        quality: Some(report.metadata.quality),
                        validation_score: Some(validation.overall_score),
                        error: None,
                    };
                    info!(
                        project_id = %project_id,
                        report_id = %report.id,
                        attempts = attempt,
                        fallback_used = result.fallback_used,
                        duration_ms = result.processing_time_ms,
                        "Initial report generated"
                    );
                    return result;
                }
                Ok(Ok(Err(err))) => err,
                Ok(Err(_)) => ReportError::TransientGeneration("report builder panicked".to_string()),
                Err(_) => ReportError::timeout("build attempt", budget),
            };

            warn!(
                project_id = %project_id,
                attempt,
                max_attempts,
                retryable = err.is_retryable(),
                error = %err,
                "Build attempt failed"
            );
            if !err.is_retryable() {
                return GenerationResult::failure(project_id, attempt, elapsed(), err);
            }
            last_error = Some(err);
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string());
        error!(project_id = %project_id, attempts, error = %last_error, "Initial report generation failed");
        GenerationResult::failure(
            project_id,
            attempts,
            elapsed(),
            ReportError::PermanentGeneration {
                attempts,
                last_error,
            },
        )
    }
}

#[async_trait]
impl GenerationService for GenerationCoordinator {
    async fn ensure_initial_report(
        &self,
        project_id: &str,
        context: &GenerationContext,
    ) -> GenerationResult {
        let started = Instant::now();
        let guard = match self.in_flight.admit(project_id) {
            Admission::Leader(guard) => guard,
            Admission::Follower(rx) => {
                info!(project_id = %project_id, origin = %context.origin, "Joining in-flight generation");
                return rx.await.unwrap_or_else(|_| {
                    GenerationResult::failure(
                        project_id,
                        0,
                        started.elapsed().as_millis() as u64,
                        ReportError::TransientGeneration(
                            "in-flight generation ended without a result".to_string(),
                        ),
                    )
                });
            }
        };

        let result = match AssertUnwindSafe(self.run(project_id, context, started))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(project_id = %project_id, "Generation panicked");
                GenerationResult::failure(
                    project_id,
                    0,
                    started.elapsed().as_millis() as u64,
                    ReportError::PermanentGeneration {
                        attempts: 0,
                        last_error: "generation panicked".to_string(),
                    },
                )
            }
        };
        guard.complete(&result);
        result
    }
}
