//! Per-check outcomes and their weighted aggregate.

use crate::model::ReportQuality;
use crate::types::ProjectId;
use crate::validation::validator::{ValidateOptions, ValidatorConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Readiness checks, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    ProjectActive,
    SubjectEntity,
    PeerSnapshots,
    PeerData,
    DataFreshness,
    DataCompleteness,
    SystemResources,
    GenerationConflict,
}

impl CheckKind {
    pub const ALL: [CheckKind; 8] = [
        CheckKind::ProjectActive,
        CheckKind::SubjectEntity,
        CheckKind::PeerSnapshots,
        CheckKind::PeerData,
        CheckKind::DataFreshness,
        CheckKind::DataCompleteness,
        CheckKind::SystemResources,
        CheckKind::GenerationConflict,
    ];

    /// A failed required check keeps the overall verdict from passing.
    pub fn required(self) -> bool {
        !matches!(
            self,
            CheckKind::PeerData | CheckKind::DataFreshness | CheckKind::GenerationConflict
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            CheckKind::ProjectActive => "project status",
            CheckKind::SubjectEntity => "subject entity",
            CheckKind::PeerSnapshots => "peer snapshots",
            CheckKind::PeerData => "peer data",
            CheckKind::DataFreshness => "data freshness",
            CheckKind::DataCompleteness => "data completeness",
            CheckKind::SystemResources => "system resources",
            CheckKind::GenerationConflict => "generation conflict",
        }
    }
}

/// Outcome of one readiness check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: CheckKind,
    pub passed: bool,
    /// 0-100
    pub score: u8,
    /// Importance 1-10
    pub weight: u8,
    pub required: bool,
    pub blocking_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub duration_ms: u64,
}

impl CheckResult {
    pub fn new(check: CheckKind, passed: bool, score: u8) -> Self {
        Self {
            check,
            passed,
            score: score.min(100),
            weight: 0,
            required: check.required(),
            blocking_issues: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn pass(check: CheckKind, score: u8) -> Self {
        Self::new(check, true, score)
    }

    pub fn fail(check: CheckKind, score: u8) -> Self {
        Self::new(check, false, score)
    }

    /// A check that raised, panicked, or timed out. Scored zero and treated
    /// as required regardless of the check's own classification.
    pub fn errored(check: CheckKind, message: impl Into<String>) -> Self {
        let mut result = Self::fail(check, 0);
        result.required = true;
        result.blocking_issues.push(format!(
            "Check '{}' could not complete: {}",
            check.label(),
            message.into()
        ));
        result
    }

    pub fn blocking(mut self, issue: impl Into<String>) -> Self {
        self.blocking_issues.push(issue.into());
        self
    }

    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn recommend(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }
}

/// Composite readiness verdict for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub project_id: ProjectId,
    pub overall_score: u8,
    pub overall_passed: bool,
    pub can_proceed: bool,
    pub recommend_fallback: bool,
    pub required_failed: bool,
    pub estimated_quality: ReportQuality,
    pub checks: Vec<CheckResult>,
    pub blocking_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub validated_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ValidationResult {
    /// Combine check outcomes into the overall verdict.
    pub fn aggregate(
        project_id: &str,
        checks: Vec<CheckResult>,
        options: &ValidateOptions,
        config: &ValidatorConfig,
        duration_ms: u64,
    ) -> Self {
        let overall_score = weighted_score(&checks);
        let required_failed = checks.iter().any(|c| c.required && !c.passed);

        let threshold = if options.strict {
            config.strict_pass_threshold
        } else {
            config.pass_threshold
        };
        let proceed_bar = if options.allow_fallback {
            config.fallback_proceed_threshold
        } else {
            config.proceed_threshold
        };

        let mut blocking_issues = Vec::new();
        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();
        for check in &checks {
            blocking_issues.extend(check.blocking_issues.iter().cloned());
            warnings.extend(check.warnings.iter().cloned());
            recommendations.extend(check.recommendations.iter().cloned());
        }

        let overall_passed = overall_score >= threshold && !required_failed;
        let can_proceed = blocking_issues.is_empty() && overall_score >= proceed_bar;
        let estimated_quality = ReportQuality::from_validation(overall_score, required_failed);
        let recommend_fallback =
            can_proceed && (!overall_passed || estimated_quality <= ReportQuality::Low);

        Self {
            project_id: project_id.to_string(),
            overall_score,
            overall_passed,
            can_proceed,
            recommend_fallback,
            required_failed,
            estimated_quality,
            checks,
            blocking_issues,
            warnings,
            recommendations,
            validated_at: Utc::now(),
            duration_ms,
        }
    }

    pub fn check(&self, kind: CheckKind) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.check == kind)
    }
}

/// Weighted mean of check scores, rounded to the nearest integer.
pub fn weighted_score(checks: &[CheckResult]) -> u8 {
    let total_weight: u32 = checks.iter().map(|c| c.weight as u32).sum();
    if total_weight == 0 {
        return 0;
    }
    let weighted: u32 = checks
        .iter()
        .map(|c| c.score as u32 * c.weight as u32)
        .sum();
    ((weighted as f64 / total_weight as f64).round() as u32).min(100) as u8
}
