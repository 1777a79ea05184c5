//! Caller context, derived generation requirements, and retry backoff.

use crate::generation::coordinator::CoordinatorConfig;
use crate::model::TemplateTier;
use crate::report::BuildRequest;
use crate::validation::ValidationResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a generation request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOrigin {
    Api,
    Interactive,
    Scheduled,
    Backfill,
}

impl RequestOrigin {
    pub fn priority(self) -> Priority {
        match self {
            RequestOrigin::Api | RequestOrigin::Interactive => Priority::High,
            RequestOrigin::Scheduled => Priority::Normal,
            RequestOrigin::Backfill => Priority::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestOrigin::Api => "api",
            RequestOrigin::Interactive => "interactive",
            RequestOrigin::Scheduled => "scheduled",
            RequestOrigin::Backfill => "backfill",
        }
    }
}

impl fmt::Display for RequestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(RequestOrigin::Api),
            "interactive" => Ok(RequestOrigin::Interactive),
            "scheduled" => Ok(RequestOrigin::Scheduled),
            "backfill" => Ok(RequestOrigin::Backfill),
            other => Err(format!("unknown request origin '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Caller-supplied context for `ensure_initial_report`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub origin: RequestOrigin,
    pub strict_validation: bool,
    /// Accept degraded content from the first attempt
    pub allow_fallback: bool,
    pub max_retries_override: Option<usize>,
    pub requested_by: Option<String>,
}

impl GenerationContext {
    pub fn new(origin: RequestOrigin) -> Self {
        Self {
            origin,
            strict_validation: false,
            allow_fallback: false,
            max_retries_override: None,
            requested_by: None,
        }
    }

    pub fn backfill() -> Self {
        Self {
            allow_fallback: true,
            ..Self::new(RequestOrigin::Backfill)
        }
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries_override = Some(retries);
        self
    }
}

impl Default for GenerationContext {
    fn default() -> Self {
        Self::new(RequestOrigin::Api)
    }
}

/// Requirements derived once per generation from validation and context
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequirements {
    pub priority: Priority,
    pub template_tier: TemplateTier,
    /// Extra attempts after the first
    pub max_retries: usize,
    pub attempt_timeout: Duration,
    pub total_timeout: Duration,
    /// First attempt already accepts degraded content
    pub start_degraded: bool,
    pub validation_score: u8,
    pub required_failed: bool,
}

impl GenerationRequirements {
    pub fn derive(
        validation: &ValidationResult,
        peer_count: usize,
        has_subject: bool,
        context: &GenerationContext,
        config: &CoordinatorConfig,
    ) -> Self {
        let priority = context.origin.priority();
        let max_retries = context
            .max_retries_override
            .unwrap_or_else(|| config.retries_for(priority));
        Self {
            priority,
            template_tier: TemplateTier::select(peer_count, has_subject),
            max_retries,
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
            total_timeout: Duration::from_millis(config.total_timeout_ms),
            start_degraded: context.allow_fallback || validation.recommend_fallback,
            validation_score: validation.overall_score,
            required_failed: validation.required_failed,
        }
    }

    /// Build request for a 1-based attempt. Retries accept fallback content and
    /// stop insisting on fresh snapshots.
    pub fn build_request(&self, project_id: &str, attempt: usize) -> BuildRequest {
        let degraded = attempt > 1 || self.start_degraded;
        BuildRequest {
            project_id: project_id.to_string(),
            template_tier: self.template_tier,
            allow_fallback: degraded,
            require_fresh_snapshots: !degraded,
            attempt,
            validation_score: self.validation_score,
            required_failed: self.required_failed,
        }
    }
}

/// Delay before retry number `retry` (1-based): base doubled per retry, capped.
pub fn backoff_delay(retry: usize, base: Duration, cap: Duration) -> Duration {
    let exponent = retry.saturating_sub(1).min(31) as u32;
    base.checked_mul(1u32 << exponent)
        .unwrap_or(cap)
        .min(cap)
}
