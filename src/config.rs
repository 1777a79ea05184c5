//! Configuration System
//!
//! Layered configuration for the report pipeline: built-in defaults, the
//! global file, workspace files, then `BENCHLINE__`-prefixed environment
//! variables. Every knob is typed and defaulted; `PipelineConfig::validate`
//! rejects unusable combinations once at load time.

use crate::backfill::BackfillConfig;
use crate::error::ReportError;
use crate::generation::CoordinatorConfig;
use crate::logging::LoggingConfig;
use crate::report::BuilderConfig;
use crate::validation::ValidatorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::provider::{ProviderConfig, ProviderType};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Pipeline config version understood by this build
pub const PIPELINE_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchlineConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Text-generation provider
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Versioned knobs shared by all four pipeline components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub version: u32,
    pub validator: ValidatorConfig,
    pub coordinator: CoordinatorConfig,
    pub builder: BuilderConfig,
    pub backfill: BackfillConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: PIPELINE_VERSION,
            validator: ValidatorConfig::default(),
            coordinator: CoordinatorConfig::default(),
            builder: BuilderConfig::default(),
            backfill: BackfillConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled directory, relative paths resolve against the workspace root
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".benchline/store")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

impl StorageConfig {
    pub fn resolve(&self, workspace_root: &Path) -> PathBuf {
        if self.store_path.is_absolute() {
            self.store_path.clone()
        } else {
            workspace_root.join(&self.store_path)
        }
    }
}

impl PipelineConfig {
    /// Reject configurations the pipeline cannot run with. Returns every
    /// problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let v = &self.validator;
        let c = &self.coordinator;
        let b = &self.builder;
        let f = &self.backfill;

        if self.version != PIPELINE_VERSION {
            errors.push(format!(
                "Unsupported pipeline config version {} (expected {})",
                self.version, PIPELINE_VERSION
            ));
        }

        if v.pass_threshold > 100 || v.strict_pass_threshold > 100 {
            errors.push("Validator thresholds must be within 0-100".to_string());
        }
        if v.strict_pass_threshold < v.pass_threshold {
            errors.push("Strict pass threshold must not be below the pass threshold".to_string());
        }
        if v.fallback_proceed_threshold > v.proceed_threshold {
            errors.push("Fallback proceed threshold must not exceed the proceed threshold".to_string());
        }
        if v.target_peer_count == 0 {
            errors.push("Validator target peer count must be at least 1".to_string());
        }
        if v.max_concurrent_generations == 0 {
            errors.push("Max concurrent generations must be at least 1".to_string());
        }
        if v.weights.all().all(|(_, weight)| weight == 0) {
            errors.push("At least one check weight must be non-zero".to_string());
        }

        if c.max_backoff_ms < c.base_backoff_ms {
            errors.push("Max backoff must not be below the base backoff".to_string());
        }
        if c.attempt_timeout_ms == 0 || c.total_timeout_ms == 0 || c.validation_timeout_ms == 0 {
            errors.push("Coordinator timeouts must be non-zero".to_string());
        }
        if c.total_timeout_ms < c.attempt_timeout_ms {
            errors.push("Total timeout must not be below the attempt timeout".to_string());
        }

        if b.chunk_size == 0 {
            errors.push("Builder chunk size must be at least 1".to_string());
        }
        if b.snapshots_per_peer < 2 {
            errors.push("Builder needs at least 2 snapshots per peer to detect changes".to_string());
        }
        if b.max_content_bytes < 1024 || b.max_prompt_bytes < 1024 {
            errors.push("Content and prompt ceilings must be at least 1 KiB".to_string());
        }
        if b.max_peer_sections == 0 {
            errors.push("Builder max peer sections must be at least 1".to_string());
        }
        if b.generation_timeout_ms == 0 {
            errors.push("Builder generation timeout must be non-zero".to_string());
        }

        if f.batch_size == 0 {
            errors.push("Backfill batch size must be at least 1".to_string());
        }
        if f.max_concurrent_projects == 0 {
            errors.push("Backfill max concurrent projects must be at least 1".to_string());
        }
        if f.high_threshold > 100 || f.medium_threshold > f.high_threshold {
            errors.push("Backfill tier thresholds must satisfy medium <= high <= 100".to_string());
        }
        if let Some(max_age) = f.max_age_days {
            if max_age < f.min_age_days {
                errors.push("Backfill max age must not be below the min age".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl BenchlineConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ReportError> {
        let mut errors = self.pipeline.validate().err().unwrap_or_default();
        if let Err(e) = self.provider.validate() {
            errors.push(format!("Provider: {}", e));
        }
        if self.storage.store_path.as_os_str().is_empty() {
            errors.push("Store path cannot be empty".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ReportError::Config(errors.join("; ")))
        }
    }
}
