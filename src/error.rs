//! Error types for the report generation pipeline.

use crate::types::{PeerId, ProjectId, ReportId};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    #[error("Report not found: {0}")]
    ReportNotFound(ReportId),

    #[error("Storage conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised while validating, building, or coordinating report generation.
#[derive(Debug, Clone, Error)]
pub enum ReportError {
    #[error("Validation blocked generation: {}", issues.join("; "))]
    ValidationBlocked { issues: Vec<String> },

    #[error("Content of {size} bytes exceeds the {limit} byte ceiling")]
    ContentTooLarge { size: usize, limit: usize },

    #[error("Text generation failed: {0}")]
    TransientGeneration(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("{phase} timed out after {after_ms}ms")]
    Timeout { phase: String, after_ms: u64 },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Degraded content rejected: {0}")]
    DegradedContent(String),

    #[error("Generation failed after {attempts} attempts: {last_error}")]
    PermanentGeneration { attempts: usize, last_error: String },

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReportError {
    /// Whether the coordinator should spend another attempt after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReportError::ValidationBlocked { .. } => false,
            ReportError::ProviderAuthFailed(_) => false,
            ReportError::ProviderNotConfigured(_) => false,
            ReportError::Integrity(_) => false,
            ReportError::Config(_) => false,
            ReportError::PermanentGeneration { .. } => false,
            ReportError::TransientGeneration(_) => true,
            ReportError::ProviderRequestFailed(_) => true,
            ReportError::ProviderRateLimit(_) => true,
            ReportError::Timeout { .. } => true,
            _ => true,
        }
    }

    pub fn timeout(phase: impl Into<String>, after: std::time::Duration) -> Self {
        ReportError::Timeout {
            phase: phase.into(),
            after_ms: after.as_millis() as u64,
        }
    }
}

impl From<StorageError> for ReportError {
    fn from(err: StorageError) -> Self {
        ReportError::Storage(err.to_string())
    }
}

impl From<config::ConfigError> for ReportError {
    fn from(err: config::ConfigError) -> Self {
        ReportError::Config(err.to_string())
    }
}
