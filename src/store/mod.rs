//! Entity Store
//!
//! Read access to projects, peers, subjects, and snapshots, plus the narrow
//! write surface the pipeline needs: report creation and the two auto-repair
//! mutations (peer attachment and status activation).

pub mod memory;
pub mod persistence;

pub use memory::MemoryEntityStore;
pub use persistence::SledEntityStore;

use crate::error::StorageError;
use crate::model::{
    Peer, PeerRecord, PeerSnapshotStats, Project, ProjectStatus, Report, ReportStatus, Snapshot,
    Subject,
};
use crate::types::{PeerId, ReportId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Predicate for project scans
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Accepted statuses (empty accepts every status)
    pub statuses: Vec<ProjectStatus>,
    /// Only projects created at or after this instant
    pub created_after: Option<DateTime<Utc>>,
    /// Only projects created at or before this instant
    pub created_before: Option<DateTime<Utc>>,
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&project.status) {
            return false;
        }
        if let Some(after) = self.created_after {
            if project.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if project.created_at > before {
                return false;
            }
        }
        true
    }
}

/// Entity store interface
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_project(&self, project_id: &str) -> Result<Option<Project>, StorageError>;

    async fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, StorageError>;

    /// Peer ids only, in the project's peer order.
    async fn list_peer_ids(&self, project_id: &str) -> Result<Vec<PeerId>, StorageError>;

    /// Full peer records for `peer_ids`, each with at most `snapshot_limit`
    /// snapshots, newest first. Unknown ids are skipped.
    async fn load_peers(
        &self,
        peer_ids: &[PeerId],
        snapshot_limit: usize,
    ) -> Result<Vec<PeerRecord>, StorageError>;

    /// Payload-free capture facts for every peer of the project.
    async fn peer_snapshot_stats(
        &self,
        project_id: &str,
    ) -> Result<Vec<PeerSnapshotStats>, StorageError>;

    async fn get_subject(&self, subject_id: &str) -> Result<Option<Subject>, StorageError>;

    async fn subject_snapshots(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<Snapshot>, StorageError>;

    /// Existing peer records not in `exclude`, in stable id order.
    async fn list_available_peers(
        &self,
        exclude: &[PeerId],
        limit: usize,
    ) -> Result<Vec<Peer>, StorageError>;

    async fn attach_peers(&self, project_id: &str, peer_ids: &[PeerId])
        -> Result<(), StorageError>;

    async fn set_project_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
    ) -> Result<(), StorageError>;

    /// The project's initial report in status generating or completed, if any.
    async fn find_initial_report(&self, project_id: &str) -> Result<Option<Report>, StorageError>;

    async fn get_report(&self, report_id: &str) -> Result<Option<Report>, StorageError>;

    /// Persist a new report. Fails with `StorageError::Conflict` when the
    /// report would be a second live initial report for its project.
    async fn create_report(&self, report: &Report) -> Result<(), StorageError>;

    /// A report moved to failed stops holding its project's initial slot.
    /// Fails with `StorageError::ReportNotFound` for unknown ids.
    async fn set_report_status(
        &self,
        report_id: &ReportId,
        status: ReportStatus,
    ) -> Result<(), StorageError>;
}

/// Seed data bundle, used by `benchline import` and test fixtures
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub peers: Vec<Peer>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

impl Dataset {
    pub fn record_count(&self) -> usize {
        self.projects.len() + self.peers.len() + self.subjects.len() + self.snapshots.len()
    }
}

pub(crate) fn conflict_for(report: &Report, existing: &ReportId) -> StorageError {
    StorageError::Conflict(format!(
        "project {} already has initial report {}; refusing to create {}",
        report.project_id, existing, report.id
    ))
}
