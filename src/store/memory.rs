//! In-memory entity store backed by `parking_lot` locks.

use crate::error::StorageError;
use crate::model::{
    CaptureInfo, Peer, PeerRecord, PeerSnapshotStats, Project, ProjectStatus, Report,
    ReportStatus, Snapshot, SnapshotOwner, Subject,
};
use crate::store::{conflict_for, Dataset, EntityStore, ProjectFilter};
use crate::types::{PeerId, ProjectId, ReportId, SubjectId};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct MemoryState {
    projects: BTreeMap<ProjectId, Project>,
    peers: BTreeMap<PeerId, Peer>,
    subjects: HashMap<SubjectId, Subject>,
    /// Snapshots per owner key, kept sorted newest first
    snapshots: HashMap<String, Vec<Snapshot>>,
    reports: HashMap<ReportId, Report>,
}

/// Entity store kept entirely in process memory.
#[derive(Default)]
pub struct MemoryEntityStore {
    state: RwLock<MemoryState>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        let store = Self::new();
        store.import(dataset);
        store
    }

    pub fn import(&self, dataset: Dataset) {
        for project in dataset.projects {
            self.put_project(project);
        }
        for peer in dataset.peers {
            self.put_peer(peer);
        }
        for subject in dataset.subjects {
            self.put_subject(subject);
        }
        for snapshot in dataset.snapshots {
            self.put_snapshot(snapshot);
        }
    }

    pub fn put_project(&self, project: Project) {
        self.state.write().projects.insert(project.id.clone(), project);
    }

    pub fn put_peer(&self, peer: Peer) {
        self.state.write().peers.insert(peer.id.clone(), peer);
    }

    pub fn put_subject(&self, subject: Subject) {
        self.state.write().subjects.insert(subject.id.clone(), subject);
    }

    pub fn put_snapshot(&self, snapshot: Snapshot) {
        let mut state = self.state.write();
        let list = state.snapshots.entry(snapshot.owner.key()).or_default();
        list.push(snapshot);
        list.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
    }

    /// Insert a report without the initial-report invariant check.
    pub fn put_report_unchecked(&self, report: Report) {
        self.state.write().reports.insert(report.id.clone(), report);
    }

    pub fn project(&self, project_id: &str) -> Option<Project> {
        self.state.read().projects.get(project_id).cloned()
    }

    pub fn reports_for_project(&self, project_id: &str) -> Vec<Report> {
        let mut reports: Vec<Report> = self
            .state
            .read()
            .reports
            .values()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        reports.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        reports
    }

    pub fn report_count(&self) -> usize {
        self.state.read().reports.len()
    }

    fn live_initial_report(state: &MemoryState, project_id: &str) -> Option<Report> {
        state
            .reports
            .values()
            .filter(|r| r.project_id == project_id && r.holds_initial_slot())
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
            .cloned()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn get_project(&self, project_id: &str) -> Result<Option<Project>, StorageError> {
        Ok(self.project(project_id))
    }

    async fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, StorageError> {
        Ok(self
            .state
            .read()
            .projects
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn list_peer_ids(&self, project_id: &str) -> Result<Vec<PeerId>, StorageError> {
        self.state
            .read()
            .projects
            .get(project_id)
            .map(|p| p.peer_ids.clone())
            .ok_or_else(|| StorageError::ProjectNotFound(project_id.to_string()))
    }

    async fn load_peers(
        &self,
        peer_ids: &[PeerId],
        snapshot_limit: usize,
    ) -> Result<Vec<PeerRecord>, StorageError> {
        let state = self.state.read();
        Ok(peer_ids
            .iter()
            .filter_map(|id| state.peers.get(id))
            .map(|peer| {
                let snapshots = state
                    .snapshots
                    .get(&SnapshotOwner::Peer(peer.id.clone()).key())
                    .map(|list| list.iter().take(snapshot_limit).cloned().collect())
                    .unwrap_or_default();
                PeerRecord {
                    peer: peer.clone(),
                    snapshots,
                }
            })
            .collect())
    }

    async fn peer_snapshot_stats(
        &self,
        project_id: &str,
    ) -> Result<Vec<PeerSnapshotStats>, StorageError> {
        let state = self.state.read();
        let project = state
            .projects
            .get(project_id)
            .ok_or_else(|| StorageError::ProjectNotFound(project_id.to_string()))?;
        Ok(project
            .peer_ids
            .iter()
            .map(|peer_id| {
                let low_quality = state
                    .peers
                    .get(peer_id)
                    .map(Peer::is_low_quality)
                    .unwrap_or(true);
                let captures = state
                    .snapshots
                    .get(&SnapshotOwner::Peer(peer_id.clone()).key())
                    .map(|list| {
                        list.iter()
                            .map(|s| CaptureInfo {
                                captured_at: s.captured_at,
                                succeeded: s.capture_succeeded,
                                content_bytes: s.content.len(),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                PeerSnapshotStats {
                    peer_id: peer_id.clone(),
                    low_quality,
                    captures,
                }
            })
            .collect())
    }

    async fn get_subject(&self, subject_id: &str) -> Result<Option<Subject>, StorageError> {
        Ok(self.state.read().subjects.get(subject_id).cloned())
    }

    async fn subject_snapshots(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<Snapshot>, StorageError> {
        Ok(self
            .state
            .read()
            .snapshots
            .get(&SnapshotOwner::Subject(subject_id.to_string()).key())
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn list_available_peers(
        &self,
        exclude: &[PeerId],
        limit: usize,
    ) -> Result<Vec<Peer>, StorageError> {
        Ok(self
            .state
            .read()
            .peers
            .values()
            .filter(|p| !exclude.contains(&p.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn attach_peers(
        &self,
        project_id: &str,
        peer_ids: &[PeerId],
    ) -> Result<(), StorageError> {
        let mut state = self.state.write();
        if let Some(missing) = peer_ids.iter().find(|id| !state.peers.contains_key(*id)) {
            return Err(StorageError::PeerNotFound(missing.clone()));
        }
        let project = state
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StorageError::ProjectNotFound(project_id.to_string()))?;
        for id in peer_ids {
            if !project.peer_ids.contains(id) {
                project.peer_ids.push(id.clone());
            }
        }
        Ok(())
    }

    async fn set_project_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write();
        let project = state
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StorageError::ProjectNotFound(project_id.to_string()))?;
        project.status = status;
        Ok(())
    }

    async fn find_initial_report(&self, project_id: &str) -> Result<Option<Report>, StorageError> {
        Ok(Self::live_initial_report(&self.state.read(), project_id))
    }

    async fn get_report(&self, report_id: &str) -> Result<Option<Report>, StorageError> {
        Ok(self.state.read().reports.get(report_id).cloned())
    }

    async fn create_report(&self, report: &Report) -> Result<(), StorageError> {
        let mut state = self.state.write();
        if report.holds_initial_slot() {
            if let Some(existing) = Self::live_initial_report(&state, &report.project_id) {
                return Err(conflict_for(report, &existing.id));
            }
        }
        if state.reports.contains_key(&report.id) {
            return Err(StorageError::Conflict(format!(
                "report {} already exists",
                report.id
            )));
        }
        state.reports.insert(report.id.clone(), report.clone());
        Ok(())
    }

    async fn set_report_status(
        &self,
        report_id: &ReportId,
        status: ReportStatus,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write();
        let report = state
            .reports
            .get_mut(report_id)
            .ok_or_else(|| StorageError::ReportNotFound(report_id.clone()))?;
        report.status = status;
        report.updated_at = Utc::now();
        Ok(())
    }
}
