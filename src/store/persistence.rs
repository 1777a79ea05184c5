//! Persistence layer for the entity store

use crate::error::StorageError;
use crate::model::{
    CaptureInfo, Peer, PeerRecord, PeerSnapshotStats, Project, ProjectStatus, Report,
    ReportStatus, Snapshot, SnapshotOwner, Subject,
};
use crate::store::{conflict_for, Dataset, EntityStore, ProjectFilter};
use crate::types::{PeerId, ReportId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::path::Path;
use tracing::{debug, warn};

const TREE_PROJECTS: &str = "projects";
const TREE_PEERS: &str = "peers";
const TREE_SUBJECTS: &str = "subjects";
const TREE_SNAPSHOTS: &str = "snapshots";
const TREE_CAPTURES: &str = "snapshot_captures";
const TREE_REPORTS: &str = "reports";
const TREE_INITIAL_REPORTS: &str = "initial_reports";
const SNAPSHOT_TS_PAD: usize = 20;

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("sled error: {}", err),
    ))
}

fn from_transaction(err: TransactionError<StorageError>) -> StorageError {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => to_storage_io(err),
    }
}

fn abort<T>(err: StorageError) -> Result<T, ConflictableTransactionError<StorageError>> {
    Err(ConflictableTransactionError::Abort(err))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(value)
        .map_err(|e| StorageError::Serialization(format!("Failed to serialize record: {}", e)))
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T, StorageError> {
    bincode::deserialize(raw)
        .map_err(|e| StorageError::Serialization(format!("Failed to deserialize record: {}", e)))
}

/// Owner ids are hex-encoded so no id can extend another owner's prefix.
fn owner_segment(owner: &SnapshotOwner) -> String {
    match owner {
        SnapshotOwner::Peer(id) => format!("peer:{}", hex::encode(id)),
        SnapshotOwner::Subject(id) => format!("subject:{}", hex::encode(id)),
    }
}

/// Snapshot keys sort by owner, then capture time, so a reversed prefix scan
/// yields the newest snapshots first.
fn snapshot_key(snapshot: &Snapshot) -> String {
    let ts = snapshot.captured_at.timestamp_millis().max(0);
    format!(
        "{}/{:0width$}/{}",
        owner_segment(&snapshot.owner),
        ts,
        snapshot.id,
        width = SNAPSHOT_TS_PAD
    )
}

fn snapshot_prefix(owner: &SnapshotOwner) -> String {
    format!("{}/", owner_segment(owner))
}

/// Capture facts stored beside each snapshot under the same key, so stats
/// never decode snapshot content.
#[derive(Debug, Serialize, Deserialize)]
struct CaptureRecord {
    captured_at: DateTime<Utc>,
    succeeded: bool,
    content_bytes: u64,
}

impl From<&Snapshot> for CaptureRecord {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            captured_at: snapshot.captured_at,
            succeeded: snapshot.capture_succeeded,
            content_bytes: snapshot.content.len() as u64,
        }
    }
}

impl From<CaptureRecord> for CaptureInfo {
    fn from(record: CaptureRecord) -> Self {
        Self {
            captured_at: record.captured_at,
            succeeded: record.succeeded,
            content_bytes: record.content_bytes as usize,
        }
    }
}

/// Sled-based implementation of EntityStore
pub struct SledEntityStore {
    db: sled::Db,
    projects: sled::Tree,
    peers: sled::Tree,
    subjects: sled::Tree,
    snapshots: sled::Tree,
    captures: sled::Tree,
    reports: sled::Tree,
    /// project id -> id of its initial report
    initial_reports: sled::Tree,
}

impl SledEntityStore {
    /// Open (or create) a store at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::from_db(db)
    }

    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            projects: db.open_tree(TREE_PROJECTS).map_err(to_storage_io)?,
            peers: db.open_tree(TREE_PEERS).map_err(to_storage_io)?,
            subjects: db.open_tree(TREE_SUBJECTS).map_err(to_storage_io)?,
            snapshots: db.open_tree(TREE_SNAPSHOTS).map_err(to_storage_io)?,
            captures: db.open_tree(TREE_CAPTURES).map_err(to_storage_io)?,
            reports: db.open_tree(TREE_REPORTS).map_err(to_storage_io)?,
            initial_reports: db.open_tree(TREE_INITIAL_REPORTS).map_err(to_storage_io)?,
            db,
        })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }

    pub fn put_project(&self, project: &Project) -> Result<(), StorageError> {
        self.projects
            .insert(project.id.as_bytes(), encode(project)?)
            .map_err(to_storage_io)?;
        Ok(())
    }

    pub fn put_peer(&self, peer: &Peer) -> Result<(), StorageError> {
        self.peers
            .insert(peer.id.as_bytes(), encode(peer)?)
            .map_err(to_storage_io)?;
        Ok(())
    }

    pub fn put_subject(&self, subject: &Subject) -> Result<(), StorageError> {
        self.subjects
            .insert(subject.id.as_bytes(), encode(subject)?)
            .map_err(to_storage_io)?;
        Ok(())
    }

    /// Write the snapshot and its capture record together.
    pub fn put_snapshot(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let key = snapshot_key(snapshot);
        let body = encode(snapshot)?;
        let capture = encode(&CaptureRecord::from(snapshot))?;
        (&self.snapshots, &self.captures)
            .transaction(|(snapshots, captures)| {
                snapshots.insert(key.as_bytes(), body.as_slice())?;
                captures.insert(key.as_bytes(), capture.as_slice())?;
                Ok(())
            })
            .map_err(from_transaction)
    }

    /// Write every record of a dataset and flush once.
    pub fn import(&self, dataset: &Dataset) -> Result<usize, StorageError> {
        for project in &dataset.projects {
            self.put_project(project)?;
        }
        for peer in &dataset.peers {
            self.put_peer(peer)?;
        }
        for subject in &dataset.subjects {
            self.put_subject(subject)?;
        }
        for snapshot in &dataset.snapshots {
            self.put_snapshot(snapshot)?;
        }
        self.flush()?;
        debug!(records = dataset.record_count(), "Imported dataset");
        Ok(dataset.record_count())
    }

    fn read<T: DeserializeOwned>(tree: &sled::Tree, key: &str) -> Result<Option<T>, StorageError> {
        match tree.get(key.as_bytes()).map_err(to_storage_io)? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn project_or_err(&self, project_id: &str) -> Result<Project, StorageError> {
        Self::read(&self.projects, project_id)?
            .ok_or_else(|| StorageError::ProjectNotFound(project_id.to_string()))
    }

    fn recent_snapshots(
        &self,
        owner: &SnapshotOwner,
        limit: usize,
    ) -> Result<Vec<Snapshot>, StorageError> {
        let mut out = Vec::with_capacity(limit);
        for item in self
            .snapshots
            .scan_prefix(snapshot_prefix(owner).as_bytes())
            .rev()
            .take(limit)
        {
            let (_, value) = item.map_err(to_storage_io)?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    fn live_initial_report(&self, project_id: &str) -> Result<Option<Report>, StorageError> {
        let Some(raw_id) = self
            .initial_reports
            .get(project_id.as_bytes())
            .map_err(to_storage_io)?
        else {
            return Ok(None);
        };
        let report_id = String::from_utf8_lossy(&raw_id).to_string();
        let report: Option<Report> = Self::read(&self.reports, &report_id)?;
        Ok(report.filter(Report::holds_initial_slot))
    }
}

#[async_trait]
impl EntityStore for SledEntityStore {
    async fn get_project(&self, project_id: &str) -> Result<Option<Project>, StorageError> {
        Self::read(&self.projects, project_id)
    }

    async fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, StorageError> {
        let mut out = Vec::new();
        for item in self.projects.iter() {
            let (_, value) = item.map_err(to_storage_io)?;
            let project: Project = decode(&value)?;
            if filter.matches(&project) {
                out.push(project);
            }
        }
        Ok(out)
    }

    async fn list_peer_ids(&self, project_id: &str) -> Result<Vec<PeerId>, StorageError> {
        Ok(self.project_or_err(project_id)?.peer_ids)
    }

    async fn load_peers(
        &self,
        peer_ids: &[PeerId],
        snapshot_limit: usize,
    ) -> Result<Vec<PeerRecord>, StorageError> {
        let mut out = Vec::with_capacity(peer_ids.len());
        for peer_id in peer_ids {
            let Some(peer) = Self::read::<Peer>(&self.peers, peer_id)? else {
                warn!(peer_id = %peer_id, "Peer record missing, skipping");
                continue;
            };
            let snapshots =
                self.recent_snapshots(&SnapshotOwner::Peer(peer_id.clone()), snapshot_limit)?;
            out.push(PeerRecord { peer, snapshots });
        }
        Ok(out)
    }

    async fn peer_snapshot_stats(
        &self,
        project_id: &str,
    ) -> Result<Vec<PeerSnapshotStats>, StorageError> {
        let project = self.project_or_err(project_id)?;
        let mut out = Vec::with_capacity(project.peer_ids.len());
        for peer_id in &project.peer_ids {
            let low_quality = Self::read::<Peer>(&self.peers, peer_id)?
                .map(|p| p.is_low_quality())
                .unwrap_or(true);
            let prefix = snapshot_prefix(&SnapshotOwner::Peer(peer_id.clone()));
            let mut captures = Vec::new();
            for item in self.captures.scan_prefix(prefix.as_bytes()).rev() {
                let (_, value) = item.map_err(to_storage_io)?;
                captures.push(CaptureInfo::from(decode::<CaptureRecord>(&value)?));
            }
            out.push(PeerSnapshotStats {
                peer_id: peer_id.clone(),
                low_quality,
                captures,
            });
        }
        Ok(out)
    }

    async fn get_subject(&self, subject_id: &str) -> Result<Option<Subject>, StorageError> {
        Self::read(&self.subjects, subject_id)
    }

    async fn subject_snapshots(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<Snapshot>, StorageError> {
        self.recent_snapshots(&SnapshotOwner::Subject(subject_id.to_string()), limit)
    }

    async fn list_available_peers(
        &self,
        exclude: &[PeerId],
        limit: usize,
    ) -> Result<Vec<Peer>, StorageError> {
        let mut out = Vec::new();
        for item in self.peers.iter() {
            if out.len() >= limit {
                break;
            }
            let (_, value) = item.map_err(to_storage_io)?;
            let peer: Peer = decode(&value)?;
            if !exclude.contains(&peer.id) {
                out.push(peer);
            }
        }
        Ok(out)
    }

    async fn attach_peers(
        &self,
        project_id: &str,
        peer_ids: &[PeerId],
    ) -> Result<(), StorageError> {
        for peer_id in peer_ids {
            if !self
                .peers
                .contains_key(peer_id.as_bytes())
                .map_err(to_storage_io)?
            {
                return Err(StorageError::PeerNotFound(peer_id.clone()));
            }
        }
        let mut project = self.project_or_err(project_id)?;
        for peer_id in peer_ids {
            if !project.peer_ids.contains(peer_id) {
                project.peer_ids.push(peer_id.clone());
            }
        }
        self.put_project(&project)?;
        self.flush()
    }

    async fn set_project_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
    ) -> Result<(), StorageError> {
        let mut project = self.project_or_err(project_id)?;
        project.status = status;
        self.put_project(&project)?;
        self.flush()
    }

    async fn find_initial_report(&self, project_id: &str) -> Result<Option<Report>, StorageError> {
        self.live_initial_report(project_id)
    }

    async fn get_report(&self, report_id: &str) -> Result<Option<Report>, StorageError> {
        Self::read(&self.reports, report_id)
    }

    /// The slot check and both writes run in one transaction: either the
    /// report and its index entry land together or nothing does.
    async fn create_report(&self, report: &Report) -> Result<(), StorageError> {
        let body = encode(report)?;
        (&self.reports, &self.initial_reports)
            .transaction(|(reports, initial_reports)| {
                if report.holds_initial_slot() {
                    if let Some(existing_id) = initial_reports.get(report.project_id.as_bytes())? {
                        if let Some(raw) = reports.get(&existing_id[..])? {
                            let existing: Report =
                                decode(&raw).map_err(ConflictableTransactionError::Abort)?;
                            if existing.holds_initial_slot() {
                                return abort(conflict_for(report, &existing.id));
                            }
                        }
                    }
                }
                if reports.get(report.id.as_bytes())?.is_some() {
                    return abort(StorageError::Conflict(format!(
                        "report {} already exists",
                        report.id
                    )));
                }
                reports.insert(report.id.as_bytes(), body.as_slice())?;
                if report.is_initial {
                    initial_reports.insert(report.project_id.as_bytes(), report.id.as_bytes())?;
                }
                Ok(())
            })
            .map_err(from_transaction)?;
        self.flush()
    }

    async fn set_report_status(
        &self,
        report_id: &ReportId,
        status: ReportStatus,
    ) -> Result<(), StorageError> {
        self.reports
            .transaction(|reports| {
                let Some(raw) = reports.get(report_id.as_bytes())? else {
                    return abort(StorageError::ReportNotFound(report_id.clone()));
                };
                let mut report: Report =
                    decode(&raw).map_err(ConflictableTransactionError::Abort)?;
                report.status = status;
                report.updated_at = Utc::now();
                let body = encode(&report).map_err(ConflictableTransactionError::Abort)?;
                reports.insert(report_id.as_bytes(), body)?;
                Ok(())
            })
            .map_err(from_transaction)?;
        self.flush()
    }
}
