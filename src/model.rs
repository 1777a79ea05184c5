//! Data model shared by the validator, builder, coordinator, and scheduler.
//!
//! Projects, peers, subjects, and snapshots are written by external flows and
//! are read-only here. Reports are created by the builder.

use crate::types::{PeerId, ProjectId, ReportId, SnapshotId, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Active,
    Paused,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Active => "active",
            ProjectStatus::Paused => "paused",
            ProjectStatus::Archived => "archived",
        }
    }

    /// Statuses the coordinator may flip to active during auto-repair.
    pub fn is_repairable(self) -> bool {
        matches!(self, ProjectStatus::Draft | ProjectStatus::Paused)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(ProjectStatus::Draft),
            "active" => Ok(ProjectStatus::Active),
            "paused" => Ok(ProjectStatus::Paused),
            "archived" => Ok(ProjectStatus::Archived),
            other => Err(format!("unknown project status '{}'", other)),
        }
    }
}

/// A research project comparing a subject entity against tracked peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    /// Owner contact (usually an email address)
    pub owner_contact: Option<String>,
    pub peer_ids: Vec<PeerId>,
    pub subject_id: Option<SubjectId>,
}

impl Project {
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days().max(0)
    }
}

/// A tracked comparison entity (competitor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub name: String,
    pub locator: String,
}

impl Peer {
    /// Peers without a name or locator degrade validation but never block it.
    pub fn is_low_quality(&self) -> bool {
        self.name.trim().is_empty() || self.locator.trim().is_empty()
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// The project's own entity (product)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub locator: String,
    pub positioning: Option<String>,
}

impl Subject {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.locator.trim().is_empty()
            && self
                .positioning
                .as_deref()
                .map(|p| !p.trim().is_empty())
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotOwner {
    Peer(PeerId),
    Subject(SubjectId),
}

impl SnapshotOwner {
    pub fn key(&self) -> String {
        match self {
            SnapshotOwner::Peer(id) => format!("peer:{}", id),
            SnapshotOwner::Subject(id) => format!("subject:{}", id),
        }
    }
}

/// Captured, timestamped content for a peer or subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub owner: SnapshotOwner,
    pub captured_at: DateTime<Utc>,
    pub content: String,
    pub capture_succeeded: bool,
}

/// A peer together with its most recent snapshots (newest first)
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub peer: Peer,
    pub snapshots: Vec<Snapshot>,
}

/// Payload-free capture facts for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureInfo {
    pub captured_at: DateTime<Utc>,
    pub succeeded: bool,
    pub content_bytes: usize,
}

/// Per-peer snapshot facts consulted by the validator.
#[derive(Debug, Clone)]
pub struct PeerSnapshotStats {
    pub peer_id: PeerId,
    pub low_quality: bool,
    pub captures: Vec<CaptureInfo>,
}

impl PeerSnapshotStats {
    pub fn successful(&self) -> usize {
        self.captures
            .iter()
            .filter(|c| c.succeeded && c.content_bytes > 0)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Generating,
    Completed,
    Failed,
}

impl ReportStatus {
    /// Statuses that count towards the one-initial-report-per-project invariant.
    pub fn holds_initial_slot(self) -> bool {
        matches!(self, ReportStatus::Generating | ReportStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Peer,
    AdditionalPeers,
    Recommendations,
}

/// Where a section body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionSource {
    Generated,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub position: usize,
    pub kind: SectionKind,
    pub heading: String,
    pub body: String,
    pub source: SectionSource,
    pub peer_id: Option<PeerId>,
}

/// Report template depth, picked from peer count and subject presence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateTier {
    Basic,
    Standard,
    Comprehensive,
}

impl TemplateTier {
    pub fn select(peer_count: usize, has_subject: bool) -> Self {
        match (peer_count, has_subject) {
            (n, true) if n >= 3 => TemplateTier::Comprehensive,
            (n, _) if n >= 1 => TemplateTier::Standard,
            _ => TemplateTier::Basic,
        }
    }
}

/// Coarse classification of expected or achieved report completeness
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportQuality {
    Critical,
    Low,
    Medium,
    High,
}

impl ReportQuality {
    /// Tier expected from a validation outcome alone.
    pub fn from_validation(score: u8, required_failed: bool) -> Self {
        if required_failed || score < 30 {
            ReportQuality::Critical
        } else if score >= 85 {
            ReportQuality::High
        } else if score >= 70 {
            ReportQuality::Medium
        } else {
            ReportQuality::Low
        }
    }

    /// The single quality function for a finished report: the validation tier,
    /// dropped one step when more than half of the peer sections are templated.
    pub fn classify(
        validation_score: u8,
        required_failed: bool,
        generated_sections: usize,
        fallback_sections: usize,
    ) -> Self {
        let base = Self::from_validation(validation_score, required_failed);
        let total = generated_sections + fallback_sections;
        if total > 0 && fallback_sections * 2 > total {
            base.downgrade()
        } else {
            base
        }
    }

    pub fn downgrade(self) -> Self {
        match self {
            ReportQuality::High => ReportQuality::Medium,
            ReportQuality::Medium => ReportQuality::Low,
            ReportQuality::Low | ReportQuality::Critical => ReportQuality::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportQuality::High => "HIGH",
            ReportQuality::Medium => "MEDIUM",
            ReportQuality::Low => "LOW",
            ReportQuality::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ReportQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub peer_count: usize,
    pub generated_at: DateTime<Utc>,
    /// Number of peers in each chunk, in processing order
    pub chunk_sizes: Vec<usize>,
    pub generated_sections: usize,
    pub fallback_sections: usize,
    pub template_tier: TemplateTier,
    pub quality: ReportQuality,
}

/// Rendered, versioned content of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportVersion {
    pub number: u32,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub project_id: ProjectId,
    pub is_initial: bool,
    pub status: ReportStatus,
    pub title: String,
    pub description: String,
    pub sections: Vec<ReportSection>,
    pub metadata: ReportMetadata,
    pub version: ReportVersion,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn peer_sections(&self) -> impl Iterator<Item = &ReportSection> {
        self.sections.iter().filter(|s| s.kind == SectionKind::Peer)
    }

    /// Whether this report occupies the project's initial-report slot.
    pub fn holds_initial_slot(&self) -> bool {
        self.is_initial && self.status.holds_initial_slot()
    }
}
