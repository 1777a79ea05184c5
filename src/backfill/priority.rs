//! Deterministic priority scoring for backfill candidates.

use crate::model::{Project, ProjectStatus};
use crate::types::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    High,
    Medium,
    Low,
}

impl PriorityTier {
    pub fn classify(score: u8, high_threshold: u8, medium_threshold: u8) -> Self {
        if score >= high_threshold {
            PriorityTier::High
        } else if score >= medium_threshold {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityTier::High => "high",
            PriorityTier::Medium => "medium",
            PriorityTier::Low => "low",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PriorityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(PriorityTier::High),
            "medium" => Ok(PriorityTier::Medium),
            "low" => Ok(PriorityTier::Low),
            other => Err(format!("unknown priority tier '{}'", other)),
        }
    }
}

/// Per-factor contributions to a priority score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub status: u8,
    pub peers: u8,
    pub subject: u8,
    pub recency: u8,
    pub contact: u8,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u8 {
        self.status + self.peers + self.subject + self.recency + self.contact
    }
}

/// A project queued for backfill, with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub project_id: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub peer_count: usize,
    pub has_subject: bool,
    pub score: u8,
    pub tier: PriorityTier,
    pub breakdown: ScoreBreakdown,
}

impl Candidate {
    pub fn from_project(
        project: &Project,
        now: DateTime<Utc>,
        high_threshold: u8,
        medium_threshold: u8,
    ) -> Self {
        let breakdown = score_breakdown(project, now);
        let score = breakdown.total();
        Self {
            project_id: project.id.clone(),
            name: project.name.clone(),
            status: project.status,
            created_at: project.created_at,
            peer_count: project.peer_ids.len(),
            has_subject: project.subject_id.is_some(),
            score,
            tier: PriorityTier::classify(score, high_threshold, medium_threshold),
            breakdown,
        }
    }
}

/// Highest score first, then newest project, then id.
pub fn candidate_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.project_id.cmp(&b.project_id))
}

pub fn score_breakdown(project: &Project, now: DateTime<Utc>) -> ScoreBreakdown {
    let status = match project.status {
        ProjectStatus::Active => 30,
        ProjectStatus::Draft => 20,
        ProjectStatus::Paused => 10,
        ProjectStatus::Archived => 0,
    };
    let peers = match project.peer_ids.len() {
        n if n >= 5 => 25,
        n if n >= 3 => 20,
        n if n >= 1 => 15,
        _ => 0,
    };
    let subject = if project.subject_id.is_some() { 15 } else { 0 };
    let recency = match project.age_days(now) {
        d if d <= 7 => 20,
        d if d <= 30 => 15,
        d if d <= 90 => 10,
        _ => 5,
    };
    let contact = match project.owner_contact.as_deref() {
        Some(contact) if !is_placeholder_contact(contact) => 10,
        _ => 0,
    };
    ScoreBreakdown {
        status,
        peers,
        subject,
        recency,
        contact,
    }
}

pub fn is_placeholder_contact(contact: &str) -> bool {
    let contact = contact.trim().to_ascii_lowercase();
    contact.is_empty()
        || contact.ends_with("@example.com")
        || contact.contains("placeholder")
        || contact.starts_with("test@")
        || contact.starts_with("noreply")
        || contact.starts_with("no-reply")
}
