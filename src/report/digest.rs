//! Bounded per-peer summaries extracted from raw snapshots.
//!
//! `PeerDigest::extract` consumes the loaded `PeerRecord`, so snapshot
//! payloads are released as soon as the summary exists.

use crate::model::{PeerRecord, Snapshot};
use crate::types::{content_digest, PeerId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Caps applied while summarising one peer
#[derive(Debug, Clone, Copy)]
pub struct DigestLimits {
    pub max_key_changes: usize,
    pub max_trends: usize,
    pub max_change_chars: usize,
    pub excerpt_bytes: usize,
    pub fresh_window: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeerDigest {
    pub peer_id: PeerId,
    pub name: String,
    pub locator: String,
    /// False when the peer id did not resolve to a stored record
    pub loaded: bool,
    pub low_quality: bool,
    pub snapshots_considered: usize,
    pub successful_captures: usize,
    pub latest_capture: Option<DateTime<Utc>>,
    pub fresh: bool,
    pub key_changes: Vec<String>,
    pub trends: Vec<String>,
    pub excerpt: String,
}

impl PeerDigest {
    pub fn extract(record: PeerRecord, limits: &DigestLimits, now: DateTime<Utc>) -> Self {
        let PeerRecord { peer, snapshots } = record;
        let successful: Vec<&Snapshot> = snapshots
            .iter()
            .filter(|s| s.capture_succeeded && !s.content.is_empty())
            .collect();

        let latest_capture = successful.first().map(|s| s.captured_at);
        let fresh = latest_capture
            .map(|at| now - at <= limits.fresh_window)
            .unwrap_or(false);
        let excerpt = successful
            .first()
            .map(|s| clip(&s.content, limits.excerpt_bytes).to_string())
            .unwrap_or_default();

        Self {
            name: peer.display_name().to_string(),
            low_quality: peer.is_low_quality(),
            locator: peer.locator.clone(),
            peer_id: peer.id,
            loaded: true,
            snapshots_considered: snapshots.len(),
            successful_captures: successful.len(),
            latest_capture,
            fresh,
            key_changes: key_changes(&successful, limits),
            trends: trends(&snapshots, &successful, limits.max_trends),
            excerpt,
        }
    }

    /// Placeholder for a peer id the store could not resolve.
    pub fn missing(peer_id: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            name: peer_id.to_string(),
            locator: String::new(),
            loaded: false,
            low_quality: true,
            snapshots_considered: 0,
            successful_captures: 0,
            latest_capture: None,
            fresh: false,
            key_changes: Vec::new(),
            trends: Vec::new(),
            excerpt: String::new(),
        }
    }
}

/// Longest prefix of `text` that fits in `max_bytes` without splitting a char.
pub fn clip(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn change_line(prefix: &str, line: &str, max_chars: usize) -> String {
    let line: String = line.chars().take(max_chars).collect();
    format!("{}: {}", prefix, line)
}

// Diff adjacent successful snapshots (newest first), skipping identical pairs.
fn key_changes(successful: &[&Snapshot], limits: &DigestLimits) -> Vec<String> {
    let mut changes = Vec::new();
    for pair in successful.windows(2) {
        if changes.len() >= limits.max_key_changes {
            break;
        }
        let (newer, older) = (pair[0], pair[1]);
        if content_digest(newer.content.as_bytes()) == content_digest(older.content.as_bytes()) {
            continue;
        }

        let older_lines: HashSet<&str> = meaningful_lines(&older.content).collect();
        let newer_lines: HashSet<&str> = meaningful_lines(&newer.content).collect();

        for line in meaningful_lines(&newer.content).filter(|l| !older_lines.contains(l)) {
            if changes.len() >= limits.max_key_changes {
                break;
            }
            changes.push(change_line("Added", line, limits.max_change_chars));
        }
        for line in meaningful_lines(&older.content).filter(|l| !newer_lines.contains(l)) {
            if changes.len() >= limits.max_key_changes {
                break;
            }
            changes.push(change_line("Removed", line, limits.max_change_chars));
        }
    }
    changes
}

fn meaningful_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().map(str::trim).filter(|l| !l.is_empty())
}

fn trends(all: &[Snapshot], successful: &[&Snapshot], max_trends: usize) -> Vec<String> {
    let mut trends = Vec::new();

    if successful.len() >= 2 {
        let pairs = successful.len() - 1;
        let changed = successful
            .windows(2)
            .filter(|p| {
                content_digest(p[0].content.as_bytes()) != content_digest(p[1].content.as_bytes())
            })
            .count();
        trends.push(format!(
            "Content changed in {} of {} consecutive captures",
            changed, pairs
        ));

        let newest = successful[0].content.len() as f64;
        let oldest = successful[successful.len() - 1].content.len() as f64;
        if oldest > 0.0 {
            let delta = ((newest - oldest) / oldest * 100.0).round() as i64;
            if delta != 0 {
                let direction = if delta > 0 { "grew" } else { "shrank" };
                trends.push(format!(
                    "Captured content {} by {}% since {}",
                    direction,
                    delta.abs(),
                    successful[successful.len() - 1].captured_at.format("%Y-%m-%d")
                ));
            }
        }
    }

    let failed = all.len() - successful.len();
    if failed > 0 {
        trends.push(format!(
            "{} of {} recent captures failed or were empty",
            failed,
            all.len()
        ));
    }

    trends.truncate(max_trends);
    trends
}
