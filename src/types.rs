//! Identifier aliases and small shared helpers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub type ProjectId = String;
pub type PeerId = String;
pub type SubjectId = String;
pub type SnapshotId = String;
pub type ReportId = String;

static RUN_COUNTER: AtomicU64 = AtomicU64::new(1);
static REPORT_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Correlating identifier for one backfill run.
pub fn new_run_id() -> String {
    let ts = now_millis();
    let pid = std::process::id();
    let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("run-{ts}-{pid}-{seq}")
}

/// Derive a report id from the owning project and the generation instant.
///
/// A process-local counter is mixed in so two reports generated for the same
/// project within one millisecond still get distinct ids.
pub fn new_report_id(project_id: &str, generated_at_ms: u64) -> ReportId {
    let seq = REPORT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = blake3::Hasher::new();
    hasher.update(project_id.as_bytes());
    hasher.update(&generated_at_ms.to_be_bytes());
    hasher.update(&seq.to_be_bytes());
    hasher.update(&std::process::id().to_be_bytes());
    let digest = hasher.finalize();
    format!("rpt_{}", &hex::encode(digest.as_bytes())[..32])
}

/// Content fingerprint used to skip diffing identical snapshots.
pub fn content_digest(content: &[u8]) -> [u8; 32] {
    *blake3::hash(content).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(new_run_id(), new_run_id());
    }

    #[test]
    fn report_ids_are_prefixed_and_unique() {
        let a = new_report_id("proj-1", 1_700_000_000_000);
        let b = new_report_id("proj-1", 1_700_000_000_000);
        assert!(a.starts_with("rpt_"));
        assert_eq!(a.len(), 4 + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn identical_content_has_identical_digest() {
        assert_eq!(content_digest(b"pricing page"), content_digest(b"pricing page"));
        assert_ne!(content_digest(b"pricing page"), content_digest(b"pricing page v2"));
    }
}
