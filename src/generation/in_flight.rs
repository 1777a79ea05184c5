//! Single-flight registry keyed by project id.
//!
//! The first caller for a project becomes the leader and holds an
//! `InFlightGuard`; later callers receive a channel that resolves with the
//! leader's result. The entry is removed when the guard completes or drops,
//! so a cancelled or panicking leader never strands its waiters.

use crate::error::ReportError;
use crate::generation::coordinator::GenerationResult;
use crate::types::ProjectId;
use crate::validation::{ResourceProbe, ResourceSnapshot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

struct InFlightEntry {
    started_at: Instant,
    waiters: Vec<oneshot::Sender<GenerationResult>>,
}

/// Outcome of asking to generate a project's report
pub enum Admission {
    /// No generation was running; the caller must run it and complete the guard.
    Leader(InFlightGuard),
    /// A generation is already running; await its result.
    Follower(oneshot::Receiver<GenerationResult>),
}

#[derive(Default)]
pub struct InFlightRegistry {
    entries: Mutex<HashMap<ProjectId, InFlightEntry>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(self: &Arc<Self>, project_id: &str) -> Admission {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(project_id) {
            let (tx, rx) = oneshot::channel();
            entry.waiters.push(tx);
            debug!(
                project_id = %project_id,
                waiters = entry.waiters.len(),
                leader_running_ms = entry.started_at.elapsed().as_millis() as u64,
                "Attached to in-flight generation"
            );
            return Admission::Follower(rx);
        }

        entries.insert(
            project_id.to_string(),
            InFlightEntry {
                started_at: Instant::now(),
                waiters: Vec::new(),
            },
        );
        Admission::Leader(InFlightGuard {
            registry: Arc::clone(self),
            project_id: project_id.to_string(),
            completed: false,
        })
    }

    pub fn active_count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.entries.lock().contains_key(project_id)
    }

    fn finish(&self, project_id: &str, result: GenerationResult) {
        let waiters = self
            .entries
            .lock()
            .remove(project_id)
            .map(|entry| entry.waiters)
            .unwrap_or_default();

        if !waiters.is_empty() {
            debug!(
                project_id = %project_id,
                waiters = waiters.len(),
                success = result.success,
                "Resolving in-flight waiters"
            );
        }
        for tx in waiters {
            let mut shared = result.clone();
            shared.deduplicated = true;
            let _ = tx.send(shared);
        }
    }
}

impl ResourceProbe for InFlightRegistry {
    fn snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            active_generations: self.active_count(),
        }
    }
}

/// Leader's claim on a project's single-flight slot
pub struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    project_id: ProjectId,
    completed: bool,
}

impl InFlightGuard {
    /// Release the slot and hand `result` to every waiter.
    pub fn complete(mut self, result: &GenerationResult) {
        self.completed = true;
        self.registry.finish(&self.project_id, result.clone());
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        warn!(project_id = %self.project_id, "Generation ended without a result, releasing waiters");
        let abandoned = GenerationResult::failure(
            &self.project_id,
            0,
            0,
            ReportError::TransientGeneration("generation was abandoned before completing".to_string()),
        );
        self.registry.finish(&self.project_id, abandoned);
    }
}
