//! Light auto-repair for the two safe, reversible validation failures:
//! a project with no peers and a project parked in draft or paused.

use crate::error::StorageError;
use crate::model::ProjectStatus;
use crate::store::EntityStore;
use crate::types::PeerId;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    pub attached_peers: Vec<PeerId>,
    pub activated: bool,
}

impl RepairOutcome {
    pub fn applied(&self) -> bool {
        self.activated || !self.attached_peers.is_empty()
    }
}

pub async fn auto_repair(
    store: &dyn EntityStore,
    project_id: &str,
    peer_limit: usize,
) -> Result<RepairOutcome, StorageError> {
    let mut outcome = RepairOutcome::default();
    let Some(project) = store.get_project(project_id).await? else {
        return Ok(outcome);
    };

    if project.peer_ids.is_empty() && peer_limit > 0 {
        let candidates: Vec<PeerId> = store
            .list_available_peers(&project.peer_ids, peer_limit)
            .await?
            .into_iter()
            .map(|peer| peer.id)
            .collect();
        if !candidates.is_empty() {
            store.attach_peers(project_id, &candidates).await?;
            info!(
                project_id = %project_id,
                peers = candidates.len(),
                "Auto-repair attached peers"
            );
            outcome.attached_peers = candidates;
        }
    }

    if project.status.is_repairable() {
        store
            .set_project_status(project_id, ProjectStatus::Active)
            .await?;
        info!(
            project_id = %project_id,
            from = %project.status,
            "Auto-repair activated project"
        );
        outcome.activated = true;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Peer, Project};
    use crate::store::MemoryEntityStore;
    use chrono::Utc;

    fn store(status: ProjectStatus, available_peers: usize) -> MemoryEntityStore {
        let store = MemoryEntityStore::new();
        for i in 0..available_peers {
            store.put_peer(Peer {
                id: format!("peer-{}", i),
                name: format!("Peer {}", i),
                locator: "https://peer.test".to_string(),
            });
        }
        store.put_project(Project {
            id: "proj".to_string(),
            name: "Project".to_string(),
            status,
            created_at: Utc::now(),
            owner_contact: None,
            peer_ids: Vec::new(),
            subject_id: None,
        });
        store
    }

    #[tokio::test]
    async fn attaches_bounded_peers_and_activates() {
        let store = store(ProjectStatus::Draft, 8);
        let outcome = auto_repair(&store, "proj", 5).await.unwrap();

        assert_eq!(outcome.attached_peers.len(), 5);
        assert!(outcome.activated);
        let project = store.project("proj").unwrap();
        assert_eq!(project.peer_ids.len(), 5);
        assert_eq!(project.status, ProjectStatus::Active);
    }

    #[tokio::test]
    async fn archived_project_is_left_alone() {
        let store = store(ProjectStatus::Archived, 0);
        let outcome = auto_repair(&store, "proj", 5).await.unwrap();
        assert!(!outcome.applied());
        assert_eq!(store.project("proj").unwrap().status, ProjectStatus::Archived);
    }
}
