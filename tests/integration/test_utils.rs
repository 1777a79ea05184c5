//! Shared fixtures for integration tests
//!
//! Seeds stores with projects, peers, subjects, and snapshots, and provides
//! controllable text generators and report builders.

use async_trait::async_trait;
use benchline::delay::RecordingSleeper;
use benchline::error::ReportError;
use benchline::generation::{CoordinatorConfig, GenerationCoordinator};
use benchline::model::{
    Peer, Project, ProjectStatus, Report, Snapshot, SnapshotOwner, Subject,
};
use benchline::provider::TextGenerator;
use benchline::report::{BuildRequest, BuilderConfig, ChunkedReportBuilder, ReportBuilder};
use benchline::store::{Dataset, EntityStore, MemoryEntityStore};
use benchline::validation::{PrerequisiteValidator, ValidatorConfig};
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SNAPSHOT_BODY: &str =
    "Pricing page lists Starter, Team, and Enterprise plans with feature tables.\n";

/// Options for one seeded project
pub struct ProjectSeed<'a> {
    pub id: &'a str,
    pub status: ProjectStatus,
    pub peers: usize,
    pub with_subject: bool,
    pub age_days: i64,
}

impl<'a> ProjectSeed<'a> {
    pub fn active(id: &'a str, peers: usize) -> Self {
        Self {
            id,
            status: ProjectStatus::Active,
            peers,
            with_subject: true,
            age_days: 1,
        }
    }
}

/// Build a dataset for one project: peers with two recent snapshots each and
/// an optional complete subject.
pub fn project_dataset(seed: &ProjectSeed<'_>) -> Dataset {
    let now = Utc::now();
    let mut dataset = Dataset::default();
    let mut peer_ids = Vec::new();

    for i in 0..seed.peers {
        let id = format!("{}-peer-{}", seed.id, i);
        dataset.peers.push(Peer {
            id: id.clone(),
            name: format!("Peer {}", i),
            locator: format!("https://peer{}.example.org", i),
        });
        for (n, hours) in [(0, 30), (1, 2)] {
            dataset.snapshots.push(Snapshot {
                id: format!("{}-snap-{}", id, n),
                owner: SnapshotOwner::Peer(id.clone()),
                captured_at: now - ChronoDuration::hours(hours),
                content: format!("{}Revision {}\n", SNAPSHOT_BODY.repeat(2), n),
                capture_succeeded: true,
            });
        }
        peer_ids.push(id);
    }

    let subject_id = seed.with_subject.then(|| format!("{}-subject", seed.id));
    if let Some(subject_id) = &subject_id {
        dataset.subjects.push(Subject {
            id: subject_id.clone(),
            name: "Our Product".to_string(),
            locator: "https://product.example.org".to_string(),
            positioning: Some("Analytics for small research teams".to_string()),
        });
        dataset.snapshots.push(Snapshot {
            id: format!("{}-snap", subject_id),
            owner: SnapshotOwner::Subject(subject_id.clone()),
            captured_at: now - ChronoDuration::hours(3),
            content: SNAPSHOT_BODY.repeat(2),
            capture_succeeded: true,
        });
    }

    dataset.projects.push(Project {
        id: seed.id.to_string(),
        name: format!("Project {}", seed.id),
        status: seed.status,
        created_at: now - ChronoDuration::days(seed.age_days),
        owner_contact: Some(format!("owner@{}.io", seed.id)),
        peer_ids,
        subject_id,
    });
    dataset
}

pub fn seed(store: &MemoryEntityStore, seed: ProjectSeed<'_>) {
    store.import(project_dataset(&seed));
}

/// Returns a fixed reply, optionally after a delay, failing for prompts that
/// mention any of the configured peer names.
pub struct ScriptedGenerator {
    pub delay: Duration,
    pub failing_peers: HashSet<String>,
    pub calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            failing_peers: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_for(mut self, peer_name: &str) -> Self {
        self.failing_peers.insert(peer_name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ReportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self
            .failing_peers
            .iter()
            .any(|name| prompt.contains(&format!("Peer: {}\n", name)))
        {
            return Err(ReportError::ProviderRequestFailed("HTTP 503".to_string()));
        }
        Ok("Generated comparative analysis.\nPositioning is moving upmarket.".to_string())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

/// Counts builds and fails the first `failures` of them.
pub struct CountingBuilder {
    pub inner: ChunkedReportBuilder,
    pub failures: usize,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<BuildRequest>>,
}

impl CountingBuilder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportBuilder for CountingBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<Report, ReportError> {
        self.requests.lock().push(request.clone());
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(ReportError::ProviderRateLimit(format!("attempt {}", call)));
        }
        self.inner.build(request).await
    }
}

pub struct Pipeline {
    pub coordinator: Arc<GenerationCoordinator>,
    pub builder: Arc<CountingBuilder>,
    pub sleeper: Arc<RecordingSleeper>,
}

/// Wire validator, builder, and coordinator over `store` with no real sleeps.
pub fn pipeline(
    store: Arc<dyn EntityStore>,
    generator: Arc<dyn TextGenerator>,
    failures: usize,
) -> Pipeline {
    let inner = ChunkedReportBuilder::new(store.clone(), generator, BuilderConfig::default())
        .with_sleeper(Arc::new(RecordingSleeper::new()));
    let builder = Arc::new(CountingBuilder {
        inner,
        failures,
        calls: AtomicUsize::new(0),
        requests: Mutex::new(Vec::new()),
    });
    let sleeper = Arc::new(RecordingSleeper::new());
    let validator = PrerequisiteValidator::new(store.clone(), ValidatorConfig::default());
    let coordinator = GenerationCoordinator::new(
        store,
        validator,
        builder.clone(),
        CoordinatorConfig::default(),
    )
    .with_sleeper(sleeper.clone());
    Pipeline {
        coordinator: Arc::new(coordinator),
        builder,
        sleeper,
    }
}
