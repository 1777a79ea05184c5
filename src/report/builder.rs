//! Chunked report builder
//!
//! Peer ids are loaded first, then full records are loaded one chunk at a time
//! and reduced to bounded digests. Peak memory is one chunk of snapshots plus
//! the finished sections, however many peers the project has.

use crate::delay::{Sleeper, TokioSleeper};
use crate::error::{ReportError, StorageError};
use crate::model::{
    Project, Report, ReportMetadata, ReportQuality, ReportSection, ReportStatus, ReportVersion,
    SectionKind, SectionSource, TemplateTier,
};
use crate::provider::TextGenerator;
use crate::report::content::{
    compose_prompt, overflow_line, recommendations_body, template_section, truncate_to_ceiling,
    RecommendationInputs, SubjectBrief,
};
use crate::report::digest::{clip, DigestLimits, PeerDigest};
use crate::store::EntityStore;
use crate::types::{new_report_id, PeerId, ProjectId};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Builder limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Peers loaded per chunk
    pub chunk_size: usize,
    /// Most recent snapshots consulted per peer
    pub snapshots_per_peer: usize,
    pub max_key_changes: usize,
    pub max_trends: usize,
    pub max_change_chars: usize,
    /// Bytes of the newest snapshot quoted in prompts
    pub excerpt_bytes: usize,
    /// Ceiling for any section body
    pub max_content_bytes: usize,
    /// Prompts above this skip generation entirely
    pub max_prompt_bytes: usize,
    pub max_peer_sections: usize,
    pub generation_timeout_ms: u64,
    pub inter_chunk_pause_ms: u64,
    pub fresh_snapshot_hours: u64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2,
            snapshots_per_peer: 5,
            max_key_changes: 5,
            max_trends: 3,
            max_change_chars: 160,
            excerpt_bytes: 4 * 1024,
            max_content_bytes: 50 * 1024,
            max_prompt_bytes: 50 * 1024,
            max_peer_sections: 20,
            generation_timeout_ms: 60_000,
            inter_chunk_pause_ms: 100,
            fresh_snapshot_hours: 24,
        }
    }
}

impl BuilderConfig {
    fn digest_limits(&self) -> DigestLimits {
        DigestLimits {
            max_key_changes: self.max_key_changes,
            max_trends: self.max_trends,
            max_change_chars: self.max_change_chars,
            excerpt_bytes: self.excerpt_bytes,
            fresh_window: ChronoDuration::hours(self.fresh_snapshot_hours as i64),
        }
    }
}

/// Inputs for one build attempt
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    pub project_id: ProjectId,
    pub template_tier: TemplateTier,
    /// Accept a report whose peer sections are all templated
    pub allow_fallback: bool,
    /// Refuse to build unless at least one peer has a fresh snapshot
    pub require_fresh_snapshots: bool,
    pub attempt: usize,
    pub validation_score: u8,
    pub required_failed: bool,
}

impl BuildRequest {
    pub fn new(project_id: impl Into<ProjectId>, template_tier: TemplateTier) -> Self {
        Self {
            project_id: project_id.into(),
            template_tier,
            allow_fallback: true,
            require_fresh_snapshots: false,
            attempt: 1,
            validation_score: 100,
            required_failed: false,
        }
    }
}

#[async_trait]
pub trait ReportBuilder: Send + Sync {
    /// Build and persist a complete initial report, or persist nothing.
    async fn build(&self, request: &BuildRequest) -> Result<Report, ReportError>;
}

/// Sections and running tallies accumulated across chunks
#[derive(Default)]
struct Assembly {
    sections: Vec<ReportSection>,
    overflow: Vec<String>,
    chunk_sizes: Vec<usize>,
    generated: usize,
    fallback: usize,
    recommendations: RecommendationInputs,
}

pub struct ChunkedReportBuilder {
    store: Arc<dyn EntityStore>,
    generator: Arc<dyn TextGenerator>,
    config: BuilderConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl ChunkedReportBuilder {
    pub fn new(
        store: Arc<dyn EntityStore>,
        generator: Arc<dyn TextGenerator>,
        config: BuilderConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    async fn load_subject(&self, project: &Project) -> Result<Option<SubjectBrief>, ReportError> {
        let Some(subject_id) = &project.subject_id else {
            return Ok(None);
        };
        let Some(subject) = self.store.get_subject(subject_id).await? else {
            return Ok(None);
        };
        let excerpt = self
            .store
            .subject_snapshots(subject_id, 1)
            .await?
            .into_iter()
            .find(|s| s.capture_succeeded)
            .map(|s| clip(&s.content, self.config.excerpt_bytes).to_string())
            .unwrap_or_default();
        Ok(Some(SubjectBrief {
            name: subject.name,
            positioning: subject.positioning,
            excerpt,
        }))
    }

    async fn ensure_fresh_data(&self, project_id: &str) -> Result<(), ReportError> {
        let window = ChronoDuration::hours(self.config.fresh_snapshot_hours as i64);
        let now = Utc::now();
        let fresh = self
            .store
            .peer_snapshot_stats(project_id)
            .await?
            .iter()
            .flat_map(|s| s.captures.iter())
            .any(|c| c.succeeded && c.content_bytes > 0 && now - c.captured_at <= window);
        if fresh {
            Ok(())
        } else {
            Err(ReportError::InsufficientData(format!(
                "no peer has a snapshot newer than {} hours",
                self.config.fresh_snapshot_hours
            )))
        }
    }

    /// Body and source for one peer. Never fails: oversized prompts, provider
    /// errors, panics, and timeouts all produce the templated paragraph.
    async fn peer_body(
        &self,
        digest: &PeerDigest,
        subject: Option<&SubjectBrief>,
        tier: TemplateTier,
    ) -> (String, SectionSource) {
        let limit = self.config.max_content_bytes;
        let template = || truncate_to_ceiling(&template_section(digest, subject, tier), limit);

        if !digest.loaded {
            return (template(), SectionSource::Template);
        }

        let prompt = compose_prompt(digest, subject, tier);
        if prompt.len() > self.config.max_prompt_bytes {
            let err = ReportError::ContentTooLarge {
                size: prompt.len(),
                limit: self.config.max_prompt_bytes,
            };
            debug!(peer_id = %digest.peer_id, error = %err, "Skipping generation for oversized prompt");
            return (template(), SectionSource::Template);
        }

        let timeout = Duration::from_millis(self.config.generation_timeout_ms);
        let call = AssertUnwindSafe(self.generator.generate(&prompt)).catch_unwind();
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(text))) => (truncate_to_ceiling(&text, limit), SectionSource::Generated),
            Ok(Ok(Err(err))) => {
                warn!(peer_id = %digest.peer_id, provider = self.generator.name(), error = %err, "Text generation failed, using template");
                (template(), SectionSource::Template)
            }
            Ok(Err(_)) => {
                warn!(peer_id = %digest.peer_id, provider = self.generator.name(), "Text generation panicked, using template");
                (template(), SectionSource::Template)
            }
            Err(_) => {
                warn!(peer_id = %digest.peer_id, provider = self.generator.name(), timeout_ms = self.config.generation_timeout_ms, "Text generation timed out, using template");
                (template(), SectionSource::Template)
            }
        }
    }

    async fn process_chunk(
        &self,
        chunk: &[PeerId],
        offset: usize,
        subject: Option<&SubjectBrief>,
        tier: TemplateTier,
        assembly: &mut Assembly,
    ) -> Result<(), ReportError> {
        let limits = self.config.digest_limits();
        let now = Utc::now();

        let mut records: HashMap<PeerId, _> = self
            .store
            .load_peers(chunk, self.config.snapshots_per_peer)
            .await?
            .into_iter()
            .map(|record| (record.peer.id.clone(), record))
            .collect();

        // Reduce to digests in list order; each record is consumed here.
        let digests: Vec<PeerDigest> = chunk
            .iter()
            .map(|id| match records.remove(id) {
                Some(record) => PeerDigest::extract(record, &limits, now),
                None => PeerDigest::missing(id),
            })
            .collect();
        drop(records);

        for (index, digest) in digests.iter().enumerate() {
            let notes = &mut assembly.recommendations;
            if !digest.loaded {
                notes.missing_peers.push(digest.peer_id.clone());
            } else {
                if !digest.fresh {
                    notes.stale_peers.push(digest.name.clone());
                }
                if digest.low_quality {
                    notes.low_quality_peers.push(digest.name.clone());
                }
            }

            if offset + index >= self.config.max_peer_sections {
                assembly.overflow.push(overflow_line(digest));
                continue;
            }

            let (body, source) = self.peer_body(digest, subject, tier).await;
            match source {
                SectionSource::Generated => assembly.generated += 1,
                SectionSource::Template => assembly.fallback += 1,
            }
            assembly.sections.push(ReportSection {
                position: 0,
                kind: SectionKind::Peer,
                heading: digest.name.clone(),
                body,
                source,
                peer_id: Some(digest.peer_id.clone()),
            });
        }
        drop(digests);

        assembly.chunk_sizes.push(chunk.len());
        Ok(())
    }

    fn assemble(
        &self,
        project: &Project,
        subject: Option<&SubjectBrief>,
        request: &BuildRequest,
        peer_count: usize,
        assembly: Assembly,
    ) -> Report {
        let Assembly {
            mut sections,
            overflow,
            chunk_sizes,
            generated,
            fallback,
            mut recommendations,
        } = assembly;

        if !overflow.is_empty() {
            let body = truncate_to_ceiling(
                &format!(
                    "{} further peers are tracked beyond the {} detailed sections:\n{}",
                    overflow.len(),
                    self.config.max_peer_sections,
                    overflow.join("\n")
                ),
                self.config.max_content_bytes,
            );
            sections.push(ReportSection {
                position: 0,
                kind: SectionKind::AdditionalPeers,
                heading: "Additional peers".to_string(),
                body,
                source: SectionSource::Template,
                peer_id: None,
            });
        }

        recommendations.templated_peers = fallback;
        recommendations.has_subject = subject.is_some();
        recommendations.peer_count = peer_count;
        sections.push(ReportSection {
            position: 0,
            kind: SectionKind::Recommendations,
            heading: "Recommendations".to_string(),
            body: truncate_to_ceiling(
                &recommendations_body(&recommendations),
                self.config.max_content_bytes,
            ),
            source: SectionSource::Template,
            peer_id: None,
        });
        for (position, section) in sections.iter_mut().enumerate() {
            section.position = position;
        }

        let now = Utc::now();
        let title = format!("Initial comparative report: {}", project.name);
        let description = match subject {
            Some(subject) => format!(
                "How {} compares against {} tracked peers",
                subject.name, peer_count
            ),
            None => format!("Overview of {} tracked peers for {}", peer_count, project.name),
        };
        let quality = ReportQuality::classify(
            request.validation_score,
            request.required_failed,
            generated,
            fallback,
        );

        let mut content = format!("# {}\n\n{}\n", title, description);
        for section in &sections {
            let _ = write!(content, "\n## {}\n\n{}\n", section.heading, section.body.trim_end());
        }

        Report {
            id: new_report_id(&project.id, now.timestamp_millis().max(0) as u64),
            project_id: project.id.clone(),
            is_initial: true,
            status: ReportStatus::Completed,
            title,
            description,
            sections,
            metadata: ReportMetadata {
                peer_count,
                generated_at: now,
                chunk_sizes,
                generated_sections: generated,
                fallback_sections: fallback,
                template_tier: request.template_tier,
                quality,
            },
            version: ReportVersion {
                number: 1,
                content,
                created_at: now,
            },
            created_at: now,
            updated_at: now,
        }
    }

    async fn persist(&self, report: Report) -> Result<Report, ReportError> {
        match self.store.create_report(&report).await {
            Ok(()) => Ok(report),
            Err(StorageError::Conflict(reason)) => {
                // Another writer claimed the initial slot first; its report wins.
                match self.store.find_initial_report(&report.project_id).await? {
                    Some(existing) => {
                        info!(
                            project_id = %report.project_id,
                            report_id = %existing.id,
                            discarded = %report.id,
                            "Initial report already present, returning it"
                        );
                        Ok(existing)
                    }
                    None => Err(StorageError::Conflict(reason).into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ReportBuilder for ChunkedReportBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<Report, ReportError> {
        let started = Instant::now();
        let project = self
            .store
            .get_project(&request.project_id)
            .await?
            .ok_or_else(|| StorageError::ProjectNotFound(request.project_id.clone()))?;

        let peer_ids = self.store.list_peer_ids(&project.id).await?;
        if request.require_fresh_snapshots {
            self.ensure_fresh_data(&project.id).await?;
        }
        let subject = self.load_subject(&project).await?;

        let chunk_size = self.config.chunk_size.max(1);
        let chunk_count = peer_ids.len().div_ceil(chunk_size);
        let pause = Duration::from_millis(self.config.inter_chunk_pause_ms);
        let mut assembly = Assembly::default();

        for (index, chunk) in peer_ids.chunks(chunk_size).enumerate() {
            debug!(
                project_id = %project.id,
                chunk = index + 1,
                chunks = chunk_count,
                peers = chunk.len(),
                "Processing peer chunk"
            );
            self.process_chunk(
                chunk,
                index * chunk_size,
                subject.as_ref(),
                request.template_tier,
                &mut assembly,
            )
            .await?;
            if index + 1 < chunk_count {
                self.sleeper.sleep(pause).await;
            }
        }

        if !request.allow_fallback && !peer_ids.is_empty() && assembly.generated == 0 {
            return Err(ReportError::DegradedContent(format!(
                "all {} peer sections used templated content",
                assembly.fallback
            )));
        }

        let report = self.assemble(&project, subject.as_ref(), request, peer_ids.len(), assembly);
        let report = self.persist(report).await?;

        info!(
            project_id = %project.id,
            report_id = %report.id,
            peers = report.metadata.peer_count,
            generated = report.metadata.generated_sections,
            fallback = report.metadata.fallback_sections,
            quality = %report.metadata.quality,
            duration_ms = started.elapsed().as_millis() as u64,
            "Initial report built"
        );
        Ok(report)
    }
}
