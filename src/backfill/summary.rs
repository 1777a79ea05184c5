//! Run summary and its on-disk artifacts.

use crate::backfill::priority::PriorityTier;
use crate::types::{ProjectId, ReportId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectOutcome {
    Succeeded,
    Failed,
    /// An initial report already existed
    Skipped,
    /// Dry run: would have been attempted
    Planned,
}

impl ProjectOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectOutcome::Succeeded => "succeeded",
            ProjectOutcome::Failed => "failed",
            ProjectOutcome::Skipped => "skipped",
            ProjectOutcome::Planned => "planned",
        }
    }
}

/// Outcome for one project in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub project_id: ProjectId,
    pub project_name: String,
    pub batch: usize,
    pub priority_score: u8,
    pub tier: PriorityTier,
    pub outcome: ProjectOutcome,
    pub report_id: Option<ReportId>,
    pub attempts: usize,
    pub fallback_used: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub index: usize,
    pub project_ids: Vec<ProjectId>,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl TierCounts {
    pub fn record(&mut self, tier: PriorityTier) {
        match tier {
            PriorityTier::High => self.high += 1,
            PriorityTier::Medium => self.medium += 1,
            PriorityTier::Low => self.low += 1,
        }
    }
}

/// Aggregate outcome of one backfill run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub run_id: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Projects scanned that lacked an initial report
    pub candidates: usize,
    /// Projects excluded at scan time because they already had one
    pub already_reported: usize,
    pub tiers: TierCounts,
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Percent of attempted projects that succeeded
    pub success_rate: f64,
    /// Scheduling stopped after a failed batch
    pub stopped_early: bool,
    pub batches: Vec<BatchSummary>,
    pub results: Vec<ProcessingResult>,
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,
}

impl ProcessingSummary {
    /// Recompute counts from `results`.
    pub fn tally(&mut self) {
        let count = |outcome: ProjectOutcome| self.results.iter().filter(|r| r.outcome == outcome).count();
        self.successful = count(ProjectOutcome::Succeeded);
        self.failed = count(ProjectOutcome::Failed);
        self.skipped = count(ProjectOutcome::Skipped);
        self.total_processed = self.successful + self.failed + self.skipped;
        let attempted = self.successful + self.failed;
        self.success_rate = if attempted == 0 {
            100.0
        } else {
            (self.successful as f64 / attempted as f64 * 1000.0).round() / 10.0
        };
    }

    pub fn json_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("backfill-{}.json", self.run_id))
    }

    pub fn markdown_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("backfill-{}.md", self.run_id))
    }

    /// Write the JSON summary and the markdown run report into `dir`.
    pub fn write_artifacts(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let json_path = self.json_path(dir);
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&json_path, json)?;

        let md_path = self.markdown_path(dir);
        std::fs::write(&md_path, self.render_markdown())?;
        Ok(vec![json_path, md_path])
    }

    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Backfill run {}\n", self.run_id);
        let _ = writeln!(
            out,
            "- Mode: {}",
            if self.dry_run { "dry run" } else { "live" }
        );
        let _ = writeln!(out, "- Started: {}", self.started_at.to_rfc3339());
        let _ = writeln!(out, "- Duration: {} ms", self.duration_ms);
        let _ = writeln!(
            out,
            "- Candidates: {} (high {}, medium {}, low {})",
            self.candidates, self.tiers.high, self.tiers.medium, self.tiers.low
        );
        let _ = writeln!(out, "- Already reported: {}", self.already_reported);
        if !self.dry_run {
            let _ = writeln!(
                out,
                "- Successful: {} / Failed: {} / Skipped: {}",
                self.successful, self.failed, self.skipped
            );
            let _ = writeln!(out, "- Success rate: {:.1}%", self.success_rate);
        }
        if self.stopped_early {
            out.push_str("- Stopped early after a failed batch\n");
        }

        if !self.batches.is_empty() {
            out.push_str("\n## Batches\n\n");
            out.push_str("| Batch | Projects | Successful | Failed | Skipped | Duration (ms) |\n");
            out.push_str("|---|---|---|---|---|---|\n");
            for batch in &self.batches {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} | {} |",
                    batch.index + 1,
                    batch.project_ids.len(),
                    batch.successful,
                    batch.failed,
                    batch.skipped,
                    batch.duration_ms
                );
            }
        }

        if !self.results.is_empty() {
            out.push_str("\n## Projects\n\n");
            out.push_str("| Project | Tier | Score | Outcome | Report | Attempts | Error |\n");
            out.push_str("|---|---|---|---|---|---|---|\n");
            for result in &self.results {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} | {} | {} |",
                    result.project_name,
                    result.tier,
                    result.priority_score,
                    result.outcome.as_str(),
                    result.report_id.as_deref().unwrap_or("-"),
                    result.attempts,
                    result
                        .error
                        .as_deref()
                        .map(|e| e.replace('|', "/"))
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        out
    }
}
