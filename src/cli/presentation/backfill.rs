//! Backfill presentation: run totals and per-project table.

use super::shared::heading;
use crate::backfill::ProcessingSummary;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use std::path::Path;

pub fn format_backfill_summary_text(summary: &ProcessingSummary) -> String {
    let title = if summary.dry_run {
        format!("Backfill plan {}", summary.run_id)
    } else {
        format!("Backfill run {}", summary.run_id)
    };
    let mut out = heading(&title);
    out.push_str(&format!(
        "\n  Candidates: {} (high {}, medium {}, low {})\n  Already reported: {}\n  Batches: {}",
        summary.candidates,
        summary.tiers.high,
        summary.tiers.medium,
        summary.tiers.low,
        summary.already_reported,
        summary.batches.len()
    ));
    if !summary.dry_run {
        out.push_str(&format!(
            "\n  Successful: {}  Failed: {}  Skipped: {}\n  Success rate: {:.1}%\n  Duration: {} ms",
            summary.successful,
            summary.failed,
            summary.skipped,
            summary.success_rate,
            summary.duration_ms
        ));
    }
    if summary.stopped_early {
        out.push_str("\n  Stopped early after a failed batch");
    }

    if !summary.results.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Batch", "Project", "Tier", "Score", "Outcome", "Report"]);
        for result in &summary.results {
            table.add_row(vec![
                (result.batch + 1).to_string(),
                result.project_name.clone(),
                result.tier.to_string(),
                result.priority_score.to_string(),
                result.outcome.as_str().to_string(),
                result.report_id.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        out.push('\n');
        out.push_str(&table.to_string());
    }

    for artifact in &summary.artifacts {
        out.push_str(&format!("\nWrote {}", artifact.display()));
    }
    out
}

pub fn format_import_summary(records: usize, source: &Path, store: &Path) -> String {
    format!(
        "Imported {} records from {} into {}",
        records,
        source.display(),
        store.display()
    )
}
