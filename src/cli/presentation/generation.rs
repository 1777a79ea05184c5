//! Generation presentation: outcome of `ensure`.

use super::shared::heading;
use crate::generation::GenerationResult;
use owo_colors::OwoColorize;

pub fn format_generation_result_text(result: &GenerationResult) -> String {
    let status = match (result.success, result.already_existed, result.deduplicated) {
        (true, true, _) => "EXISTING".cyan().to_string(),
        (true, false, true) => "GENERATED (shared)".green().to_string(),
        (true, false, false) => "GENERATED".green().to_string(),
        (false, _, _) => "FAILED".red().to_string(),
    };

    let mut out = heading(&format!("Initial report: {}", result.project_id));
    out.push_str(&format!("\n  Status: {}", status));
    if let Some(report_id) = &result.report_id {
        out.push_str(&format!("\n  Report: {}", report_id));
    }
    if let Some(quality) = result.quality {
        out.push_str(&format!("\n  Quality: {}", quality));
    }
    if let Some(score) = result.validation_score {
        out.push_str(&format!("\n  Validation score: {}/100", score));
    }
    out.push_str(&format!(
        "\n  Attempts: {}\n  Fallback used: {}\n  Time: {} ms",
        result.attempts,
        if result.fallback_used { "yes" } else { "no" },
        result.processing_time_ms
    ));
    if let Some(message) = result.error_message() {
        out.push_str(&format!("\n  Error: {}", message.red()));
    }
    out
}
