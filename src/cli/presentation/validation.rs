//! Validation presentation: check table and issue lists.

use super::shared::{bullet_section, heading, pass_mark};
use crate::validation::ValidationResult;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;

pub fn format_validation_result_text(result: &ValidationResult) -> String {
    let verdict = if result.overall_passed {
        "PASSED".green().to_string()
    } else if result.can_proceed {
        "PROCEED WITH FALLBACK".yellow().to_string()
    } else {
        "BLOCKED".red().to_string()
    };

    let mut out = heading(&format!("Validation: {}", result.project_id));
    out.push_str(&format!(
        "\n  Verdict: {}\n  Score: {}/100\n  Estimated quality: {}\n  Fallback recommended: {}\n",
        verdict,
        result.overall_score,
        result.estimated_quality,
        if result.recommend_fallback { "yes" } else { "no" }
    ));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Check", "Passed", "Score", "Weight", "Required", "ms"]);
    for check in &result.checks {
        table.add_row(vec![
            check.check.label().to_string(),
            pass_mark(check.passed),
            check.score.to_string(),
            check.weight.to_string(),
            if check.required { "yes" } else { "no" }.to_string(),
            check.duration_ms.to_string(),
        ]);
    }
    out.push('\n');
    out.push_str(&table.to_string());

    out.push_str(&bullet_section("Blocking issues", &result.blocking_issues));
    out.push_str(&bullet_section("Warnings", &result.warnings));
    out.push_str(&bullet_section("Recommendations", &result.recommendations));
    out
}
