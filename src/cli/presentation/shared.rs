//! Shared presentation helpers.

use owo_colors::OwoColorize;
use serde::Serialize;

/// Pretty JSON for any serializable result.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

pub fn pass_mark(passed: bool) -> String {
    if passed {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

pub fn heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Indented bullet list under a label; empty lists render nothing.
pub fn bullet_section(label: &str, items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut out = format!("\n{} ({}):", label, items.len());
    for item in items {
        out.push_str(&format!("\n  - {}", item));
    }
    out
}
