//! Prompt composition, size ceilings, and templated fallback content.

use crate::model::TemplateTier;
use crate::report::digest::{clip, PeerDigest};
use std::fmt::Write as _;

/// Appended to any text cut down to the content ceiling
pub const TRUNCATION_MARKER: &str = "\n\n[... content truncated ...]";

/// Subject facts shared by every peer prompt
#[derive(Debug, Clone, Default)]
pub struct SubjectBrief {
    pub name: String,
    pub positioning: Option<String>,
    pub excerpt: String,
}

/// Cut `text` so the result never exceeds `limit` bytes. The cut lands on the
/// last line break before the limit when there is one, and the marker is
/// appended to anything that was shortened.
pub fn truncate_to_ceiling(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    if limit <= TRUNCATION_MARKER.len() {
        return clip(text, limit).to_string();
    }

    let head = clip(text, limit - TRUNCATION_MARKER.len());
    let head = match head.rfind('\n') {
        Some(pos) if pos > 0 => &head[..pos],
        _ => head,
    };
    let mut out = String::with_capacity(head.len() + TRUNCATION_MARKER.len());
    out.push_str(head.trim_end());
    out.push_str(TRUNCATION_MARKER);
    out
}

pub fn is_truncated(text: &str) -> bool {
    text.ends_with(TRUNCATION_MARKER)
}

fn tier_instructions(tier: TemplateTier) -> &'static str {
    match tier {
        TemplateTier::Basic => "Write two short paragraphs summarising this peer.",
        TemplateTier::Standard => {
            "Write a section covering positioning, notable changes, and what to watch."
        }
        TemplateTier::Comprehensive => {
            "Write a detailed section comparing this peer with the subject product, \
             covering positioning, notable changes, trends, and recommended responses."
        }
    }
}

/// Build the text-generation prompt for one peer section.
pub fn compose_prompt(
    digest: &PeerDigest,
    subject: Option<&SubjectBrief>,
    tier: TemplateTier,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Peer section for an initial competitive comparison report.\n{}\n",
        tier_instructions(tier)
    );
    let _ = writeln!(prompt, "Peer: {}", digest.name);
    if !digest.locator.is_empty() {
        let _ = writeln!(prompt, "Website: {}", digest.locator);
    }
    let _ = writeln!(
        prompt,
        "Snapshots considered: {} ({} successful)",
        digest.snapshots_considered, digest.successful_captures
    );
    if let Some(latest) = digest.latest_capture {
        let _ = writeln!(prompt, "Latest capture: {}", latest.to_rfc3339());
    }

    if !digest.key_changes.is_empty() {
        prompt.push_str("\nKey changes:\n");
        for change in &digest.key_changes {
            let _ = writeln!(prompt, "- {}", change);
        }
    }
    if !digest.trends.is_empty() {
        prompt.push_str("\nTrends:\n");
        for trend in &digest.trends {
            let _ = writeln!(prompt, "- {}", trend);
        }
    }

    if let Some(subject) = subject {
        let _ = writeln!(prompt, "\nSubject product: {}", subject.name);
        if let Some(positioning) = &subject.positioning {
            let _ = writeln!(prompt, "Subject positioning: {}", positioning);
        }
        if !subject.excerpt.is_empty() {
            let _ = writeln!(prompt, "Subject content excerpt:\n{}", subject.excerpt);
        }
    }

    if !digest.excerpt.is_empty() {
        let _ = writeln!(prompt, "\nLatest captured content excerpt:\n{}", digest.excerpt);
    }
    prompt
}

/// Templated paragraph built from counts alone. Used whenever generation is
/// skipped, fails, or times out.
pub fn template_section(
    digest: &PeerDigest,
    subject: Option<&SubjectBrief>,
    tier: TemplateTier,
) -> String {
    if !digest.loaded {
        return format!(
            "No data could be loaded for peer {}. It is listed here so the comparison stays complete.",
            digest.peer_id
        );
    }

    let mut body = String::new();
    let _ = write!(
        body,
        "{} was captured successfully {} times across the {} most recent snapshots",
        digest.name, digest.successful_captures, digest.snapshots_considered
    );
    match digest.latest_capture {
        Some(at) => {
            let _ = writeln!(body, "; the latest capture is from {}.", at.format("%Y-%m-%d"));
        }
        None => body.push_str(". No usable capture is available yet.\n"),
    }

    if digest.key_changes.is_empty() {
        body.push_str("\nNo content changes were detected between recent captures.\n");
    } else {
        body.push_str("\nKey changes:\n");
        for change in &digest.key_changes {
            let _ = writeln!(body, "- {}", change);
        }
    }

    if tier != TemplateTier::Basic && !digest.trends.is_empty() {
        body.push_str("\nTrends:\n");
        for trend in &digest.trends {
            let _ = writeln!(body, "- {}", trend);
        }
    }

    if tier == TemplateTier::Comprehensive {
        if let Some(subject) = subject {
            let _ = writeln!(
                body,
                "\nCompare these changes against {} to decide whether a response is needed.",
                subject.name
            );
        }
    }
    body
}

/// One-line summary for a peer beyond the section cap
pub fn overflow_line(digest: &PeerDigest) -> String {
    match digest.latest_capture {
        Some(at) => format!(
            "- {}: {} successful captures, {} key changes, latest {}",
            digest.name,
            digest.successful_captures,
            digest.key_changes.len(),
            at.format("%Y-%m-%d")
        ),
        None => format!("- {}: no usable captures", digest.name),
    }
}

/// Facts gathered across all chunks for the recommendations section
#[derive(Debug, Default, Clone)]
pub struct RecommendationInputs {
    pub templated_peers: usize,
    pub stale_peers: Vec<String>,
    pub low_quality_peers: Vec<String>,
    pub missing_peers: Vec<String>,
    pub has_subject: bool,
    pub peer_count: usize,
}

pub fn recommendations_body(inputs: &RecommendationInputs) -> String {
    let mut items = Vec::new();
    if inputs.templated_peers > 0 {
        items.push(format!(
            "Regenerate the {} templated peer sections once text generation is available.",
            inputs.templated_peers
        ));
    }
    if !inputs.stale_peers.is_empty() {
        items.push(format!(
            "Refresh snapshots for: {}.",
            inputs.stale_peers.join(", ")
        ));
    }
    if !inputs.low_quality_peers.is_empty() {
        items.push(format!(
            "Complete the name and website for: {}.",
            inputs.low_quality_peers.join(", ")
        ));
    }
    if !inputs.missing_peers.is_empty() {
        items.push(format!(
            "Remove or re-create peers that no longer resolve: {}.",
            inputs.missing_peers.join(", ")
        ));
    }
    if !inputs.has_subject {
        items.push("Link the project's own product to unlock side-by-side comparison.".to_string());
    }
    if inputs.peer_count < 3 {
        items.push("Track at least three peers for a representative comparison.".to_string());
    }
    if items.is_empty() {
        items.push("Review the key changes above and schedule the next comparison.".to_string());
    }

    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}
