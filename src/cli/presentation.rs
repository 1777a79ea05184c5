//! CLI presentation: text and json formatters per command family.

mod backfill;
mod generation;
mod shared;
mod validation;

pub use backfill::{format_backfill_summary_text, format_import_summary};
pub use generation::format_generation_result_text;
pub use shared::to_json;
pub use validation::format_validation_result_text;
