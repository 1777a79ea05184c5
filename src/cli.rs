//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to pipeline services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{
    format_backfill_summary_text, format_generation_result_text, format_import_summary,
    format_validation_result_text, to_json,
};
pub use route::RunContext;
