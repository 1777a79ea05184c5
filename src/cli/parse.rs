//! CLI parse: clap types for benchline. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// benchline - initial comparative reports for peer-tracking projects
#[derive(Parser)]
#[command(name = "benchline")]
#[command(about = "Validate projects and generate their initial comparative reports")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', conflicts_with = "quiet")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ensure a project has its initial report, generating it if needed
    Ensure {
        /// Project id
        project_id: String,
        /// Request origin (api, interactive, scheduled, backfill)
        #[arg(long, default_value = "interactive")]
        origin: String,
        /// Validate with the strict pass threshold
        #[arg(long)]
        strict: bool,
        /// Accept templated sections from the first attempt
        #[arg(long)]
        allow_fallback: bool,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Run the prerequisite checks for a project without generating
    Validate {
        /// Project id
        project_id: String,
        /// Validate with the strict pass threshold
        #[arg(long)]
        strict: bool,
        /// Use the lower fallback proceed threshold
        #[arg(long)]
        allow_fallback: bool,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Generate initial reports for every eligible project that lacks one
    Backfill {
        /// Plan and report without generating
        #[arg(long)]
        dry_run: bool,
        /// Only process one priority tier (high, medium, low)
        #[arg(long)]
        tier: Option<String>,
        /// Projects per batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Projects generated concurrently within a batch
        #[arg(long)]
        max_concurrent: Option<usize>,
        /// Stop after this many projects
        #[arg(long)]
        max_projects: Option<usize>,
        /// Only projects at least this many days old
        #[arg(long)]
        min_age_days: Option<u64>,
        /// Only projects at most this many days old
        #[arg(long)]
        max_age_days: Option<u64>,
        /// Stop scheduling batches after one with a failure
        #[arg(long)]
        stop_on_error: bool,
        /// Directory for the run summary artifacts
        #[arg(long)]
        output: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Import projects, peers, subjects, and snapshots from a JSON dataset
    Import {
        /// Dataset file
        file: PathBuf,
    },
}
