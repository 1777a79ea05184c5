//! Logging System
//!
//! Structured logging using the `tracing` crate. Level, format, and
//! destination come from `LoggingConfig`, overridable through `BENCHLINE_LOG*`
//! environment variables.

use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Where and how pipeline events are logged
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `false` leaves the process without a subscriber
    pub enabled: bool,
    /// `trace` through `error`, or `off`
    pub level: String,
    /// `text` or `json`
    pub format: String,
    /// `stdout`, `stderr`, `file`, or `file+stderr`
    pub output: String,
    /// Used when `output` writes to a file
    pub file: PathBuf,
    /// ANSI colors; ignored when a file is written
    pub color: bool,
    /// Per-target overrides, e.g. `benchline::report = "debug"`
    pub modules: HashMap<String, String>,
}

fn default_log_file() -> PathBuf {
    PathBuf::from(".benchline/benchline.log")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: "text".to_string(),
            output: "stderr".to_string(),
            file: default_log_file(),
            color: true,
            modules: HashMap::new(),
        }
    }
}

/// Install the global subscriber. `BENCHLINE_LOG*` variables beat `config`,
/// which already carries any CLI overrides. Fails if a subscriber exists.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ReportError> {
    if config.map(|c| !c.enabled).unwrap_or(false) {
        return Ok(());
    }

    let filter = env_filter(config)?;
    let format = resolve_format(config)?;
    let output = resolve_output(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true) && !output.file;

    let writer = match (output.file, output.stderr, output.stdout) {
        (true, true, _) => {
            let file = Arc::new(open_log_file(config)?);
            BoxMakeWriter::new(file.and(std::io::stderr))
        }
        (true, false, _) => BoxMakeWriter::new(Arc::new(open_log_file(config)?)),
        (false, true, _) => BoxMakeWriter::new(std::io::stderr),
        (false, false, _) => BoxMakeWriter::new(std::io::stdout),
    };

    let registry = Registry::default().with(filter);
    let result = if format == "json" {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(writer),
            )
            .try_init()
    };

    result.map_err(|e| ReportError::Config(format!("Failed to install logger: {}", e)))
}

fn open_log_file(config: Option<&LoggingConfig>) -> Result<File, ReportError> {
    let log_file = config.map_or_else(default_log_file, |c| c.file.clone());
    if let Some(dir) = log_file.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| ReportError::Config(format!("Failed to create log directory: {}", e)))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .map_err(|e| ReportError::Config(format!("Failed to open log file {:?}: {}", log_file, e)))
}

fn env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, ReportError> {
    if let Ok(filter) = EnvFilter::try_from_env("BENCHLINE_LOG") {
        return Ok(filter);
    }

    let Some(config) = config else {
        return Ok(EnvFilter::new("info"));
    };
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    for (target, target_level) in &config.modules {
        filter = filter.add_directive(parse_directive(target, target_level)?);
    }

    if let Ok(modules_str) = std::env::var("BENCHLINE_LOG_MODULES") {
        for (target, target_level) in parse_module_levels(&modules_str) {
            filter = filter.add_directive(parse_directive(target, target_level)?);
        }
    }

    Ok(filter)
}

fn parse_directive(
    module: &str,
    level: &str,
) -> Result<tracing_subscriber::filter::Directive, ReportError> {
    format!("{}={}", module, level)
        .parse()
        .map_err(|e| ReportError::Config(format!("Invalid log directive: {}", e)))
}

/// `module=level,module=level`; malformed entries are skipped
fn parse_module_levels(raw: &str) -> Vec<(&str, &str)> {
    raw.split(',')
        .filter_map(|entry| {
            let (module, level) = entry.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            (!module.is_empty() && !level.is_empty()).then_some((module, level))
        })
        .collect()
}

/// An unrecognised `BENCHLINE_LOG_FORMAT` falls back to the config value.
fn resolve_format(config: Option<&LoggingConfig>) -> Result<String, ReportError> {
    let from_env = std::env::var("BENCHLINE_LOG_FORMAT")
        .ok()
        .filter(|f| matches!(f.as_str(), "json" | "text"));
    let format = match from_env {
        Some(format) => format,
        None => config.map(|c| c.format.clone()).unwrap_or_else(|| "text".to_string()),
    };
    match format.as_str() {
        "json" | "text" => Ok(format),
        other => Err(ReportError::Config(format!(
            "Unknown log format '{}', expected text or json",
            other
        ))),
    }
}

#[derive(Debug, PartialEq, Eq)]
struct OutputDestinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

fn resolve_output(config: Option<&LoggingConfig>) -> Result<OutputDestinations, ReportError> {
    match std::env::var("BENCHLINE_LOG_OUTPUT") {
        Ok(output) => parse_output_destinations(&output),
        Err(_) => parse_output_destinations(config.map_or("stderr", |c| c.output.as_str())),
    }
}

fn parse_output_destinations(output: &str) -> Result<OutputDestinations, ReportError> {
    let (stdout, stderr, file) = match output {
        "stdout" => (true, false, false),
        "stderr" => (false, true, false),
        "file" => (false, false, true),
        "file+stderr" => (false, true, true),
        _ => {
            return Err(ReportError::Config(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', or 'file+stderr')",
                output
            )))
        }
    };
    Ok(OutputDestinations {
        stdout,
        stderr,
        file,
    })
}
