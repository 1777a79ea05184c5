//! benchline CLI Binary
//!
//! Command-line interface for validating projects and generating their
//! initial comparative reports.

use benchline::cli::{Cli, RunContext};
use benchline::config::ConfigLoader;
use benchline::logging::{init_logging, LoggingConfig};
use clap::Parser;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!(workspace = %cli.workspace.display(), "benchline starting");

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error initializing workspace: {:#}", e);
            eprintln!("{}", benchline::cli::map_error(&e));
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{}", benchline::cli::map_error(&e));
            process::exit(1);
        }
    }
}

/// Build logging configuration from CLI args, environment, and config file
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path).map(|c| c.logging),
        None => ConfigLoader::load(&cli.workspace).map(|c| c.logging),
    }
    .unwrap_or_default();

    if cli.quiet {
        config.enabled = false;
        return config;
    }
    if cli.verbose {
        config.level = "debug".to_string();
    }

    // CLI arguments win over file and env
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        config.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        config.file = file.clone();
    } else if config.file.is_relative() {
        config.file = cli.workspace.join(&config.file);
    }

    config
}
