//! CLI command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Command name used as the `command` field in logs (e.g. "ensure", "backfill").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Ensure { .. } => "ensure",
        Commands::Validate { .. } => "validate",
        Commands::Backfill { dry_run: true, .. } => "backfill.dry_run",
        Commands::Backfill { .. } => "backfill",
        Commands::Import { .. } => "import",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parse::Cli;
    use clap::Parser;

    #[test]
    fn test_command_names() {
        let cli = Cli::parse_from(["benchline", "ensure", "proj-1"]);
        assert_eq!(command_name(&cli.command), "ensure");

        let cli = Cli::parse_from(["benchline", "backfill", "--dry-run", "--tier", "high"]);
        assert_eq!(command_name(&cli.command), "backfill.dry_run");
    }

    #[test]
    fn test_global_flags_precede_subcommand() {
        let cli = Cli::parse_from([
            "benchline",
            "--workspace",
            "/tmp/ws",
            "-q",
            "validate",
            "proj-1",
            "--strict",
            "--format",
            "json",
        ]);
        assert!(cli.quiet);
        match cli.command {
            Commands::Validate { strict, format, .. } => {
                assert!(strict);
                assert_eq!(format, crate::cli::parse::OutputFormat::Json);
            }
            _ => panic!("expected validate"),
        }
    }
}
