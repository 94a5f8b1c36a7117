//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// catalogctl - Declarative catalog migration.
#[derive(Parser, Debug)]
#[command(name = "catalogctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "CATALOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log format; overrides the config file.
    #[arg(long, global = true)]
    pub log_format: Option<LogFormatArg>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the migration configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Migrate application domains from source to target (PRESENT).
    Migrate {
        /// Compute decisions without changing the target.
        #[arg(long)]
        checkmode: bool,

        /// Application domains to migrate (repeatable).
        #[arg(long = "include", value_name = "DOMAIN")]
        include: Vec<String>,

        /// Application domains to skip (repeatable).
        #[arg(long = "exclude", value_name = "DOMAIN")]
        exclude: Vec<String>,

        /// Prefix joined to target application domain names.
        #[arg(long)]
        prefix: Option<String>,

        /// Run id to use instead of a generated one.
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Remove what a run created, or domains under a prefix (ABSENT).
    Absent {
        /// Run whose objects are removed.
        #[arg(long, conflicts_with = "prefix", required_unless_present = "prefix")]
        run_id: Option<String>,

        /// Remove every target application domain starting with this prefix.
        #[arg(long)]
        prefix: Option<String>,

        /// Compute decisions without changing the target.
        #[arg(long)]
        checkmode: bool,

        /// Maximum number of removal passes.
        #[arg(long)]
        max_passes: Option<u32>,
    },

    /// Show a stored run report, or list reports without a run id.
    Report {
        /// Run id of the report.
        run_id: Option<String>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_flags() {
        let cli = Cli::try_parse_from([
            "catalogctl",
            "migrate",
            "--checkmode",
            "--include",
            "Acme Rideshare",
            "--include",
            "Nils Rideshare",
            "--prefix",
            "copy/",
        ])
        .unwrap();

        match cli.command {
            Commands::Migrate {
                checkmode,
                include,
                prefix,
                ..
            } => {
                assert!(checkmode);
                assert_eq!(include.len(), 2);
                assert_eq!(prefix.as_deref(), Some("copy/"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_absent_needs_run_id_or_prefix() {
        assert!(Cli::try_parse_from(["catalogctl", "absent"]).is_err());
        assert!(Cli::try_parse_from(["catalogctl", "absent", "--run-id", "a", "--prefix", "bb"]).is_err());
        assert!(Cli::try_parse_from(["catalogctl", "absent", "--prefix", "tmp/"]).is_ok());
    }

    #[test]
    fn test_global_output() {
        let cli = Cli::try_parse_from(["catalogctl", "report", "--output", "json"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
    }
}
