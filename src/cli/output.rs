//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying run reports,
//! validation results and report listings in text or JSON.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{MigrateConfig, ValidationResult};
use crate::planner::TaskAction;
use crate::session::{KindCounters, RunIssue, RunReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Per-kind counter row for table display.
#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Processed")]
    processed: u32,
    #[tabled(rename = "Created")]
    created: u32,
    #[tabled(rename = "First ver.")]
    first_versions: u32,
    #[tabled(rename = "New ver.")]
    new_versions: u32,
    #[tabled(rename = "Updated")]
    updated: u32,
    #[tabled(rename = "Deleted")]
    deleted: u32,
    #[tabled(rename = "Unchanged")]
    unchanged: u32,
    #[tabled(rename = "Planned")]
    planned: u32,
    #[tabled(rename = "Issues")]
    issues: u32,
}

impl KindRow {
    fn new(kind: String, c: KindCounters) -> Self {
        Self {
            kind,
            processed: c.processed,
            created: c.created,
            first_versions: c.first_versions,
            new_versions: c.new_versions,
            updated: c.updated,
            deleted: c.deleted,
            unchanged: c.unchanged,
            planned: c.planned,
            issues: c.issues,
        }
    }
}

/// Issue row for table display.
#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Identity")]
    identity: String,
    #[tabled(rename = "Error")]
    error_kind: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&RunIssue> for IssueRow {
    fn from(issue: &RunIssue) -> Self {
        Self {
            kind: issue.kind.to_string(),
            identity: OutputFormatter::truncate(&issue.identity, 32),
            error_kind: issue.error_kind.to_string(),
            message: OutputFormatter::truncate(&issue.message, 60),
        }
    }
}

/// Log entry row for table display.
#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Identity")]
    identity: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a run report.
    ///
    /// With `detailed`, text output also lists every logged action.
    #[must_use]
    pub fn format_report(&self, report: &RunReport, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report, detailed),
        }
    }

    fn format_report_text(report: &RunReport, detailed: bool) -> String {
        let mut output = String::new();

        let mode = if report.checkmode { " (checkmode)" } else { "" };
        let _ = writeln!(output, "\nRun {} - {}{mode}", report.run_id.bold(), report.state);
        let _ = writeln!(
            output,
            "   Started {}, finished {}",
            report.started_at.format("%Y-%m-%d %H:%M:%S"),
            report.finished_at.format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(fingerprint) = &report.config_fingerprint {
            let _ = writeln!(output, "   Config fingerprint: {}", fingerprint.chars().take(8).collect::<String>());
        }
        output.push('\n');

        let rows: Vec<KindRow> = report
            .summary
            .per_kind
            .iter()
            .map(|(kind, counters)| KindRow::new(kind.to_string(), *counters))
            .collect();
        if rows.is_empty() {
            output.push_str("   Nothing to do.\n");
        } else {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if detailed && !report.log.is_empty() {
            let rows: Vec<ActionRow> = report
                .log
                .iter()
                .enumerate()
                .map(|(i, entry)| ActionRow {
                    index: i + 1,
                    action: Self::format_action(entry.action),
                    kind: entry.kind.to_string(),
                    identity: Self::truncate(&entry.identity, 40),
                })
                .collect();
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let totals = report.summary.totals();
        let _ = writeln!(
            output,
            "\nTotal: {} created, {} updated, {} deleted, {} unchanged, {} planned",
            (totals.created + totals.first_versions + totals.new_versions).to_string().green(),
            totals.updated.to_string().yellow(),
            totals.deleted.to_string().red(),
            totals.unchanged,
            totals.planned.to_string().cyan()
        );

        if report.issues.is_empty() {
            let _ = writeln!(output, "{} No issues", "✓".green());
        } else {
            let _ = writeln!(output, "\n{} {} issue(s):", "✗".red(), report.issues.len());
            let rows: Vec<IssueRow> = report.issues.iter().map(IssueRow::from).collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        output
    }

    /// Formats a list of stored run ids, newest first.
    #[must_use]
    pub fn format_report_list(&self, run_ids: &[String]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(run_ids).unwrap_or_default(),
            OutputFormat::Text => {
                if run_ids.is_empty() {
                    return String::from("No run reports found.\n");
                }
                let mut output = String::from("Run reports (newest first):\n");
                for run_id in run_ids {
                    let _ = writeln!(output, "   {run_id}");
                }
                output
            }
        }
    }

    /// Formats a validation result with a short configuration summary.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &MigrateConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        let migrate = &config.migrate;
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.errors.is_empty(),
                "warnings": result.warnings,
                "state": migrate.state,
                "checkmode": migrate.checkmode,
                "applicationDomainPrefix": migrate.application_domain_prefix,
                "domains": migrate.domains,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid!\n", "✓".green());
                if show_warnings && !result.warnings.is_empty() {
                    output.push_str("\nWarnings:\n");
                    for warning in &result.warnings {
                        let _ = writeln!(output, "  {} {warning}", "⚠".yellow());
                    }
                }
                output.push_str("\nConfiguration summary:\n");
                let _ = writeln!(output, "  Source: {}", config.source.locator());
                let _ = writeln!(output, "  Target: {}", config.target.locator());
                let _ = writeln!(output, "  State: {}", migrate.state);
                let _ = writeln!(output, "  Checkmode: {}", migrate.checkmode);
                let domains = if migrate.domains.include.is_empty() {
                    String::from("all")
                } else {
                    migrate.domains.include.join(", ")
                };
                let _ = writeln!(output, "  Domains: {domains}");
                output
            }
        }
    }

    fn format_action(action: TaskAction) -> String {
        match action {
            TaskAction::Create | TaskAction::CreateFirstVersion => action.as_str().green().to_string(),
            TaskAction::Update => action.as_str().yellow().to_string(),
            TaskAction::Delete => action.as_str().red().to_string(),
            TaskAction::NoAction => action.as_str().dimmed().to_string(),
            TaskAction::WouldFailToUpdate => action.as_str().magenta().to_string(),
            TaskAction::WouldCreate | TaskAction::WouldUpdate | TaskAction::WouldDelete => {
                action.as_str().cyan().to_string()
            }
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.status_line("success", &"✓".green().to_string(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.status_line("error", &"✗".red().to_string(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.status_line("warning", &"⚠".yellow().to_string(), message)
    }

    fn status_line(&self, status: &str, symbol: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{symbol} {message}"),
        }
    }
}
