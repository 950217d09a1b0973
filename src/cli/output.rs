//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{DeployConfig, ValidationResult};
use crate::monitor::{MonitorOutcome, OperationKind};
use crate::planner::{PlanOutcome, PlanReport, ResourceChangeSummary, ValueChange};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Parameter or tag row for table display.
#[derive(Tabled)]
struct ValueChangeRow {
    #[tabled(rename = "")]
    marker: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Current")]
    before: String,
    #[tabled(rename = "Proposed")]
    after: String,
}

/// Resource change row for table display.
#[derive(Tabled)]
struct ResourceChangeRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Replacement")]
    replacement: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns true if output is machine-readable.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Formats a planning outcome for display.
    #[must_use]
    pub fn format_plan(&self, outcome: &PlanOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(outcome),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(outcome: &PlanOutcome) -> String {
        let report = match outcome {
            PlanOutcome::NoChanges => {
                return format!(
                    "{} No changes - the deployed template is up to date.\n",
                    "✓".green()
                );
            }
            PlanOutcome::EmptyChangeSet => {
                return format!("{} Change set contains no changes.\n", "✓".green());
            }
            PlanOutcome::Planned(report) => report,
        };

        let mut output = String::new();

        let _ = write!(
            output,
            "\n📋 Change set {} ({}) for stack {}\n\n",
            report.change_set_name.bold(),
            report.change_set_type,
            report.stack_name
        );

        if report.is_empty() {
            output.push_str("   No changes.\n");
            return output;
        }

        Self::push_value_table(&mut output, "Parameters", &report.parameters);
        Self::push_value_table(&mut output, "Tags", &report.tags);

        if !report.resources.is_empty() {
            let rows: Vec<ResourceChangeRow> = report
                .resources
                .iter()
                .map(|r| ResourceChangeRow {
                    action: Self::format_action(r),
                    logical_id: r.logical_resource_id.clone(),
                    resource_type: Self::truncate(&r.resource_type, 40),
                    replacement: r.replacement.clone().unwrap_or_default(),
                })
                .collect();

            output.push_str("Resources:\n");
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = write!(output, "\n{}\n", Self::summary(report));
        output
    }

    fn push_value_table(output: &mut String, title: &str, changes: &[ValueChange]) {
        if changes.is_empty() {
            return;
        }

        let rows: Vec<ValueChangeRow> = changes
            .iter()
            .map(|c| ValueChangeRow {
                marker: c.marker().to_string(),
                key: c.key.clone(),
                before: Self::truncate(c.before.as_deref().unwrap_or("-"), 40),
                after: Self::truncate(c.after.as_deref().unwrap_or("-"), 40),
            })
            .collect();

        let _ = writeln!(output, "{title}:");
        output.push_str(&Table::new(rows).to_string());
        output.push_str("\n\n");
    }

    fn summary(report: &PlanReport) -> String {
        let replacements = report.resources.iter().filter(|r| r.replaces()).count();
        let mut summary = format!(
            "Plan: {} to add, {} to modify, {} to remove",
            report.count("Add").to_string().green(),
            report.count("Modify").to_string().yellow(),
            report.count("Remove").to_string().red()
        );

        if replacements > 0 {
            let _ = write!(
                summary,
                " ({} {} replacement)",
                "⚠".yellow(),
                replacements
            );
        }

        summary
    }

    /// Formats the result of a monitored operation.
    #[must_use]
    pub fn format_monitor(
        &self,
        stack_name: &str,
        operation: OperationKind,
        outcome: &MonitorOutcome,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "stack": stack_name,
                    "operation": operation,
                    "status": outcome.status(),
                    "skipped": *outcome == MonitorOutcome::Skipped,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => match outcome {
                MonitorOutcome::Completed(status) => {
                    format!("{} Stack {stack_name}: {}\n", "✓".green(), status.green())
                }
                MonitorOutcome::Skipped => {
                    format!("{} Stack {stack_name}: nothing to {operation}\n", "✓".green())
                }
            },
        }
    }

    /// Formats a configuration validation summary.
    #[must_use]
    pub fn format_validation(&self, config: &DeployConfig, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&ValidationJson::new(config, result)).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();

                if result.is_valid() {
                    let _ = writeln!(output, "{} Configuration is valid!", "✓".green());
                } else {
                    for error in &result.errors {
                        let _ = writeln!(output, "{} {error}", "✗".red());
                    }
                }

                for warning in &result.warnings {
                    let _ = writeln!(output, "{} {warning}", "⚠".yellow());
                }

                let _ = write!(
                    output,
                    "\nConfiguration summary:\n  Service: {}\n  Stage: {}\n  Stack: {}\n  Region: {}\n  Artifacts: {}\n",
                    config.service,
                    config.stage,
                    config.stack_name(),
                    config.region.as_deref().unwrap_or("(default)"),
                    config.naming().artifact_directory()
                );

                output
            }
        }
    }

    /// Formats a resource action with color.
    fn format_action(change: &ResourceChangeSummary) -> String {
        match change.action.as_str() {
            "Add" => "+add".green().to_string(),
            "Modify" if change.replaces() => "±replace".red().to_string(),
            "Modify" => "~modify".yellow().to_string(),
            "Remove" => "-remove".red().to_string(),
            other => other.to_lowercase().dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

// JSON serialization helpers

#[derive(Serialize)]
struct ValidationJson {
    valid: bool,
    service: String,
    stage: String,
    stack_name: String,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationJson {
    fn new(config: &DeployConfig, result: &ValidationResult) -> Self {
        Self {
            valid: result.is_valid(),
            service: config.service.clone(),
            stage: config.stage.clone(),
            stack_name: config.stack_name(),
            errors: result.errors.iter().map(ToString::to_string).collect(),
            warnings: result.warnings.clone(),
        }
    }
}
