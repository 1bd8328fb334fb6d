//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{AppSpec, ValidationResult};
use crate::orchestrator::{Outcome, StatusReport, WorkflowReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Workflow step row for table display.
#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Env")]
    environment: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Result")]
    outcome: String,
}

/// Stack status row for table display.
#[derive(Tabled)]
struct StackRow {
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Env")]
    environment: String,
    #[tabled(rename = "Stack")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Template")]
    template: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a workflow report for display.
    #[must_use]
    pub fn format_report(&self, report: &WorkflowReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &WorkflowReport) -> String {
        let mut output = String::new();
        let _ = write!(output, "\n{} {}\n\n", report.workflow, report.alias.bold());

        if report.steps.is_empty() {
            output.push_str("   Nothing to do.\n");
            return output;
        }

        let rows: Vec<StepRow> = report
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| StepRow {
                index: i + 1,
                stage: step.stage.to_string(),
                environment: step.environment.clone().unwrap_or_default(),
                resource: Self::truncate(&step.resource, 60),
                outcome: Self::format_outcome(step.outcome),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if let Some(finished) = report.finished_at {
            let elapsed = finished - report.started_at;
            let _ = write!(
                output,
                "\n{} Finished in {}s\n",
                "✓".green(),
                elapsed.num_seconds()
            );
        }
        output
    }

    /// Formats the recorded topology and live stack status.
    #[must_use]
    pub fn format_status(&self, status: &StatusReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(status).unwrap_or_default(),
            OutputFormat::Text => Self::format_status_text(status),
        }
    }

    fn format_status_text(status: &StatusReport) -> String {
        let topology = &status.topology;
        let mut output = String::new();

        let _ = write!(
            output,
            "\nApp: {} ({})\n",
            topology.spec.app_name.bold(),
            topology.app_id.as_deref().unwrap_or("not created")
        );
        let _ = writeln!(output, "   Repository: {}", topology.spec.repository_url);
        if let Some(domain) = &topology.spec.domain {
            let _ = writeln!(output, "   Domain: {domain}");
        }
        let _ = writeln!(output, "   Last updated: {}", topology.updated_at.format("%Y-%m-%d %H:%M"));

        for env in &topology.environments {
            let _ = writeln!(
                output,
                "   Environment {} -> {} [{}]",
                env.environment_name,
                env.branch,
                env.stage.label()
            );
        }
        output.push('\n');

        let rows: Vec<StackRow> = status
            .stacks
            .iter()
            .map(|s| StackRow {
                stage: s.stage.to_string(),
                environment: s.environment.clone().unwrap_or_default(),
                name: s.name.clone(),
                status: Self::format_stack_status(s.status.as_deref()),
                template: s.template.clone().unwrap_or_default(),
            })
            .collect();
        if rows.is_empty() {
            output.push_str("   No stacks recorded.\n");
        } else {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }
        output
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, spec: &AppSpec, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.is_valid(),
                "app": spec.app_name,
                "environments": spec.environment_names(),
                "capabilities": spec.capabilities(),
                "warnings": result.warnings,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let capabilities = spec.capabilities();
                let mut output = format!("{} Spec is valid\n\n", "✓".green());
                let _ = writeln!(output, "   App: {}", spec.app_name);
                let _ = writeln!(output, "   Alias: {}", spec.alias);
                let _ = writeln!(output, "   Environments: {}", spec.environment_names().join(", "));
                let _ = writeln!(output, "   Auth: {}", capabilities.auth);
                let _ = writeln!(output, "   Lambdas: {}", spec.lambdas.len());
                let _ = writeln!(output, "   Domain: {}", spec.domain.as_deref().unwrap_or("-"));

                if !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats an error for display.
    #[must_use]
    pub fn format_error(&self, kind: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "status": "error",
                "kind": kind,
                "message": message,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    fn format_outcome(outcome: Outcome) -> String {
        let label = outcome.to_string();
        match outcome {
            Outcome::Created | Outcome::Uploaded(_) | Outcome::Written => label.green().to_string(),
            Outcome::Updated => label.yellow().to_string(),
            Outcome::Deleted | Outcome::Removed(_) => label.red().to_string(),
            Outcome::Unchanged | Outcome::Absent => label.dimmed().to_string(),
        }
    }

    fn format_stack_status(status: Option<&str>) -> String {
        match status {
            None => "absent".dimmed().to_string(),
            Some(s) if s.ends_with("_COMPLETE") && !s.contains("ROLLBACK") && !s.starts_with("DELETE") => {
                s.green().to_string()
            }
            Some(s) if s.ends_with("_IN_PROGRESS") => s.yellow().to_string(),
            Some(s) => s.red().to_string(),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{Stage, Workflow};

    #[test]
    fn test_report_json_lists_steps() {
        let mut report = WorkflowReport::new(Workflow::Create, "acme");
        report.record(Stage::App, "acme-amplify-app", Outcome::Created);
        report.record_env(Stage::Artifacts, "dev", "acme-bucket-deployment-dev", Outcome::Uploaded(3));

        let json = OutputFormatter::new(OutputFormat::Json).format_report(&report.finish());
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["workflow"], "create");
        assert_eq!(value["steps"][1]["stage"], "artifacts");
        assert_eq!(value["steps"][1]["outcome"]["count"], 3);
    }

    #[test]
    fn test_report_text_has_resources() {
        colored::control::set_override(false);
        let mut report = WorkflowReport::new(Workflow::Delete, "acme");
        report.record(Stage::Domain, "acme-amplify-domain-acmeio", Outcome::Absent);

        let text = OutputFormatter::new(OutputFormat::Text).format_report(&report.finish());
        assert!(text.contains("acme-amplify-domain-acmeio"));
        assert!(text.contains("absent"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("abcdefghijkl", 8), "abcde...");
    }
}
