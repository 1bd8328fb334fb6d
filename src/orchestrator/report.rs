//! Workflow reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::mirror::AppTopology;

/// The workflow a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Workflow {
    /// Full creation.
    Create,
    /// Targeted update.
    Update,
    /// Full teardown.
    Delete,
}

/// Stage of a workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Hosting app stack.
    App,
    /// Branch stack.
    Branch,
    /// Backend root stack.
    Backend,
    /// Templates and lambda builds in the deployment bucket.
    Artifacts,
    /// Nested auth and lambda resources.
    NestedResources,
    /// Deployment bucket contents.
    Bucket,
    /// Custom domain stack.
    Domain,
    /// Local mirror files.
    LocalState,
}

/// What happened to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "count")]
pub enum Outcome {
    /// Stack created.
    Created,
    /// Stack updated.
    Updated,
    /// Update had nothing to apply.
    Unchanged,
    /// Stack deleted.
    Deleted,
    /// Nothing to delete.
    Absent,
    /// Objects uploaded.
    Uploaded(usize),
    /// Objects or files removed.
    Removed(usize),
    /// Files written.
    Written,
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Stage.
    pub stage: Stage,
    /// Environment, for per-environment steps.
    pub environment: Option<String>,
    /// Stack, bucket or path acted on.
    pub resource: String,
    /// Result.
    pub outcome: Outcome,
}

/// Ordered record of what a workflow did.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    /// Workflow kind.
    pub workflow: Workflow,
    /// Application alias.
    pub alias: String,
    /// Steps in execution order.
    pub steps: Vec<Step>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Finish time.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Live state of one recorded stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackState {
    /// Stage.
    pub stage: Stage,
    /// Environment, for per-environment stacks.
    pub environment: Option<String>,
    /// Stack name.
    pub name: String,
    /// Provider status, `None` if the stack does not exist.
    pub status: Option<String>,
    /// Short template fingerprint from the mirror.
    pub template: Option<String>,
}

/// Recorded topology plus the live status of each stack.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Mirror record.
    pub topology: AppTopology,
    /// Live stack states in creation order.
    pub stacks: Vec<StackState>,
}

impl WorkflowReport {
    /// Starts a report.
    #[must_use]
    pub fn new(workflow: Workflow, alias: impl Into<String>) -> Self {
        Self {
            workflow,
            alias: alias.into(),
            steps: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Records an app-level step.
    pub fn record(&mut self, stage: Stage, resource: impl Into<String>, outcome: Outcome) {
        self.steps.push(Step {
            stage,
            environment: None,
            resource: resource.into(),
            outcome,
        });
    }

    /// Records a per-environment step.
    pub fn record_env(
        &mut self,
        stage: Stage,
        environment: &str,
        resource: impl Into<String>,
        outcome: Outcome,
    ) {
        self.steps.push(Step {
            stage,
            environment: Some(environment.to_string()),
            resource: resource.into(),
            outcome,
        });
    }

    /// Marks the report finished.
    #[must_use]
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Resources of the steps matching `outcome`, in order.
    #[must_use]
    pub fn resources_with(&self, outcome: Outcome) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.outcome == outcome)
            .map(|s| s.resource.as_str())
            .collect()
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::App => "app",
            Self::Branch => "branch",
            Self::Backend => "backend",
            Self::Artifacts => "artifacts",
            Self::NestedResources => "nested-resources",
            Self::Bucket => "bucket",
            Self::Domain => "domain",
            Self::LocalState => "local-state",
        };
        f.write_str(label)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Deleted => write!(f, "deleted"),
            Self::Absent => write!(f, "absent"),
            Self::Uploaded(n) => write!(f, "uploaded {n}"),
            Self::Removed(n) => write!(f, "removed {n}"),
            Self::Written => write!(f, "written"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_records_in_order() {
        let mut report = WorkflowReport::new(Workflow::Delete, "acme");
        report.record(Stage::Domain, "acme-amplify-domain-acmeio", Outcome::Deleted);
        report.record_env(Stage::Bucket, "dev", "acme-bucket-deployment-dev", Outcome::Removed(4));
        report.record(Stage::App, "acme-amplify-app", Outcome::Absent);
        let report = report.finish();

        assert!(report.finished_at.is_some());
        assert_eq!(report.resources_with(Outcome::Deleted), vec!["acme-amplify-domain-acmeio"]);
        assert_eq!(report.steps[1].environment.as_deref(), Some("dev"));
        assert_eq!(report.steps[1].outcome.to_string(), "removed 4");
    }

    #[test]
    fn test_outcome_json() {
        let json = serde_json::to_value(Outcome::Uploaded(2)).expect("serialize");
        assert_eq!(json, serde_json::json!({"kind": "uploaded", "count": 2}));
        let json = serde_json::to_value(Outcome::Created).expect("serialize");
        assert_eq!(json, serde_json::json!({"kind": "created"}));
    }
}
