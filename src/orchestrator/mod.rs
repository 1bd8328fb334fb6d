//! Provisioning workflows.
//!
//! The orchestrator sequences stack operations, threads outputs of finished
//! stacks into the parameters of dependent ones, and keeps the local mirror
//! in step after every stage. Every stack operation is awaited to a terminal
//! status before the next one starts.

mod create;
mod delete;
mod domain;
pub mod naming;
mod report;
mod templates;
mod update;

#[cfg(test)]
mod fixtures;

use tracing::info;

use crate::cloudformation::{
    Capability, CloudFormationApi, Parameter, ParameterBinder, ParameterValue, StackClient,
    StackOperation, StackRequest, StackResult,
};
use crate::config::TemplateHasher;
use crate::error::{MirrorError, Result};
use crate::mirror::{AppTopology, MirrorStore, StackRecord};
use crate::uploader::ArtifactStore;

pub use domain::build_domain_template;
pub use report::{Outcome, Stage, StackState, StatusReport, Step, Workflow, WorkflowReport};
pub use templates::{
    APP_TEMPLATE, BACKEND_NESTED_TEMPLATE, BACKEND_ROOT_TEMPLATE, BRANCH_TEMPLATE, Template,
    TemplateSet,
};
pub use update::{UpdateRequest, UpdateTarget, parse_override};

/// App stack parameter holding the repository token.
pub const GITHUB_TOKEN_PARAMETER: &str = "GithubToken";

/// Backend parameter holding the public URL when a domain is configured.
pub const APP_URL_PARAMETER: &str = "AppUrl";

/// Parameters that are never persisted with their value.
const SECRET_PARAMETERS: &[&str] = &[GITHUB_TOKEN_PARAMETER];

/// Sequences stack, artifact and mirror operations into workflows.
pub struct Orchestrator<A: ?Sized, S, M> {
    stacks: StackClient<A>,
    artifacts: S,
    mirror: M,
    templates: TemplateSet,
    binder: ParameterBinder,
}

/// What an update applied to a recorded stack.
struct AppliedUpdate {
    result: StackResult,
    parameters: Vec<Parameter>,
    template_hash: String,
}

impl AppliedUpdate {
    const fn outcome(&self) -> Outcome {
        if self.result.changed {
            Outcome::Updated
        } else {
            Outcome::Unchanged
        }
    }

    fn apply_to(self, record: &mut StackRecord) -> Outcome {
        let outcome = self.outcome();
        record.apply_update(&self.result, self.parameters, self.template_hash);
        outcome
    }
}

/// Replaces secret values with carry-forward markers.
fn redact_secrets(parameters: Vec<Parameter>) -> Vec<Parameter> {
    parameters
        .into_iter()
        .map(|mut p| {
            if SECRET_PARAMETERS.contains(&p.key.as_str()) {
                p.value = ParameterValue::CarryForward;
            }
            p
        })
        .collect()
}

impl<A, S, M> Orchestrator<A, S, M>
where
    A: CloudFormationApi + ?Sized,
    S: ArtifactStore,
    M: MirrorStore,
{
    /// Creates an orchestrator.
    #[must_use]
    pub const fn new(stacks: StackClient<A>, artifacts: S, mirror: M, templates: TemplateSet) -> Self {
        Self {
            stacks,
            artifacts,
            mirror,
            templates,
            binder: ParameterBinder::new(),
        }
    }

    /// Returns the mirror store.
    #[must_use]
    pub const fn mirror(&self) -> &M {
        &self.mirror
    }

    /// Loads the recorded topology or reports the alias as unknown.
    async fn load_topology(&self, alias: &str) -> Result<AppTopology> {
        self.mirror.load(alias).await?.ok_or_else(|| {
            MirrorError::inconsistent(alias, "no local state found; run create first").into()
        })
    }

    /// Stamps and saves the topology.
    async fn persist(&self, topology: &mut AppTopology) -> Result<()> {
        topology.touch();
        self.mirror.save(topology).await
    }

    /// Updates a recorded stack, carrying forward every parameter except the
    /// overrides.
    async fn update_recorded(
        &self,
        record: &StackRecord,
        template: Template,
        capabilities: &[Capability],
        overrides: &[(String, String)],
    ) -> Result<AppliedUpdate> {
        let spec = self
            .binder
            .carry_forward_except(&record.parameters, overrides);
        let parameters = self
            .binder
            .build_parameters(&spec, StackOperation::Update)?;

        if template.hash != record.template_hash {
            info!(
                stack = %record.name,
                from = TemplateHasher::short_hash(&record.template_hash),
                to = TemplateHasher::short_hash(&template.hash),
                "Template changed"
            );
        }

        let request = StackRequest::new(&record.name, template.body)
            .with_capabilities(capabilities)
            .with_parameters(parameters.clone());
        let result = self.stacks.update_stack(&request).await?;

        Ok(AppliedUpdate {
            result,
            parameters: redact_secrets(self.binder.merge_persisted(&record.parameters, &parameters)),
            template_hash: template.hash,
        })
    }

    /// Reads the recorded topology and the live status of each stack.
    ///
    /// # Errors
    ///
    /// Returns `Inconsistent` if nothing is recorded for the alias.
    pub async fn status(&self, alias: &str) -> Result<StatusReport> {
        let topology = self.load_topology(alias).await?;
        let mut stacks = Vec::new();

        if let Some(app) = &topology.app_stack {
            stacks.push(self.stack_state(Stage::App, None, &app.name, Some(app)).await?);
        }
        for env in &topology.environments {
            let name = Some(env.environment_name.as_str());
            if let Some(branch) = &env.branch_stack {
                stacks.push(self.stack_state(Stage::Branch, name, &branch.name, Some(branch)).await?);
            }
            if let Some(backend) = &env.backend_stack {
                stacks.push(self.stack_state(Stage::Backend, name, &backend.name, Some(backend)).await?);
            }
            if let Some(auth) = &env.auth {
                stacks.push(self.stack_state(Stage::NestedResources, name, &auth.stack_name, None).await?);
            }
        }
        if let Some(domain) = &topology.domain {
            stacks.push(
                self.stack_state(Stage::Domain, None, &domain.stack.name, Some(&domain.stack))
                    .await?,
            );
        }

        Ok(StatusReport { topology, stacks })
    }

    async fn stack_state(
        &self,
        stage: Stage,
        environment: Option<&str>,
        name: &str,
        record: Option<&StackRecord>,
    ) -> Result<StackState> {
        Ok(StackState {
            stage,
            environment: environment.map(str::to_string),
            name: name.to_string(),
            status: self.stacks.status(name).await?,
            template: record.map(|r| TemplateHasher::short_hash(&r.template_hash).to_string()),
        })
    }
}
