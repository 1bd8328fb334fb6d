//! Targeted updates of recorded stacks.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument};

use super::{
    APP_TEMPLATE, AppliedUpdate, BACKEND_NESTED_TEMPLATE, BACKEND_ROOT_TEMPLATE, BRANCH_TEMPLATE,
    Orchestrator, Outcome, Stage, Template, Workflow, WorkflowReport, build_domain_template,
};
use crate::cloudformation::{Capability, CloudFormationApi};
use crate::error::{ConfigError, MirrorError, Result};
use crate::mirror::{
    AppTopology, ClientConfig, EnvironmentRecord, MirrorStore, ProviderMetadata, StackRecord,
};
use crate::uploader::ArtifactStore;

/// Stack targeted by an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateTarget {
    /// Hosting app stack.
    App,
    /// Branch stack of one environment.
    Branch,
    /// Backend stack of one environment, including nested resources.
    Backend,
    /// Domain stack.
    Domain,
    /// Lambda builds of one environment.
    Lambdas,
}

impl UpdateTarget {
    /// Returns true if the target belongs to a single environment.
    #[must_use]
    pub const fn per_environment(self) -> bool {
        matches!(self, Self::Branch | Self::Backend | Self::Lambdas)
    }
}

impl fmt::Display for UpdateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::App => "app",
            Self::Branch => "branch",
            Self::Backend => "backend",
            Self::Domain => "domain",
            Self::Lambdas => "lambdas",
        };
        f.write_str(label)
    }
}

impl FromStr for UpdateTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "app" => Ok(Self::App),
            "branch" => Ok(Self::Branch),
            "backend" => Ok(Self::Backend),
            "domain" => Ok(Self::Domain),
            "lambdas" | "lambda" => Ok(Self::Lambdas),
            other => Err(ConfigError::validation(
                format!("unknown update target '{other}'"),
                "target",
            )),
        }
    }
}

/// A targeted update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Stack to update.
    pub target: UpdateTarget,
    /// Environment for per-environment targets; the default environment
    /// when unset.
    pub environment: Option<String>,
    /// Parameters to set explicitly. Every other known parameter keeps its
    /// previous value.
    pub overrides: Vec<(String, String)>,
}

impl UpdateRequest {
    /// Creates a request with no overrides.
    #[must_use]
    pub const fn new(target: UpdateTarget) -> Self {
        Self {
            target,
            environment: None,
            overrides: Vec::new(),
        }
    }

    /// Selects the environment.
    #[must_use]
    pub fn for_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Adds a parameter override.
    #[must_use]
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Adds several parameter overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = (String, String)>) -> Self {
        self.overrides.extend(overrides);
        self
    }
}

/// Parses a `KEY=VALUE` override.
///
/// # Errors
///
/// Returns a validation error if there is no `=` or the key is empty.
pub fn parse_override(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::validation(
            format!("expected KEY=VALUE, got '{raw}'"),
            "set",
        )
        .into()),
    }
}

impl<A, S, M> Orchestrator<A, S, M>
where
    A: CloudFormationApi + ?Sized,
    S: ArtifactStore,
    M: MirrorStore,
{
    /// Updates one recorded stack.
    ///
    /// The persisted parameter list of the target is reloaded from the
    /// mirror; only the overrides (and, for lambdas, the fresh build keys)
    /// are sent as values, everything else carries forward.
    ///
    /// # Errors
    ///
    /// Returns `Inconsistent` if the target has no mirror record, otherwise
    /// the first stack, upload or mirror error.
    #[instrument(skip(self, request), fields(target = %request.target))]
    pub async fn update(&self, alias: &str, request: &UpdateRequest) -> Result<WorkflowReport> {
        let mut topology = self.load_topology(alias).await?;
        let mut report = WorkflowReport::new(Workflow::Update, alias);

        match request.target {
            UpdateTarget::App => self.update_app(&mut topology, request, &mut report).await?,
            UpdateTarget::Branch => {
                self.update_branch(&mut topology, request, &mut report)
                    .await?;
            }
            UpdateTarget::Backend => {
                self.update_backend(&mut topology, request, &mut report)
                    .await?;
            }
            UpdateTarget::Domain => {
                self.update_domain(&mut topology, request, &mut report)
                    .await?;
            }
            UpdateTarget::Lambdas => {
                self.redeploy_lambdas(&mut topology, request, &mut report)
                    .await?;
            }
        }

        Ok(report.finish())
    }

    async fn update_app(
        &self,
        topology: &mut AppTopology,
        request: &UpdateRequest,
        report: &mut WorkflowReport,
    ) -> Result<()> {
        let mut record = topology
            .app_stack
            .clone()
            .ok_or_else(|| MirrorError::inconsistent(&topology.alias, "app stack not recorded"))?;
        let template = self.templates.load(APP_TEMPLATE).await?;
        let applied = self
            .update_recorded(&record, template, &[Capability::NamedIam], &request.overrides)
            .await?;

        let outcome = applied.apply_to(&mut record);
        report.record(Stage::App, &record.name, outcome);
        topology.app_stack = Some(record);
        self.persist(topology).await
    }

    async fn update_branch(
        &self,
        topology: &mut AppTopology,
        request: &UpdateRequest,
        report: &mut WorkflowReport,
    ) -> Result<()> {
        let index = environment_index(topology, request)?;
        let mut record = recorded(topology, index, |e| e.branch_stack.as_ref(), "branch")?;
        let template = self.templates.load(BRANCH_TEMPLATE).await?;
        let applied = self
            .update_recorded(&record, template, &[], &request.overrides)
            .await?;

        let outcome = applied.apply_to(&mut record);
        let env = &mut topology.environments[index];
        report.record_env(Stage::Branch, &env.environment_name, &record.name, outcome);
        env.branch_stack = Some(record);
        self.persist(topology).await
    }

    async fn update_backend(
        &self,
        topology: &mut AppTopology,
        request: &UpdateRequest,
        report: &mut WorkflowReport,
    ) -> Result<()> {
        let index = environment_index(topology, request)?;
        let record = recorded(topology, index, |e| e.backend_stack.as_ref(), "backend")?;
        let env = &topology.environments[index];
        let nested = env.auth.is_some() || !env.lambda_keys.is_empty();

        let template = if nested {
            let bucket = deployment_bucket(topology, index)?;
            let uploaded = self.upload_templates(&bucket).await?;
            report.record_env(
                Stage::Artifacts,
                &topology.environments[index].environment_name,
                &bucket,
                Outcome::Uploaded(uploaded),
            );
            self.templates.load(BACKEND_NESTED_TEMPLATE).await?
        } else {
            self.templates.load(BACKEND_ROOT_TEMPLATE).await?
        };
        let applied = self
            .update_recorded(&record, template, &[Capability::NamedIam], &request.overrides)
            .await?;

        self.apply_backend(topology, index, record, applied, Stage::Backend, report)
            .await
    }

    async fn redeploy_lambdas(
        &self,
        topology: &mut AppTopology,
        request: &UpdateRequest,
        report: &mut WorkflowReport,
    ) -> Result<()> {
        if topology.spec.lambdas.is_empty() {
            return Err(ConfigError::validation("no lambdas are declared for this app", "lambdas").into());
        }
        let index = environment_index(topology, request)?;
        let record = recorded(topology, index, |e| e.backend_stack.as_ref(), "backend")?;
        let env = &topology.environments[index];
        let env_name = env.environment_name.clone();
        let bucket = deployment_bucket(topology, index)?;

        let mut removed = 0;
        for key in env.lambda_keys.values() {
            self.artifacts.delete_object(&bucket, key).await?;
            removed += 1;
        }
        report.record_env(Stage::Artifacts, &env_name, &bucket, Outcome::Removed(removed));

        let uploaded = self.upload_templates(&bucket).await?;
        let uploads = self
            .upload_lambdas(&topology.spec.app_name, &bucket, &topology.spec.lambdas)
            .await?;
        report.record_env(
            Stage::Artifacts,
            &env_name,
            &bucket,
            Outcome::Uploaded(uploaded + uploads.keys.len()),
        );
        topology.environments[index]
            .lambda_keys
            .clone_from(&uploads.keys);
        info!("Uploaded {} lambda build(s) to {bucket}", uploads.keys.len());

        let mut overrides = uploads.overrides;
        overrides.extend(request.overrides.iter().cloned());
        let template = self.templates.load(BACKEND_NESTED_TEMPLATE).await?;
        let applied = self
            .update_recorded(&record, template, &[Capability::NamedIam], &overrides)
            .await?;

        self.apply_backend(topology, index, record, applied, Stage::NestedResources, report)
            .await
    }

    /// Folds a backend update into the environment record and refreshes the
    /// provider metadata, auth outputs and client config derived from it.
    async fn apply_backend(
        &self,
        topology: &mut AppTopology,
        index: usize,
        mut record: StackRecord,
        applied: AppliedUpdate,
        stage: Stage,
        report: &mut WorkflowReport,
    ) -> Result<()> {
        let provider = ProviderMetadata::from_outputs(&self.binder, &applied.result.outputs)?;
        let auth = if topology.environments[index].auth.is_some() {
            Some(self.read_auth(&applied.result.outputs).await?)
        } else {
            None
        };
        let client_config = ClientConfig::build(&self.binder, &provider, auth.as_ref())?;

        let outcome = applied.apply_to(&mut record);
        let env = &mut topology.environments[index];
        report.record_env(stage, &env.environment_name, &record.name, outcome);
        env.backend_stack = Some(record);
        env.provider = Some(provider);
        env.auth = auth;
        env.client_config = Some(client_config);
        self.persist(topology).await
    }

    async fn update_domain(
        &self,
        topology: &mut AppTopology,
        request: &UpdateRequest,
        report: &mut WorkflowReport,
    ) -> Result<()> {
        let mut domain = topology
            .domain
            .clone()
            .ok_or_else(|| MirrorError::inconsistent(&topology.alias, "domain stack not recorded"))?;

        let document = if let Some(stored) = self.mirror.read_domain_template(&topology.alias).await? {
            stored
        } else {
            domain.subdomains = topology.subdomains();
            let rebuilt = build_domain_template(&domain.subdomains);
            self.mirror
                .write_domain_template(&topology.alias, &rebuilt)
                .await?;
            rebuilt
        };
        let template = Template::inline(
            serde_json::to_string_pretty(&document)
                .map_err(|e| MirrorError::serialization(e.to_string()))?,
        );

        let applied = self
            .update_recorded(&domain.stack, template, &[], &request.overrides)
            .await?;
        let outcome = applied.apply_to(&mut domain.stack);
        report.record(Stage::Domain, &domain.stack.name, outcome);
        topology.domain = Some(domain);
        self.persist(topology).await
    }
}

/// Resolves the environment of a per-environment request.
fn environment_index(topology: &AppTopology, request: &UpdateRequest) -> Result<usize> {
    let name = request
        .environment
        .as_deref()
        .or(topology.spec.default_environment.as_deref())
        .ok_or_else(|| {
            ConfigError::validation("no environment given and no default environment", "environment")
        })?;

    topology
        .environments
        .iter()
        .position(|e| e.environment_name == name)
        .ok_or_else(|| {
            MirrorError::inconsistent(
                &topology.alias,
                format!("environment '{name}' has no local record"),
            )
            .into()
        })
}

/// Deployment bucket recorded for an environment.
fn deployment_bucket(topology: &AppTopology, index: usize) -> Result<String> {
    let env = &topology.environments[index];
    env.provider
        .as_ref()
        .map(|p| p.deployment_bucket_name.clone())
        .ok_or_else(|| {
            MirrorError::inconsistent(
                &topology.alias,
                format!("provider metadata of '{}' not recorded", env.environment_name),
            )
            .into()
        })
}

/// Clones a stack record of an environment or reports it missing.
fn recorded(
    topology: &AppTopology,
    index: usize,
    select: impl Fn(&EnvironmentRecord) -> Option<&StackRecord>,
    what: &str,
) -> Result<StackRecord> {
    let env = &topology.environments[index];
    select(env).cloned().ok_or_else(|| {
        MirrorError::inconsistent(
            &topology.alias,
            format!("{what} stack of '{}' not recorded", env.environment_name),
        )
        .into()
    })
}
