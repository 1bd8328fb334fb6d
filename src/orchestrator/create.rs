//! The create workflow.

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

use super::naming::{
    app_stack_name, app_url, auth_role_name, backend_stack_name, branch_stack_name,
    deployment_bucket_name, domain_stack_name, unauth_role_name,
};
use super::{
    APP_TEMPLATE, APP_URL_PARAMETER, BACKEND_NESTED_TEMPLATE, BACKEND_ROOT_TEMPLATE,
    BRANCH_TEMPLATE, GITHUB_TOKEN_PARAMETER, Orchestrator, Outcome, Stage, Template,
    WorkflowReport, Workflow, build_domain_template, redact_secrets,
};
use crate::cloudformation::{
    Capability, CloudFormationApi, ParameterSpec, StackOperation, StackOutputs, StackRequest, Tag,
};
use crate::config::{AppSpec, Capabilities, ConfigParser, ConfigValidator, EnvironmentSpec, LambdaSpec};
use crate::error::{MirrorError, Result};
use crate::mirror::{
    AppTopology, AuthRecord, ClientConfig, DomainRecord, EnvironmentRecord, MirrorStore,
    ProviderMetadata, ProvisioningStage, StackRecord,
};
use crate::uploader::{Artifact, ArtifactStore};

/// Lambda uploads: name to object key, and parameter key to object key.
pub(super) struct LambdaUploads {
    pub keys: BTreeMap<String, String>,
    pub overrides: Vec<(String, String)>,
}

impl<A, S, M> Orchestrator<A, S, M>
where
    A: CloudFormationApi + ?Sized,
    S: ArtifactStore,
    M: MirrorStore,
{
    /// Creates every resource of an application.
    ///
    /// The spec is validated before anything is touched. Creation is not
    /// resumable: if local state already exists for the alias the workflow
    /// stops before any remote call. Each completed stage is saved to the
    /// mirror, so a failure leaves an accurate partial record.
    ///
    /// # Errors
    ///
    /// Returns the first validation, stack, upload or mirror error. Stacks
    /// created before the failure are left in place.
    #[instrument(skip(self, spec), fields(app = %spec.app_name, alias = %spec.alias))]
    pub async fn create(&self, spec: &AppSpec) -> Result<WorkflowReport> {
        let validation = ConfigValidator::new()
            .with_artifact_check(true)
            .validate(spec)?;
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        if self.mirror.exists(&spec.alias).await? {
            return Err(MirrorError::inconsistent(
                &spec.alias,
                "local state already exists; update or delete the app instead of creating it again",
            )
            .into());
        }
        let token = ConfigParser::require_github_token(spec)?;

        let capabilities = spec.capabilities();
        info!(
            auth = capabilities.auth,
            lambdas = capabilities.lambdas,
            domain = capabilities.domain,
            environments = spec.environments.len(),
            "Creating application"
        );

        let mut report = WorkflowReport::new(Workflow::Create, &spec.alias);
        let mut topology = AppTopology::new(spec);

        self.create_app(&mut topology, &token, &mut report).await?;
        for env in &spec.environments {
            self.create_environment(&mut topology, env, capabilities, &mut report)
                .await?;
        }
        if let Some(domain) = &spec.domain {
            self.create_domain(&mut topology, domain, &mut report).await?;
        }

        info!("All resources created in the cloud");
        Ok(report.finish())
    }

    async fn create_app(
        &self,
        topology: &mut AppTopology,
        token: &str,
        report: &mut WorkflowReport,
    ) -> Result<()> {
        let name = app_stack_name(&topology.spec.app_name);
        let template = self.templates.load(APP_TEMPLATE).await?;
        let parameters = self.binder.build_parameters(
            &ParameterSpec::new()
                .value(GITHUB_TOKEN_PARAMETER, token)
                .value("AppName", &topology.spec.app_name)
                .value("Repository", &topology.spec.repository_url),
            StackOperation::Create,
        )?;

        let request = StackRequest::new(&name, template.body)
            .with_capabilities(&[Capability::NamedIam])
            .with_parameters(parameters.clone());
        let result = self.stacks.create_stack(&request).await?;
        let app_id = self.binder.extract_output("AppId", &result.outputs)?;
        info!(app_id = %app_id, "Amplify app created");

        topology.app_id = Some(app_id);
        topology.app_stack = Some(StackRecord::new(
            &name,
            &result,
            redact_secrets(parameters),
            template.hash,
        ));
        self.persist(topology).await?;
        report.record(Stage::App, name, Outcome::Created);
        Ok(())
    }

    #[instrument(skip_all, fields(environment = %env.environment_name))]
    async fn create_environment(
        &self,
        topology: &mut AppTopology,
        env: &EnvironmentSpec,
        capabilities: Capabilities,
        report: &mut WorkflowReport,
    ) -> Result<()> {
        let app_name = topology.spec.app_name.clone();
        let env_name = env.environment_name.as_str();
        let app_id = topology
            .app_id
            .clone()
            .ok_or_else(|| MirrorError::inconsistent(&topology.alias, "app id not recorded"))?;

        topology.environments.push(EnvironmentRecord::pending(env));
        let index = topology.environments.len() - 1;

        // Branch
        let name = branch_stack_name(&app_name, &env.branch);
        let template = self.templates.load(BRANCH_TEMPLATE).await?;
        let parameters = self.binder.build_parameters(
            &ParameterSpec::new()
                .value("AppId", &app_id)
                .value("BranchName", &env.branch)
                .value("Environment", env_name),
            StackOperation::Create,
        )?;
        let request = StackRequest::new(&name, template.body).with_parameters(parameters.clone());
        let result = self.stacks.create_stack(&request).await?;

        let record = &mut topology.environments[index];
        record.branch_stack = Some(StackRecord::new(&name, &result, parameters, template.hash));
        record.stage = ProvisioningStage::BranchCreated;
        self.persist(topology).await?;
        report.record_env(Stage::Branch, env_name, name, Outcome::Created);

        // Backend
        let name = backend_stack_name(&app_name, env_name);
        let template = self.templates.load(BACKEND_ROOT_TEMPLATE).await?;
        let mut spec = ParameterSpec::new()
            .value("DeploymentBucketName", deployment_bucket_name(&app_name, env_name))
            .value("AuthRoleName", auth_role_name(&app_name, env_name))
            .value("UnauthRoleName", unauth_role_name(&app_name, env_name))
            .value("AppName", &app_name)
            .value("Environment", env_name);
        if let Some(domain) = &topology.spec.domain {
            spec = spec.value(APP_URL_PARAMETER, app_url(env_name, domain));
        }
        let parameters = self
            .binder
            .build_parameters(&spec, StackOperation::Create)?;
        let request = StackRequest::new(&name, template.body)
            .with_capabilities(&[Capability::NamedIam])
            .with_parameters(parameters.clone())
            .with_tags(vec![
                Tag::new("user:Application", &app_name),
                Tag::new("user:Stack", env_name),
            ]);
        let result = self.stacks.create_stack(&request).await?;
        let provider = ProviderMetadata::from_outputs(&self.binder, &result.outputs)?;

        let record = &mut topology.environments[index];
        record.backend_stack = Some(StackRecord::new(&name, &result, parameters, template.hash));
        record.provider = Some(provider.clone());
        record.stage = ProvisioningStage::BackendCreated;
        self.persist(topology).await?;
        report.record_env(Stage::Backend, env_name, &name, Outcome::Created);

        // Nested resources
        let mut auth = None;
        if capabilities.nested_resources() {
            let bucket = provider.deployment_bucket_name.as_str();
            let lambdas = topology.spec.lambdas.clone();

            let uploaded = self.upload_templates(bucket).await?;
            let lambda_uploads = self.upload_lambdas(&app_name, bucket, &lambdas).await?;
            report.record_env(
                Stage::Artifacts,
                env_name,
                bucket,
                Outcome::Uploaded(uploaded + lambda_uploads.keys.len()),
            );

            let template = self.templates.load(BACKEND_NESTED_TEMPLATE).await?;
            let backend = topology.environments[index]
                .backend_stack
                .clone()
                .ok_or_else(|| MirrorError::inconsistent(&topology.alias, "backend not recorded"))?;
            let applied = self
                .update_recorded(
                    &backend,
                    template,
                    &[Capability::NamedIam],
                    &lambda_uploads.overrides,
                )
                .await?;
            if capabilities.auth {
                auth = Some(self.read_auth(&applied.result.outputs).await?);
            }

            let record = &mut topology.environments[index];
            if let Some(stack) = record.backend_stack.as_mut() {
                applied.apply_to(stack);
            }
            record.lambda_keys = lambda_uploads.keys;
            report.record_env(Stage::NestedResources, env_name, &name, Outcome::Updated);
        }

        let client_config = ClientConfig::build(&self.binder, &provider, auth.as_ref())?;
        let record = &mut topology.environments[index];
        record.auth = auth;
        record.client_config = Some(client_config);
        record.stage = ProvisioningStage::Complete;
        self.persist(topology).await?;
        report.record_env(
            Stage::LocalState,
            env_name,
            format!("{env_name}/aws-config.json"),
            Outcome::Written,
        );
        info!("Environment {env_name} created");
        Ok(())
    }

    async fn create_domain(
        &self,
        topology: &mut AppTopology,
        domain: &str,
        report: &mut WorkflowReport,
    ) -> Result<()> {
        let app_id = topology
            .app_id
            .clone()
            .ok_or_else(|| MirrorError::inconsistent(&topology.alias, "app id not recorded"))?;
        let subdomains = topology.subdomains();

        let document = build_domain_template(&subdomains);
        self.mirror
            .write_domain_template(&topology.alias, &document)
            .await?;
        let template = Template::inline(
            serde_json::to_string_pretty(&document)
                .map_err(|e| MirrorError::serialization(e.to_string()))?,
        );

        let name = domain_stack_name(&topology.spec.app_name, domain);
        let parameters = self.binder.build_parameters(
            &ParameterSpec::new()
                .value("AppId", app_id)
                .value("DomainName", domain),
            StackOperation::Create,
        )?;
        let request = StackRequest::new(&name, template.body).with_parameters(parameters.clone());
        let result = self.stacks.create_stack(&request).await?;

        topology.domain = Some(DomainRecord {
            domain_name: domain.to_string(),
            stack: StackRecord::new(&name, &result, parameters, template.hash),
            subdomains,
        });
        self.persist(topology).await?;
        report.record(Stage::Domain, name, Outcome::Created);
        info!("Domain {domain} created");
        Ok(())
    }

    /// Uploads the nested-stack templates; returns how many were uploaded.
    pub(super) async fn upload_templates(&self, bucket: &str) -> Result<usize> {
        let artifacts = Artifact::backend_templates(self.templates.dir());
        for artifact in &artifacts {
            self.artifacts.upload(bucket, artifact).await?;
        }
        info!("All templates uploaded to {bucket}");
        Ok(artifacts.len())
    }

    /// Uploads lambda builds under fresh timestamped keys.
    pub(super) async fn upload_lambdas(
        &self,
        app_name: &str,
        bucket: &str,
        lambdas: &[LambdaSpec],
    ) -> Result<LambdaUploads> {
        let now = Utc::now();
        let mut uploads = LambdaUploads {
            keys: BTreeMap::new(),
            overrides: Vec::new(),
        };

        for lambda in lambdas {
            let key = self
                .artifacts
                .upload(bucket, &Artifact::lambda(app_name, lambda, now))
                .await?;
            uploads
                .overrides
                .push((lambda.resolved_parameter_key(), key.clone()));
            uploads.keys.insert(lambda.name.clone(), key);
        }
        Ok(uploads)
    }

    /// Reads the nested auth stack named by the backend outputs.
    pub(super) async fn read_auth(&self, backend_outputs: &StackOutputs) -> Result<AuthRecord> {
        let stack_name = self
            .binder
            .extract_output("AuthStackName", backend_outputs)?;
        let mut outputs = self.stacks.describe_outputs(&stack_name).await?;
        outputs.remove("AuthStackName");

        Ok(AuthRecord {
            stack_name,
            template_url: backend_outputs.get("AuthTemplateURL").map(str::to_string),
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{
        APP_STACK, AUTH_STACK, BACKEND_STACK, BRANCH_STACK, BUCKET, DOMAIN_STACK, Harness,
        permissive_store,
    };
    use super::*;
    use crate::cloudformation::{Parameter, ParameterValue};
    use crate::error::{AmplistackError, ConfigError};
    use crate::uploader::MockArtifactStore;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn read_json(path: std::path::PathBuf) -> serde_json::Value {
        let raw = std::fs::read_to_string(&path).expect("read mirror file");
        serde_json::from_str(&raw).expect("valid json")
    }

    #[tokio::test]
    async fn test_create_acme_end_to_end() {
        let harness = Harness::new();
        let report = assert_ok!(
            harness
                .orchestrator(permissive_store())
                .create(&harness.spec())
                .await
        );

        assert_eq!(
            harness.api.labels(),
            vec![
                format!("create:{APP_STACK}"),
                format!("create:{BRANCH_STACK}"),
                format!("create:{BACKEND_STACK}"),
                format!("update:{BACKEND_STACK}"),
                format!("create:{DOMAIN_STACK}"),
            ]
        );
        assert_eq!(
            report.resources_with(Outcome::Created),
            vec![APP_STACK, BRANCH_STACK, BACKEND_STACK, DOMAIN_STACK]
        );

        let config = read_json(harness.alias_dir().join("dev/aws-config.json"));
        assert_eq!(config["aws_project_region"], "us-east-2");
        assert_eq!(config["aws_user_pools_id"], "us-east-2_AbCdEf");
        assert_eq!(config["oauth"]["redirectSignIn"], "https://dev.acme.io/");

        let topology = assert_ok!(harness.mirror().load("acme").await).expect("recorded");
        let env = topology.environment("dev").expect("dev record");
        assert_eq!(topology.app_id.as_deref(), Some("d1a2b3c4"));
        assert_eq!(env.stage, ProvisioningStage::Complete);
        assert_eq!(
            env.provider.as_ref().map(|p| p.deployment_bucket_name.as_str()),
            Some(BUCKET)
        );
        assert_eq!(env.auth.as_ref().map(|a| a.stack_name.as_str()), Some(AUTH_STACK));
        assert!(env.lambda_keys.contains_key("custom-message"));
        assert_eq!(
            topology.domain.as_ref().map(|d| d.subdomains.len()),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_backend_parameters_and_tags() {
        let harness = Harness::new();
        harness.create().await;

        let request = harness.api.first_create(BACKEND_STACK).expect("backend created");
        assert!(request.parameters.contains(&Parameter::concrete("AppUrl", "https://dev.acme.io")));
        assert!(request.parameters.contains(&Parameter::concrete("DeploymentBucketName", BUCKET)));
        assert!(request.parameters.contains(&Parameter::concrete("AuthRoleName", "acme-role-auth-dev")));
        assert!(request
            .parameters
            .contains(&Parameter::concrete("UnauthRoleName", "acme-role-unauth-dev")));
        assert_eq!(request.capabilities, vec![Capability::NamedIam]);
        assert!(request.tags.contains(&Tag::new("user:Stack", "dev")));

        let branch = harness.api.first_create(BRANCH_STACK).expect("branch created");
        assert!(branch.parameters.contains(&Parameter::concrete("AppId", "d1a2b3c4")));
        assert!(branch.capabilities.is_empty());
    }

    #[tokio::test]
    async fn test_github_token_is_sent_but_never_persisted() {
        let harness = Harness::new();
        harness.create().await;

        let request = harness.api.first_create(APP_STACK).expect("app created");
        assert!(request
            .parameters
            .contains(&Parameter::concrete("GithubToken", "ghp_test_token")));

        for file in ["amplify-app-params.json", "app-params.json", "topology.json"] {
            let raw = std::fs::read_to_string(harness.alias_dir().join(file)).expect("read");
            assert!(!raw.contains("ghp_test_token"), "token leaked into {file}");
        }
        let topology = assert_ok!(harness.mirror().load("acme").await).expect("recorded");
        let app = topology.app_stack.expect("app record");
        let token = app
            .parameters
            .iter()
            .find(|p| p.key == "GithubToken")
            .expect("token parameter");
        assert_eq!(token.value, ParameterValue::CarryForward);
    }

    #[tokio::test]
    async fn test_invalid_spec_touches_nothing() {
        let harness = Harness::new();
        let mut spec = harness.spec();
        spec.default_environment = None;

        let err = assert_err!(
            harness
                .orchestrator(MockArtifactStore::new())
                .create(&spec)
                .await
        );

        assert!(matches!(
            err,
            AmplistackError::Config(ConfigError::ValidationError { .. })
        ));
        assert!(harness.api.calls().is_empty());
        assert!(!harness.alias_dir().exists());
    }

    #[tokio::test]
    async fn test_uploads_run_after_backend_create_and_before_nested_update() {
        let harness = Harness::new();
        let api = Arc::clone(&harness.api);

        let mut store = MockArtifactStore::new();
        store
            .expect_upload()
            .withf(|bucket, _| bucket == BUCKET)
            .times(3)
            .returning(move |_, artifact| {
                assert_eq!(
                    api.labels().last().map(String::as_str),
                    Some("create:acme-amplify-backend-dev"),
                    "{} uploaded out of order",
                    artifact.key
                );
                Ok(artifact.key.clone())
            });

        let report = assert_ok!(harness.orchestrator(store).create(&harness.spec()).await);
        assert!(report.steps.iter().any(|s| s.outcome == Outcome::Uploaded(3)));
    }

    #[tokio::test]
    async fn test_domain_created_after_every_nested_update() {
        let harness = Harness::new();
        let mut spec = harness.spec();
        spec.environments.push(crate::config::EnvironmentSpec {
            environment_name: String::from("prod"),
            branch: String::from("main"),
        });
        harness.api.on_create(
            "acme-amplify-backend-prod",
            &[
                ("AuthRoleName", "acme-role-auth-prod"),
                ("AuthRoleArn", "arn:aws:iam::123456789012:role/acme-role-auth-prod"),
                ("UnauthRoleName", "acme-role-unauth-prod"),
                ("UnauthRoleArn", "arn:aws:iam::123456789012:role/acme-role-unauth-prod"),
                ("Region", "us-east-2"),
                ("DeploymentBucketName", "acme-bucket-deployment-prod"),
                ("StackName", "acme-amplify-backend-prod"),
                ("StackId", "arn:aws:cloudformation:us-east-2:123456789012:stack/acme-amplify-backend-prod/1"),
            ],
        );
        harness.api.on_update(
            "acme-amplify-backend-prod",
            &[("AuthStackName", "acme-amplify-backend-prod-authacme-2XYZ")],
        );
        harness.api.nested_on_update(
            "acme-amplify-backend-prod",
            "acme-amplify-backend-prod-authacme-2XYZ",
            &[("UserPoolId", "us-east-2_Prod"), ("AppClientIDWeb", "prodclient")],
        );

        assert_ok!(harness.orchestrator(permissive_store()).create(&spec).await);

        let labels = harness.api.labels();
        let position = |label: &str| {
            labels
                .iter()
                .position(|l| l == label)
                .unwrap_or_else(|| panic!("{label} missing"))
        };
        assert!(position("create:acme-amplify-branch-main") > position("update:acme-amplify-backend-dev"));
        assert!(position("create:acme-amplify-backend-prod") > position("create:acme-amplify-branch-main"));
        assert!(position(&format!("create:{DOMAIN_STACK}")) > position("update:acme-amplify-backend-prod"));
        assert_eq!(labels.last().map(String::as_str), Some("create:acme-amplify-domain-acmeio"));

        let template = assert_ok!(harness.mirror().read_domain_template("acme").await)
            .expect("domain template");
        let settings = &template["Resources"]["AmplifyDomain"]["Properties"]["SubDomainSettings"];
        assert_eq!(settings[1]["BranchName"], "main");
        assert_eq!(settings[1]["Prefix"], "prod");
    }

    #[tokio::test]
    async fn test_create_refuses_existing_mirror() {
        let harness = Harness::new();
        harness.create().await;
        let calls = harness.api.calls().len();

        let err = assert_err!(
            harness
                .orchestrator(MockArtifactStore::new())
                .create(&harness.spec())
                .await
        );
        assert!(matches!(
            err,
            AmplistackError::Mirror(MirrorError::Inconsistent { .. })
        ));
        assert_eq!(harness.api.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_failure_mid_create_leaves_partial_mirror() {
        let harness = Harness::new();
        harness.api.fail(BACKEND_STACK);

        let err = assert_err!(
            harness
                .orchestrator(MockArtifactStore::new())
                .create(&harness.spec())
                .await
        );
        assert!(err.is_stack_operation_error());

        let topology = assert_ok!(harness.mirror().load("acme").await).expect("partial record");
        let env = topology.environment("dev").expect("dev record");
        assert_eq!(topology.app_id.as_deref(), Some("d1a2b3c4"));
        assert_eq!(env.stage, ProvisioningStage::BranchCreated);
        assert!(env.backend_stack.is_none());
        assert!(topology.domain.is_none());
        assert!(!harness
            .api
            .labels()
            .iter()
            .any(|l| l.starts_with("create:acme-amplify-domain")));
    }

    #[tokio::test]
    async fn test_plain_backend_skips_nested_update() {
        let harness = Harness::new();
        let mut spec = harness.spec();
        spec.auth = false;
        spec.lambdas.clear();
        spec.domain = None;

        assert_ok!(
            harness
                .orchestrator(MockArtifactStore::new())
                .create(&spec)
                .await
        );

        assert!(!harness.api.labels().iter().any(|l| l.starts_with("update:")));
        let config = read_json(harness.alias_dir().join("dev/aws-config.json"));
        assert_eq!(config, serde_json::json!({"aws_project_region": "us-east-2"}));

        let request = harness.api.first_create(BACKEND_STACK).expect("backend created");
        assert!(!request.parameters.iter().any(|p| p.key == "AppUrl"));
    }

    #[tokio::test]
    async fn test_status_reports_live_stacks() {
        let harness = Harness::new();
        harness.create().await;

        let status = assert_ok!(
            harness
                .orchestrator(MockArtifactStore::new())
                .status("acme")
                .await
        );
        let names: Vec<&str> = status.stacks.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![APP_STACK, BRANCH_STACK, BACKEND_STACK, AUTH_STACK, DOMAIN_STACK]
        );
        assert_eq!(status.stacks[2].status.as_deref(), Some("UPDATE_COMPLETE"));
        assert_eq!(status.stacks[0].status.as_deref(), Some("CREATE_COMPLETE"));
        assert!(status.stacks[3].template.is_none());
    }
}
