//! Mirror record types.
//!
//! `AppTopology` is the canonical record of one application. Everything else
//! the mirror writes (parameter files, client config, team provider info) is
//! projected from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cloudformation::{Parameter, ParameterBinder, StackOutputs, StackResult};
use crate::config::{AppSpec, EnvironmentSpec};
use crate::error::{Result, StackError};

/// Current version of the topology format.
pub const TOPOLOGY_VERSION: &str = "1.0";

/// How far an environment got through provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningStage {
    /// Nothing created yet.
    Pending,
    /// Branch stack complete.
    BranchCreated,
    /// Backend stack complete.
    BackendCreated,
    /// Nested resources attached and client config written.
    Complete,
}

impl ProvisioningStage {
    /// Returns a display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::BranchCreated => "branch-created",
            Self::BackendCreated => "backend-created",
            Self::Complete => "complete",
        }
    }
}

/// The full recorded state of one application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppTopology {
    /// Record format version.
    pub version: String,
    /// Local alias.
    pub alias: String,
    /// The spec the application was created from (token stripped).
    pub spec: AppSpec,
    /// Hosting app id, immutable once assigned.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Hosting app stack.
    #[serde(default)]
    pub app_stack: Option<StackRecord>,
    /// Environments in declared order.
    #[serde(default)]
    pub environments: Vec<EnvironmentRecord>,
    /// Custom domain stack.
    #[serde(default)]
    pub domain: Option<DomainRecord>,
    /// When the record was first written.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

/// A provisioned environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentRecord {
    /// Environment name.
    pub environment_name: String,
    /// Branch deployed to this environment.
    pub branch: String,
    /// Provisioning progress.
    pub stage: ProvisioningStage,
    /// Branch stack.
    #[serde(default)]
    pub branch_stack: Option<StackRecord>,
    /// Backend root stack.
    #[serde(default)]
    pub backend_stack: Option<StackRecord>,
    /// Provider metadata extracted from the backend outputs.
    #[serde(default)]
    pub provider: Option<ProviderMetadata>,
    /// Nested auth stack.
    #[serde(default)]
    pub auth: Option<AuthRecord>,
    /// Lambda name to uploaded object key.
    #[serde(default)]
    pub lambda_keys: BTreeMap<String, String>,
    /// Client configuration document.
    #[serde(default)]
    pub client_config: Option<ClientConfig>,
}

/// A stack as last applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackRecord {
    /// Stack name.
    pub name: String,
    /// Provider stack id.
    pub stack_id: String,
    /// Parameters as persisted (secrets carried forward).
    pub parameters: Vec<Parameter>,
    /// Outputs at the last completed operation.
    #[serde(default)]
    pub outputs: StackOutputs,
    /// SHA-256 of the template last applied.
    pub template_hash: String,
    /// When the stack was last created or updated.
    pub updated_at: DateTime<Utc>,
}

/// Backend provider metadata, written to `team-provider-info.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderMetadata {
    /// Authenticated role name.
    pub auth_role_name: String,
    /// Authenticated role ARN.
    pub auth_role_arn: String,
    /// Unauthenticated role name.
    pub unauth_role_name: String,
    /// Unauthenticated role ARN.
    pub unauth_role_arn: String,
    /// Region the backend lives in.
    pub region: String,
    /// Deployment bucket.
    pub deployment_bucket_name: String,
    /// Backend stack name.
    pub stack_name: String,
    /// Backend stack id.
    pub stack_id: String,
}

/// Outputs of the nested auth stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthRecord {
    /// Nested stack name.
    pub stack_name: String,
    /// Template URL the nested stack was created from.
    #[serde(default)]
    pub template_url: Option<String>,
    /// Full output set of the nested stack.
    pub outputs: StackOutputs,
}

/// Client configuration consumed by the front end (`aws-config.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Project region.
    pub aws_project_region: String,
    /// User pool region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_cognito_region: Option<String>,
    /// User pool id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_user_pools_id: Option<String>,
    /// Web client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_user_pools_web_client_id: Option<String>,
    /// Hosted UI settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthConfig>,
    /// Federation target.
    #[serde(
        default,
        rename = "federationTarget",
        skip_serializing_if = "Option::is_none"
    )]
    pub federation_target: Option<String>,
}

/// Hosted UI settings of the client config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConfig {
    /// Hosted UI domain (unset).
    pub domain: Option<String>,
    /// Allowed scopes.
    pub scope: Vec<String>,
    /// First callback URL.
    pub redirect_sign_in: String,
    /// First logout URL.
    pub redirect_sign_out: String,
    /// Response type.
    pub response_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OAuthMetadata {
    #[serde(default, rename = "AllowedOAuthScopes")]
    allowed_oauth_scopes: Vec<String>,
    #[serde(default, rename = "CallbackURLs")]
    callback_urls: Vec<String>,
    #[serde(default, rename = "LogoutURLs")]
    logout_urls: Vec<String>,
}

/// A custom domain and its branch bindings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainRecord {
    /// Domain name.
    pub domain_name: String,
    /// Domain stack.
    pub stack: StackRecord,
    /// Branch to prefix bindings.
    pub subdomains: Vec<SubDomain>,
}

/// One branch bound under the custom domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct SubDomain {
    /// Branch name.
    pub branch_name: String,
    /// Subdomain prefix.
    pub prefix: String,
}

impl AppTopology {
    /// Starts a topology for a spec about to be created.
    #[must_use]
    pub fn new(spec: &AppSpec) -> Self {
        let now = Utc::now();
        let mut spec = spec.clone();
        spec.github_token = None;
        Self {
            version: String::from(TOPOLOGY_VERSION),
            alias: spec.alias.clone(),
            spec,
            app_id: None,
            app_stack: None,
            environments: Vec::new(),
            domain: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Looks up an environment record.
    #[must_use]
    pub fn environment(&self, name: &str) -> Option<&EnvironmentRecord> {
        self.environments
            .iter()
            .find(|e| e.environment_name == name)
    }

    /// Removes an environment record, returning true if it existed.
    pub fn remove_environment(&mut self, name: &str) -> bool {
        let before = self.environments.len();
        self.environments.retain(|e| e.environment_name != name);
        before != self.environments.len()
    }

    /// Subdomain bindings of every fully provisioned environment.
    #[must_use]
    pub fn subdomains(&self) -> Vec<SubDomain> {
        self.environments
            .iter()
            .filter(|e| e.stage == ProvisioningStage::Complete)
            .map(|e| SubDomain {
                branch_name: e.branch.clone(),
                prefix: e.environment_name.clone(),
            })
            .collect()
    }

    /// Marks the record as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl EnvironmentRecord {
    /// Creates a pending record for a declared environment.
    #[must_use]
    pub fn pending(env: &EnvironmentSpec) -> Self {
        Self {
            environment_name: env.environment_name.clone(),
            branch: env.branch.clone(),
            stage: ProvisioningStage::Pending,
            branch_stack: None,
            backend_stack: None,
            provider: None,
            auth: None,
            lambda_keys: BTreeMap::new(),
            client_config: None,
        }
    }
}

impl StackRecord {
    /// Records a completed stack operation.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        result: &StackResult,
        parameters: Vec<Parameter>,
        template_hash: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            stack_id: result.stack_id.clone(),
            parameters,
            outputs: result.outputs.clone(),
            template_hash: template_hash.into(),
            updated_at: Utc::now(),
        }
    }

    /// Applies the result of a later update.
    pub fn apply_update(
        &mut self,
        result: &StackResult,
        parameters: Vec<Parameter>,
        template_hash: impl Into<String>,
    ) {
        if !result.stack_id.is_empty() {
            self.stack_id.clone_from(&result.stack_id);
        }
        self.parameters = parameters;
        self.outputs = result.outputs.clone();
        self.template_hash = template_hash.into();
        self.updated_at = Utc::now();
    }
}

impl ProviderMetadata {
    /// Extracts provider metadata from backend stack outputs.
    ///
    /// # Errors
    ///
    /// Returns `OutputNotFound` for the first missing output.
    pub fn from_outputs(binder: &ParameterBinder, outputs: &StackOutputs) -> Result<Self> {
        Ok(Self {
            auth_role_name: binder.extract_output("AuthRoleName", outputs)?,
            auth_role_arn: binder.extract_output("AuthRoleArn", outputs)?,
            unauth_role_name: binder.extract_output("UnauthRoleName", outputs)?,
            unauth_role_arn: binder.extract_output("UnauthRoleArn", outputs)?,
            region: binder.extract_output("Region", outputs)?,
            deployment_bucket_name: binder.extract_output("DeploymentBucketName", outputs)?,
            stack_name: binder.extract_output("StackName", outputs)?,
            stack_id: binder.extract_output("StackId", outputs)?,
        })
    }
}

impl ClientConfig {
    /// Builds the client config for an environment.
    ///
    /// Without auth only the project region is set.
    ///
    /// # Errors
    ///
    /// Returns an error if an auth output is missing or `OAuthMetadata` is
    /// not valid JSON.
    pub fn build(
        binder: &ParameterBinder,
        provider: &ProviderMetadata,
        auth: Option<&AuthRecord>,
    ) -> Result<Self> {
        let Some(auth) = auth else {
            return Ok(Self {
                aws_project_region: provider.region.clone(),
                aws_cognito_region: None,
                aws_user_pools_id: None,
                aws_user_pools_web_client_id: None,
                oauth: None,
                federation_target: None,
            });
        };

        let oauth = match auth.outputs.get("OAuthMetadata") {
            Some(raw) => {
                let metadata: OAuthMetadata =
                    serde_json::from_str(raw).map_err(|e| StackError::InvalidResponse {
                        message: format!("OAuthMetadata of {} is not valid JSON: {e}", auth.stack_name),
                    })?;
                Some(OAuthConfig {
                    domain: None,
                    scope: metadata.allowed_oauth_scopes,
                    redirect_sign_in: metadata.callback_urls.into_iter().next().unwrap_or_default(),
                    redirect_sign_out: metadata.logout_urls.into_iter().next().unwrap_or_default(),
                    response_type: String::from("token"),
                })
            }
            None => None,
        };

        Ok(Self {
            aws_project_region: provider.region.clone(),
            aws_cognito_region: Some(provider.region.clone()),
            aws_user_pools_id: Some(binder.extract_output("UserPoolId", &auth.outputs)?),
            aws_user_pools_web_client_id: Some(
                binder.extract_output("AppClientIDWeb", &auth.outputs)?,
            ),
            oauth,
            federation_target: Some(String::from("COGNITO_USER_POOLS")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AmplistackError, ParameterError};

    fn provider() -> ProviderMetadata {
        ProviderMetadata {
            auth_role_name: String::from("acme-role-auth-dev"),
            auth_role_arn: String::from("arn:aws:iam::1:role/acme-role-auth-dev"),
            unauth_role_name: String::from("acme-role-unauth-dev"),
            unauth_role_arn: String::from("arn:aws:iam::1:role/acme-role-unauth-dev"),
            region: String::from("us-east-2"),
            deployment_bucket_name: String::from("acme-bucket-deployment-dev"),
            stack_name: String::from("acme-amplify-backend-dev"),
            stack_id: String::from("arn:stack/acme-amplify-backend-dev/1"),
        }
    }

    #[test]
    fn test_client_config_with_auth() {
        let auth = AuthRecord {
            stack_name: String::from("acme-amplify-backend-dev-auth"),
            template_url: None,
            outputs: [
                ("UserPoolId", "us-east-2_abc"),
                ("AppClientIDWeb", "web123"),
                (
                    "OAuthMetadata",
                    r#"{"AllowedOAuthScopes":["email","openid"],"CallbackURLs":["https://dev.acme.io/"],"LogoutURLs":["https://dev.acme.io/signout"]}"#,
                ),
            ]
            .into_iter()
            .collect(),
        };

        let config = ClientConfig::build(&ParameterBinder::new(), &provider(), Some(&auth))
            .expect("client config");
        let json = serde_json::to_value(&config).expect("serialize");

        assert_eq!(json["aws_project_region"], "us-east-2");
        assert_eq!(json["aws_cognito_region"], "us-east-2");
        assert_eq!(json["aws_user_pools_id"], "us-east-2_abc");
        assert_eq!(json["aws_user_pools_web_client_id"], "web123");
        assert_eq!(json["oauth"]["domain"], serde_json::Value::Null);
        assert_eq!(json["oauth"]["scope"], serde_json::json!(["email", "openid"]));
        assert_eq!(json["oauth"]["redirectSignIn"], "https://dev.acme.io/");
        assert_eq!(json["oauth"]["redirectSignOut"], "https://dev.acme.io/signout");
        assert_eq!(json["oauth"]["responseType"], "token");
        assert_eq!(json["federationTarget"], "COGNITO_USER_POOLS");
    }

    #[test]
    fn test_client_config_without_auth() {
        let config =
            ClientConfig::build(&ParameterBinder::new(), &provider(), None).expect("client config");
        let json = serde_json::to_value(&config).expect("serialize");
        assert_eq!(json, serde_json::json!({"aws_project_region": "us-east-2"}));
    }

    #[test]
    fn test_provider_metadata_requires_every_output() {
        let outputs: StackOutputs = [("Region", "us-east-2")].into_iter().collect();
        let err = ProviderMetadata::from_outputs(&ParameterBinder::new(), &outputs)
            .expect_err("incomplete outputs");
        assert!(matches!(
            err,
            AmplistackError::Parameter(ParameterError::OutputNotFound { .. })
        ));
    }

    #[test]
    fn test_provider_metadata_wire_names() {
        let json = serde_json::to_value(provider()).expect("serialize");
        assert_eq!(json["DeploymentBucketName"], "acme-bucket-deployment-dev");
        assert_eq!(json["AuthRoleArn"], "arn:aws:iam::1:role/acme-role-auth-dev");
    }

    #[test]
    fn test_stage_ordering() {
        assert!(ProvisioningStage::Pending < ProvisioningStage::BranchCreated);
        assert!(ProvisioningStage::BackendCreated < ProvisioningStage::Complete);
    }
}
