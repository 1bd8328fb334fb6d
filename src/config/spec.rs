//! Application spec types.
//!
//! These structs map to the application spec file (`app-params.json`) that
//! drives every workflow. Field names follow the camelCase wire format of the
//! file so an existing spec can be used unchanged.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parameter key used by the custom message trigger function.
pub const CUSTOM_MESSAGE_PARAMETER_KEY: &str = "CustomMessageFunctionS3Key";

/// Lambda name that maps onto [`CUSTOM_MESSAGE_PARAMETER_KEY`].
pub const CUSTOM_MESSAGE_LAMBDA: &str = "custom-message";

/// The root application spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    /// Application name, used as the prefix of every stack name.
    pub app_name: String,
    /// Source repository connected to the hosting app.
    pub repository_url: String,
    /// Custom domain (optional).
    #[serde(default)]
    pub domain: Option<String>,
    /// Local alias; names the mirror directory.
    pub alias: String,
    /// Environment checked out locally by default.
    #[serde(default)]
    pub default_environment: Option<String>,
    /// Repository access token. Never written back to disk.
    #[serde(default, skip_serializing)]
    pub github_token: Option<String>,
    /// Environments, provisioned strictly in this order.
    #[serde(default)]
    pub environments: Vec<EnvironmentSpec>,
    /// Lambda functions wired into the backend.
    #[serde(default)]
    pub lambdas: Vec<LambdaSpec>,
    /// Whether the backend carries nested authentication.
    #[serde(default = "default_auth")]
    pub auth: bool,
}

/// A single environment declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    /// Environment name (e.g. "dev", "prod").
    pub environment_name: String,
    /// Git branch deployed to this environment.
    pub branch: String,
}

/// A lambda function artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LambdaSpec {
    /// Function name.
    pub name: String,
    /// Path to the built zip archive.
    pub artifact: PathBuf,
    /// Backend stack parameter receiving the object key.
    #[serde(default)]
    pub parameter_key: Option<String>,
}

/// What a provisioning run has to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Nested auth stack under each backend.
    pub auth: bool,
    /// Lambda artifacts threaded into the backend.
    pub lambdas: bool,
    /// Custom domain stack.
    pub domain: bool,
}

const fn default_auth() -> bool {
    true
}

impl AppSpec {
    /// Derives the capabilities of this application.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        Capabilities {
            auth: self.auth,
            lambdas: !self.lambdas.is_empty(),
            domain: self.domain.is_some(),
        }
    }

    /// Looks up an environment by name.
    #[must_use]
    pub fn environment(&self, name: &str) -> Option<&EnvironmentSpec> {
        self.environments.iter().find(|e| e.environment_name == name)
    }

    /// Returns the environment names in declared order.
    #[must_use]
    pub fn environment_names(&self) -> Vec<&str> {
        self.environments
            .iter()
            .map(|e| e.environment_name.as_str())
            .collect()
    }
}

impl Capabilities {
    /// Returns true when the backend needs the nested-resource update.
    #[must_use]
    pub const fn nested_resources(&self) -> bool {
        self.auth || self.lambdas
    }
}

impl LambdaSpec {
    /// Resolves the backend parameter key for this function.
    ///
    /// `custom-message` maps to `CustomMessageFunctionS3Key`; other names are
    /// converted to PascalCase and suffixed with `FunctionS3Key`.
    #[must_use]
    pub fn resolved_parameter_key(&self) -> String {
        if let Some(key) = &self.parameter_key {
            return key.clone();
        }
        if self.name == CUSTOM_MESSAGE_LAMBDA {
            return String::from(CUSTOM_MESSAGE_PARAMETER_KEY);
        }

        let pascal: String = self
            .name
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_ascii_uppercase().to_string() + chars.as_str()
                })
            })
            .collect();

        format!("{pascal}FunctionS3Key")
    }
}
