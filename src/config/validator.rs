//! Spec validation.
//!
//! Validation runs before any remote or local state is touched, so a bad
//! spec never leaves half-created stacks behind.

use crate::error::{AmplistackError, ConfigError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{AppSpec, EnvironmentSpec, LambdaSpec};

/// Validator for application specs.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Whether lambda artifact files must exist on disk.
    check_artifacts: bool,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            check_artifacts: false,
        }
    }

    /// Requires lambda artifacts to exist on disk.
    #[must_use]
    pub const fn with_artifact_check(mut self, check: bool) -> Self {
        self.check_artifacts = check;
        self
    }

    /// Validates an application spec.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, spec: &AppSpec) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_app(spec, &mut result);
        Self::validate_environments(spec, &mut result);
        self.validate_lambdas(&spec.lambdas, &mut result);
        Self::validate_domain(spec, &mut result);

        if result.errors.is_empty() {
            debug!("Spec validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(AmplistackError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates app-level fields.
    fn validate_app(spec: &AppSpec, result: &mut ValidationResult) {
        if spec.app_name.is_empty() {
            result.push("appName", "App name cannot be empty");
        } else if !is_valid_name(&spec.app_name) {
            result.push(
                "appName",
                format!(
                    "App name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    spec.app_name
                ),
            );
        }

        if spec.repository_url.trim().is_empty() {
            result.push("repositoryUrl", "Repository URL cannot be empty");
        }

        if spec.alias.is_empty()
            || spec.alias.starts_with('.')
            || spec.alias.contains(['/', '\\'])
        {
            result.push(
                "alias",
                format!("Alias '{}' must be a plain directory name", spec.alias),
            );
        }
    }

    /// Validates environments and the default environment.
    fn validate_environments(spec: &AppSpec, result: &mut ValidationResult) {
        let mut names = HashSet::new();
        let mut branches = HashSet::new();

        for (i, env) in spec.environments.iter().enumerate() {
            Self::validate_environment(i, env, result);

            if !names.insert(env.environment_name.as_str()) {
                result.push(
                    format!("environments[{i}].environmentName"),
                    format!("Duplicate environment name: {}", env.environment_name),
                );
            }
            if !env.branch.is_empty() && !branches.insert(env.branch.as_str()) {
                result.push(
                    format!("environments[{i}].branch"),
                    format!("Branch '{}' is used by more than one environment", env.branch),
                );
            }
        }

        if spec.environments.is_empty() {
            if spec.default_environment.is_some() {
                result
                    .warnings
                    .push(String::from("defaultEnvironment is ignored without environments"));
            }
            return;
        }

        match spec.default_environment.as_deref() {
            None | Some("") => result.push(
                "defaultEnvironment",
                "You must define a default environment if an environments array is defined",
            ),
            Some(default) if spec.environment(default).is_none() => result.push(
                "defaultEnvironment",
                format!("Default environment '{default}' is not declared"),
            ),
            Some(_) => {}
        }
    }

    /// Validates a single environment.
    fn validate_environment(index: usize, env: &EnvironmentSpec, result: &mut ValidationResult) {
        let prefix = format!("environments[{index}]");

        if env.environment_name.is_empty() {
            result.push(
                format!("{prefix}.environmentName"),
                "Environment name cannot be empty",
            );
        } else if !is_valid_name(&env.environment_name) {
            result.push(
                format!("{prefix}.environmentName"),
                format!(
                    "Environment name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    env.environment_name
                ),
            );
        }

        if env.branch.is_empty() {
            result.push(
                format!("{prefix}.branch"),
                format!("Environment '{}' must name a branch", env.environment_name),
            );
        } else if !is_valid_branch(&env.branch) {
            result.push(
                format!("{prefix}.branch"),
                format!(
                    "Branch '{}' cannot be used in a stack name. Use letters, digits and hyphens.",
                    env.branch
                ),
            );
        }
    }

    /// Validates lambda declarations.
    fn validate_lambdas(&self, lambdas: &[LambdaSpec], result: &mut ValidationResult) {
        let mut names = HashSet::new();
        let mut keys = HashSet::new();

        for (i, lambda) in lambdas.iter().enumerate() {
            let prefix = format!("lambdas[{i}]");

            if !is_valid_name(&lambda.name) {
                result.push(
                    format!("{prefix}.name"),
                    format!("Lambda name '{}' is invalid", lambda.name),
                );
            }
            if !names.insert(lambda.name.as_str()) {
                result.push(
                    format!("{prefix}.name"),
                    format!("Duplicate lambda name: {}", lambda.name),
                );
            }
            if !keys.insert(lambda.resolved_parameter_key()) {
                result.push(
                    format!("{prefix}.parameterKey"),
                    format!("Lambda '{}' reuses another lambda's parameter key", lambda.name),
                );
            }
            if self.check_artifacts && !lambda.artifact.exists() {
                result.push(
                    format!("{prefix}.artifact"),
                    format!("Artifact not found: {}", lambda.artifact.display()),
                );
            }
        }
    }

    /// Validates the custom domain.
    fn validate_domain(spec: &AppSpec, result: &mut ValidationResult) {
        if let Some(domain) = &spec.domain {
            if domain.trim().is_empty() || !domain.contains('.') {
                result.push("domain", format!("Domain '{domain}' is not a valid host name"));
            }
            if spec.environments.is_empty() {
                result.push("domain", "A custom domain requires at least one environment");
            }
        }
    }
}

impl ValidationResult {
    /// Records an error.
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.ends_with('-')
        && !name.contains("--")
}

/// Branch names end up inside stack names.
fn is_valid_branch(branch: &str) -> bool {
    branch
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && branch.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
