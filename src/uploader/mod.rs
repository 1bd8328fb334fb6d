//! Artifact uploads to the per-environment deployment bucket.
//!
//! Templates referenced by nested stacks and lambda build archives have to be
//! in the bucket before the stack operation that points at them runs.

mod s3;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::config::LambdaSpec;
use crate::error::Result;

pub use s3::S3ArtifactStore;

/// Prefix under which lambda builds are stored.
pub const LAMBDA_BUILDS_PREFIX: &str = "amplify-builds";

/// Object key of the root backend template with nested resources.
pub const NESTED_STACK_TEMPLATE_KEY: &str = "nested-cloudformation-stack.yml";

/// Object key of the auth template referenced by the root template.
pub const AUTH_TEMPLATE_KEY: &str = "amplify-cfn-templates/auth/backend-auth.yml";

/// A local file and the object key it is uploaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Local source file.
    pub source: PathBuf,
    /// Destination object key.
    pub key: String,
}

impl Artifact {
    /// Creates an artifact.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            key: key.into(),
        }
    }

    /// Builds the artifact for a lambda build archive.
    ///
    /// Keys look like `amplify-builds/{app}-lambda-{fn}-{millis}-build.zip`.
    #[must_use]
    pub fn lambda(app_name: &str, lambda: &LambdaSpec, at: DateTime<Utc>) -> Self {
        Self::new(
            &lambda.artifact,
            format!(
                "{LAMBDA_BUILDS_PREFIX}/{app_name}-lambda-{}-{}-build.zip",
                lambda.name,
                at.timestamp_millis()
            ),
        )
    }

    /// The nested-stack templates every backend with nested resources needs.
    #[must_use]
    pub fn backend_templates(templates_dir: &Path) -> Vec<Self> {
        vec![
            Self::new(
                templates_dir.join("backend-root-with-auth.yml"),
                NESTED_STACK_TEMPLATE_KEY,
            ),
            Self::new(templates_dir.join("backend-auth.yml"), AUTH_TEMPLATE_KEY),
        ]
    }
}

/// Object store holding deployment artifacts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Uploads an artifact and returns its object key.
    async fn upload(&self, bucket: &str, artifact: &Artifact) -> Result<String>;

    /// Deletes a single object. Missing objects are not an error.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Deletes every object in the bucket and returns how many were removed.
    ///
    /// A bucket that does not exist counts as empty.
    async fn empty_bucket(&self, bucket: &str) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lambda_key_naming() {
        let lambda = LambdaSpec {
            name: String::from("custom-message"),
            artifact: PathBuf::from("lambda/custom-message/build.zip"),
            parameter_key: None,
        };
        let at = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .single()
            .expect("valid time");

        let artifact = Artifact::lambda("acme", &lambda, at);
        assert_eq!(
            artifact.key,
            format!("amplify-builds/acme-lambda-custom-message-{}-build.zip", at.timestamp_millis())
        );
        assert_eq!(artifact.source, PathBuf::from("lambda/custom-message/build.zip"));
    }

    #[test]
    fn test_backend_template_keys() {
        let artifacts = Artifact::backend_templates(Path::new("iac/templates"));
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].key, "nested-cloudformation-stack.yml");
        assert_eq!(
            artifacts[0].source,
            PathBuf::from("iac/templates/backend-root-with-auth.yml")
        );
        assert_eq!(artifacts[1].key, "amplify-cfn-templates/auth/backend-auth.yml");
    }
}
