//! Stack template files.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::config::TemplateHasher;
use crate::error::{ConfigError, Result};

/// Hosting app template.
pub const APP_TEMPLATE: &str = "amplify-app.yml";
/// Branch template.
pub const BRANCH_TEMPLATE: &str = "amplify-branch.yml";
/// Backend root template without nested resources.
pub const BACKEND_ROOT_TEMPLATE: &str = "backend-root.yml";
/// Backend root template wiring auth and lambdas.
pub const BACKEND_NESTED_TEMPLATE: &str = "backend-root-with-auth.yml";

/// A loaded template body and its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Template body.
    pub body: String,
    /// SHA-256 of the body.
    pub hash: String,
}

impl Template {
    /// Wraps a body that did not come from the template directory.
    #[must_use]
    pub fn inline(body: String) -> Self {
        let hash = TemplateHasher::new().hash_template(&body);
        Self { body, hash }
    }
}

/// The directory holding stack templates.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    dir: PathBuf,
    hasher: TemplateHasher,
}

impl TemplateSet {
    /// Creates a template set over a directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            hasher: TemplateHasher::new(),
        }
    }

    /// Returns the template directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads a template by file name.
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound` if the file does not exist.
    pub async fn load(&self, name: &str) -> Result<Template> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Err(ConfigError::FileNotFound { path }.into());
        }

        let body = fs::read_to_string(&path).await?;
        let hash = self.hasher.hash_template(&body);
        debug!(
            "Loaded template {} ({})",
            path.display(),
            TemplateHasher::short_hash(&hash)
        );
        Ok(Template { body, hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AmplistackError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_hashes_body() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join(APP_TEMPLATE), "Resources: {}\n").expect("write");

        let set = TemplateSet::new(dir.path());
        let template = set.load(APP_TEMPLATE).await.expect("load");
        assert_eq!(template.body, "Resources: {}\n");
        assert_eq!(template.hash, TemplateHasher::new().hash_template("Resources: {}\n"));
    }

    #[tokio::test]
    async fn test_missing_template() {
        let dir = TempDir::new().expect("tempdir");
        let set = TemplateSet::new(dir.path());

        let err = set.load(BRANCH_TEMPLATE).await.expect_err("missing");
        assert!(matches!(
            err,
            AmplistackError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
