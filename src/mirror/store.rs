//! Mirror store trait definition.

use async_trait::async_trait;

use super::types::AppTopology;
use crate::error::Result;

/// Repository for the local mirror of each application's topology.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Returns true if a topology record exists for the alias.
    async fn exists(&self, alias: &str) -> Result<bool>;

    /// Loads the topology for an alias.
    ///
    /// Returns `None` if nothing has been recorded yet.
    async fn load(&self, alias: &str) -> Result<Option<AppTopology>>;

    /// Saves the topology and rewrites every projection file.
    async fn save(&self, topology: &AppTopology) -> Result<()>;

    /// Stores the generated domain template.
    async fn write_domain_template(&self, alias: &str, template: &serde_json::Value) -> Result<()>;

    /// Reads the stored domain template.
    async fn read_domain_template(&self, alias: &str) -> Result<Option<serde_json::Value>>;

    /// Removes one environment's files. Missing files are skipped.
    ///
    /// Returns the number of files removed.
    async fn remove_environment(&self, alias: &str, environment: &str) -> Result<usize>;

    /// Removes the domain files. Missing files are skipped.
    async fn remove_domain(&self, alias: &str) -> Result<usize>;

    /// Removes the app-level files, keeping the spec copy.
    async fn remove_app(&self, alias: &str) -> Result<usize>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl MirrorStore for Box<dyn MirrorStore> {
    async fn exists(&self, alias: &str) -> Result<bool> {
        (**self).exists(alias).await
    }

    async fn load(&self, alias: &str) -> Result<Option<AppTopology>> {
        (**self).load(alias).await
    }

    async fn save(&self, topology: &AppTopology) -> Result<()> {
        (**self).save(topology).await
    }

    async fn write_domain_template(&self, alias: &str, template: &serde_json::Value) -> Result<()> {
        (**self).write_domain_template(alias, template).await
    }

    async fn read_domain_template(&self, alias: &str) -> Result<Option<serde_json::Value>> {
        (**self).read_domain_template(alias).await
    }

    async fn remove_environment(&self, alias: &str, environment: &str) -> Result<usize> {
        (**self).remove_environment(alias, environment).await
    }

    async fn remove_domain(&self, alias: &str) -> Result<usize> {
        (**self).remove_domain(alias).await
    }

    async fn remove_app(&self, alias: &str) -> Result<usize> {
        (**self).remove_app(alias).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
