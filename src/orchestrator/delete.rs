//! The delete workflow.

use tracing::{info, instrument, warn};

use super::naming::{
    app_stack_name, backend_stack_name, branch_stack_name, deployment_bucket_name,
    domain_stack_name,
};
use super::{Orchestrator, Outcome, Stage, Workflow, WorkflowReport};
use crate::cloudformation::CloudFormationApi;
use crate::error::Result;
use crate::mirror::{AppTopology, MirrorStore};
use crate::uploader::ArtifactStore;

impl<A, S, M> Orchestrator<A, S, M>
where
    A: CloudFormationApi + ?Sized,
    S: ArtifactStore,
    M: MirrorStore,
{
    /// Tears down every resource of an application in reverse creation
    /// order: domain, then per environment branch, bucket contents, backend
    /// and mirror files, then the hosting app.
    ///
    /// Stack names are derived from the recorded spec, so environments
    /// interrupted mid-create are still removed. Stacks, objects and files
    /// that are already gone are skipped, which makes a failed delete safe
    /// to re-run.
    ///
    /// # Errors
    ///
    /// Returns `Inconsistent` if nothing is recorded for the alias, otherwise
    /// the first stack, upload or mirror error.
    #[instrument(skip(self))]
    pub async fn delete(&self, alias: &str) -> Result<WorkflowReport> {
        let mut topology = self.load_topology(alias).await?;
        let spec = topology.spec.clone();
        let mut report = WorkflowReport::new(Workflow::Delete, alias);

        if let Some(domain) = &spec.domain {
            let name = domain_stack_name(&spec.app_name, domain);
            let outcome = self.delete_stack(&name).await?;
            report.record(Stage::Domain, name, outcome);

            let removed = self.mirror.remove_domain(alias).await?;
            report.record(Stage::LocalState, "domain", Outcome::Removed(removed));
            topology.domain = None;
            self.persist(&mut topology).await?;
        }

        for env in &spec.environments {
            let env_name = env.environment_name.as_str();

            let name = branch_stack_name(&spec.app_name, &env.branch);
            let outcome = self.delete_stack(&name).await?;
            report.record_env(Stage::Branch, env_name, name, outcome);

            let bucket = recorded_bucket(&topology, env_name)
                .unwrap_or_else(|| deployment_bucket_name(&spec.app_name, env_name));
            let removed = self.artifacts.empty_bucket(&bucket).await?;
            info!("Removed {removed} object(s) from {bucket}");
            report.record_env(Stage::Bucket, env_name, bucket, Outcome::Removed(removed));

            let name = backend_stack_name(&spec.app_name, env_name);
            let outcome = self.delete_stack(&name).await?;
            report.record_env(Stage::Backend, env_name, name, outcome);

            let removed = self.mirror.remove_environment(alias, env_name).await?;
            report.record_env(Stage::LocalState, env_name, env_name, Outcome::Removed(removed));
            topology.remove_environment(env_name);
            self.persist(&mut topology).await?;
        }

        let name = app_stack_name(&spec.app_name);
        let outcome = self.delete_stack(&name).await?;
        report.record(Stage::App, name, outcome);

        let removed = self.mirror.remove_app(alias).await?;
        report.record(Stage::LocalState, alias, Outcome::Removed(removed));

        info!("All resources of {alias} deleted");
        Ok(report.finish())
    }

    async fn delete_stack(&self, name: &str) -> Result<Outcome> {
        if self.stacks.delete_stack(name).await? {
            Ok(Outcome::Deleted)
        } else {
            warn!("Stack {name} does not exist, skipping");
            Ok(Outcome::Absent)
        }
    }
}

/// Bucket recorded for an environment, if its backend got that far.
fn recorded_bucket(topology: &AppTopology, environment: &str) -> Option<String> {
    topology
        .environment(environment)
        .and_then(|e| e.provider.as_ref())
        .map(|p| p.deployment_bucket_name.clone())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{
        APP_STACK, BACKEND_STACK, BRANCH_STACK, BUCKET, DOMAIN_STACK, Harness, permissive_store,
    };
    use super::*;
    use crate::error::{AmplistackError, MirrorError, UploadError};
    use crate::uploader::MockArtifactStore;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_delete_runs_in_reverse_order() {
        let harness = Harness::new();
        harness.create().await;
        let created = harness.api.calls().len();

        let api = Arc::clone(&harness.api);
        let mut store = MockArtifactStore::new();
        store
            .expect_empty_bucket()
            .withf(|bucket| bucket == BUCKET)
            .times(1)
            .returning(move |_| {
                assert_eq!(
                    api.labels().last().map(String::as_str),
                    Some("delete:acme-amplify-branch-develop")
                );
                Ok(4)
            });

        let report = assert_ok!(harness.orchestrator(store).delete("acme").await);

        assert_eq!(
            harness.api.labels()[created..].to_vec(),
            vec![
                format!("delete:{DOMAIN_STACK}"),
                format!("delete:{BRANCH_STACK}"),
                format!("delete:{BACKEND_STACK}"),
                format!("delete:{APP_STACK}"),
            ]
        );
        assert_eq!(
            report.resources_with(Outcome::Deleted),
            vec![DOMAIN_STACK, BRANCH_STACK, BACKEND_STACK, APP_STACK]
        );
        assert!(report.steps.iter().any(|s| s.outcome == Outcome::Removed(4)));

        let alias_dir = harness.alias_dir();
        assert!(!alias_dir.join("dev").exists());
        assert!(!alias_dir.join("topology.json").exists());
        assert!(!alias_dir.join("domain-template.json").exists());
        assert!(!alias_dir.join("team-provider-info.json").exists());
        assert!(alias_dir.join("app-params.json").exists());
        assert!(!assert_ok!(harness.mirror().exists("acme").await));
    }

    #[tokio::test]
    async fn test_delete_resumes_after_partial_failure() {
        let harness = Harness::new();
        harness.create().await;

        let mut failing = MockArtifactStore::new();
        failing
            .expect_empty_bucket()
            .returning(|bucket| Err(UploadError::request(bucket, "", "access denied").into()));
        assert_err!(harness.orchestrator(failing).delete("acme").await);

        let topology = assert_ok!(harness.mirror().load("acme").await).expect("still recorded");
        assert!(topology.domain.is_none());
        assert!(topology.environment("dev").is_some());

        let report = assert_ok!(
            harness
                .orchestrator(permissive_store())
                .delete("acme")
                .await
        );
        assert_eq!(
            report.resources_with(Outcome::Absent),
            vec![DOMAIN_STACK, BRANCH_STACK]
        );
        assert_eq!(
            report.resources_with(Outcome::Deleted),
            vec![BACKEND_STACK, APP_STACK]
        );
        assert!(harness.api.stack_names().is_empty());
    }

    #[tokio::test]
    async fn test_delete_after_interrupted_create() {
        let harness = Harness::new();
        harness.api.fail(BACKEND_STACK);
        assert_err!(
            harness
                .orchestrator(MockArtifactStore::new())
                .create(&harness.spec())
                .await
        );

        let mut store = MockArtifactStore::new();
        store
            .expect_empty_bucket()
            .withf(|bucket| bucket == BUCKET)
            .returning(|_| Ok(0));
        let report = assert_ok!(harness.orchestrator(store).delete("acme").await);

        assert_eq!(report.resources_with(Outcome::Absent), vec![DOMAIN_STACK]);
        assert!(harness.api.stack_names().is_empty());
        assert!(!harness.alias_dir().join("dev").exists());
    }

    #[tokio::test]
    async fn test_delete_unknown_alias() {
        let harness = Harness::new();
        let err = assert_err!(
            harness
                .orchestrator(MockArtifactStore::new())
                .delete("acme")
                .await
        );
        assert!(matches!(
            err,
            AmplistackError::Mirror(MirrorError::Inconsistent { .. })
        ));
        assert!(harness.api.calls().is_empty());
    }
}
