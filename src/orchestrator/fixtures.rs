//! Test harness shared by the workflow tests.

use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use super::{Orchestrator, TemplateSet};
use crate::cloudformation::fake::FakeCloudFormation;
use crate::cloudformation::{PollSettings, StackClient};
use crate::config::AppSpec;
use crate::mirror::LocalMirrorStore;
use crate::uploader::MockArtifactStore;

pub const APP_STACK: &str = "acme-amplify-app";
pub const BRANCH_STACK: &str = "acme-amplify-branch-develop";
pub const BACKEND_STACK: &str = "acme-amplify-backend-dev";
pub const DOMAIN_STACK: &str = "acme-amplify-domain-acmeio";
pub const AUTH_STACK: &str = "acme-amplify-backend-dev-authacme-1XYZ";
pub const BUCKET: &str = "acme-bucket-deployment-dev";

pub type TestOrchestrator = Orchestrator<FakeCloudFormation, MockArtifactStore, LocalMirrorStore>;

/// Temp directories, template files and a scripted provider for `acme`.
pub struct Harness {
    pub dir: TempDir,
    pub api: Arc<FakeCloudFormation>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");

        let templates = dir.path().join("templates");
        std::fs::create_dir_all(&templates).expect("templates dir");
        for (name, body) in [
            ("amplify-app.yml", "Resources:\n  App: {Type: AWS::Amplify::App}\n"),
            ("amplify-branch.yml", "Resources:\n  Branch: {Type: AWS::Amplify::Branch}\n"),
            ("backend-root.yml", "Resources:\n  DeploymentBucket: {Type: AWS::S3::Bucket}\n"),
            (
                "backend-root-with-auth.yml",
                "Resources:\n  DeploymentBucket: {Type: AWS::S3::Bucket}\n  Auth: {Type: AWS::CloudFormation::Stack}\n",
            ),
            ("backend-auth.yml", "Resources:\n  UserPool: {Type: AWS::Cognito::UserPool}\n"),
        ] {
            std::fs::write(templates.join(name), body).expect("write template");
        }

        let build = dir.path().join("lambda/custom-message");
        std::fs::create_dir_all(&build).expect("lambda dir");
        std::fs::write(build.join("build.zip"), b"PK\x03\x04").expect("write build");

        let api = Arc::new(FakeCloudFormation::new());
        api.on_create(APP_STACK, &[("AppId", "d1a2b3c4")]);
        api.on_create(
            BACKEND_STACK,
            &[
                ("AuthRoleName", "acme-role-auth-dev"),
                ("AuthRoleArn", "arn:aws:iam::123456789012:role/acme-role-auth-dev"),
                ("UnauthRoleName", "acme-role-unauth-dev"),
                ("UnauthRoleArn", "arn:aws:iam::123456789012:role/acme-role-unauth-dev"),
                ("Region", "us-east-2"),
                ("DeploymentBucketName", BUCKET),
                ("StackName", BACKEND_STACK),
                (
                    "StackId",
                    "arn:aws:cloudformation:us-east-2:123456789012:stack/acme-amplify-backend-dev/1",
                ),
            ],
        );
        api.on_update(
            BACKEND_STACK,
            &[
                ("AuthStackName", AUTH_STACK),
                (
                    "AuthTemplateURL",
                    "https://s3.amazonaws.com/acme-bucket-deployment-dev/amplify-cfn-templates/auth/backend-auth.yml",
                ),
            ],
        );
        api.nested_on_update(
            BACKEND_STACK,
            AUTH_STACK,
            &[
                ("UserPoolId", "us-east-2_AbCdEf"),
                ("AppClientIDWeb", "5lq8webclient"),
                (
                    "OAuthMetadata",
                    r#"{"AllowedOAuthScopes":["email","openid"],"CallbackURLs":["https://dev.acme.io/"],"LogoutURLs":["https://dev.acme.io/signout"]}"#,
                ),
            ],
        );

        Self { dir, api }
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.dir.path().join("apps")
    }

    pub fn alias_dir(&self) -> PathBuf {
        self.apps_dir().join("acme")
    }

    pub fn mirror(&self) -> LocalMirrorStore {
        LocalMirrorStore::new(self.apps_dir())
    }

    /// `acme` with one environment, auth, a custom message lambda and a
    /// custom domain.
    pub fn spec(&self) -> AppSpec {
        serde_json::from_value(json!({
            "appName": "acme",
            "repositoryUrl": "https://github.com/acme/web",
            "domain": "acme.io",
            "alias": "acme",
            "defaultEnvironment": "dev",
            "githubToken": "ghp_test_token",
            "environments": [{"environmentName": "dev", "branch": "develop"}],
            "lambdas": [{
                "name": "custom-message",
                "artifact": self.dir.path().join("lambda/custom-message/build.zip"),
            }],
        }))
        .expect("valid spec")
    }

    pub fn orchestrator(&self, artifacts: MockArtifactStore) -> TestOrchestrator {
        Orchestrator::new(
            StackClient::new(
                Arc::clone(&self.api),
                PollSettings::new(Duration::from_millis(1), Duration::from_secs(5)),
            ),
            artifacts,
            self.mirror(),
            TemplateSet::new(self.dir.path().join("templates")),
        )
    }

    /// Runs a full create with an accepting artifact store.
    pub async fn create(&self) {
        self.orchestrator(permissive_store())
            .create(&self.spec())
            .await
            .expect("create");
    }
}

/// An artifact store that accepts every call.
pub fn permissive_store() -> MockArtifactStore {
    let mut store = MockArtifactStore::new();
    store
        .expect_upload()
        .returning(|_, artifact| Ok(artifact.key.clone()));
    store.expect_delete_object().returning(|_, _| Ok(()));
    store.expect_empty_bucket().returning(|_| Ok(0));
    store
}
