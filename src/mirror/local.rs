//! File-based mirror store.
//!
//! Layout under `<root>/<alias>/`:
//!
//! ```text
//! topology.json               canonical record
//! app-params.json             spec copy (no token)
//! amplify-app-params.json     hosting app stack parameters
//! domain-params.json          domain stack parameters
//! domain-template.json        generated domain template
//! team-provider-info.json     per-environment provider metadata
//! <env>/amplify-branch-params.json
//! <env>/backend-root-params.json
//! <env>/aws-config.json
//! ```

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::store::MirrorStore;
use super::types::{AppTopology, EnvironmentRecord};
use crate::error::{MirrorError, Result};

const TOPOLOGY_FILE: &str = "topology.json";
const APP_PARAMS_FILE: &str = "app-params.json";
const AMPLIFY_APP_PARAMS_FILE: &str = "amplify-app-params.json";
const DOMAIN_PARAMS_FILE: &str = "domain-params.json";
const DOMAIN_TEMPLATE_FILE: &str = "domain-template.json";
const TEAM_PROVIDER_INFO_FILE: &str = "team-provider-info.json";
const BRANCH_PARAMS_FILE: &str = "amplify-branch-params.json";
const BACKEND_PARAMS_FILE: &str = "backend-root-params.json";
const CLIENT_CONFIG_FILE: &str = "aws-config.json";

/// Local file-based mirror store.
#[derive(Debug)]
pub struct LocalMirrorStore {
    /// Root directory holding one directory per alias.
    root: PathBuf,
    /// Single writer for every file under `root`.
    writer: Mutex<()>,
}

impl LocalMirrorStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writer: Mutex::new(()),
        }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of one alias.
    #[must_use]
    pub fn alias_dir(&self, alias: &str) -> PathBuf {
        self.root.join(alias)
    }

    /// Returns the directory of one environment.
    #[must_use]
    pub fn environment_dir(&self, alias: &str, environment: &str) -> PathBuf {
        self.alias_dir(alias).join(environment)
    }

    async fn write_projections(&self, topology: &AppTopology) -> Result<()> {
        let dir = self.alias_dir(&topology.alias);

        write_json(&dir.join(APP_PARAMS_FILE), &topology.spec).await?;
        if let Some(app) = &topology.app_stack {
            write_json(&dir.join(AMPLIFY_APP_PARAMS_FILE), &app.parameters).await?;
        }
        if let Some(domain) = &topology.domain {
            write_json(&dir.join(DOMAIN_PARAMS_FILE), &domain.stack.parameters).await?;
        }

        for env in &topology.environments {
            let env_dir = dir.join(&env.environment_name);
            if let Some(branch) = &env.branch_stack {
                write_json(&env_dir.join(BRANCH_PARAMS_FILE), &branch.parameters).await?;
            }
            if let Some(backend) = &env.backend_stack {
                write_json(&env_dir.join(BACKEND_PARAMS_FILE), &backend.parameters).await?;
            }
            if let Some(config) = &env.client_config {
                write_json(&env_dir.join(CLIENT_CONFIG_FILE), config).await?;
            }
        }

        self.merge_team_provider_info(topology).await
    }

    /// Read-modify-write of the aggregate provider record.
    async fn merge_team_provider_info(&self, topology: &AppTopology) -> Result<()> {
        let entries: Vec<(String, Value)> = topology
            .environments
            .iter()
            .filter_map(|env| Some((env.environment_name.clone(), team_provider_entry(topology, env)?)))
            .collect();
        if entries.is_empty() {
            return Ok(());
        }

        let path = self.alias_dir(&topology.alias).join(TEAM_PROVIDER_INFO_FILE);
        let mut info: Map<String, Value> = read_json(&path).await?.unwrap_or_default();
        for (name, entry) in entries {
            info.insert(name, entry);
        }
        write_json(&path, &info).await
    }
}

fn team_provider_entry(topology: &AppTopology, env: &EnvironmentRecord) -> Option<Value> {
    let provider = env.provider.as_ref()?;
    let mut cloudformation = serde_json::to_value(provider).ok()?;
    if let (Value::Object(map), Some(app_id)) = (&mut cloudformation, &topology.app_id) {
        map.insert(String::from("AmplifyAppId"), Value::String(app_id.clone()));
    }

    let mut categories = Map::new();
    if let Some(auth) = &env.auth {
        let name = format!(
            "{}auth",
            topology
                .spec
                .app_name
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_lowercase()
        );
        categories.insert(String::from("auth"), json!({ name: auth.outputs }));
    }

    Some(json!({
        "awscloudformation": cloudformation,
        "categories": categories,
    }))
}

/// Writes JSON to `path` atomically: temp file, fsync, rename.
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| MirrorError::serialization(format!("{}: {e}", path.display())))?;

    let write_failed = |e: std::io::Error| MirrorError::WriteFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).await.map_err(write_failed)?;
    file.write_all(content.as_bytes()).await.map_err(write_failed)?;
    file.sync_all().await.map_err(write_failed)?;
    drop(file);

    fs::rename(&temp_path, path).await.map_err(write_failed)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).await.map_err(|e| MirrorError::Corrupted {
        message: format!("Failed to read {}: {e}", path.display()),
    })?;
    let value = serde_json::from_str(&content).map_err(|e| MirrorError::Corrupted {
        message: format!("Failed to parse {}: {e}", path.display()),
    })?;
    Ok(Some(value))
}

/// Removes a file if present; returns whether anything was removed.
async fn remove_if_exists(path: &Path) -> Result<bool> {
    if !path.exists() {
        debug!("Already absent: {}", path.display());
        return Ok(false);
    }
    fs::remove_file(path)
        .await
        .map_err(|e| MirrorError::WriteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(true)
}

/// Removes a directory if present and empty.
async fn remove_dir_if_empty(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Ok(());
    }
    let mut entries = fs::read_dir(path).await?;
    if entries.next_entry().await?.is_none() {
        fs::remove_dir(path).await?;
    } else {
        debug!("Leaving non-empty directory {}", path.display());
    }
    Ok(())
}

async fn remove_all(paths: &[PathBuf]) -> Result<usize> {
    let mut removed = 0;
    for path in paths {
        if remove_if_exists(path).await? {
            removed += 1;
        }
    }
    Ok(removed)
}

#[async_trait]
impl MirrorStore for LocalMirrorStore {
    async fn exists(&self, alias: &str) -> Result<bool> {
        Ok(self.alias_dir(alias).join(TOPOLOGY_FILE).exists())
    }

    async fn load(&self, alias: &str) -> Result<Option<AppTopology>> {
        let path = self.alias_dir(alias).join(TOPOLOGY_FILE);
        let topology: Option<AppTopology> = read_json(&path).await?;
        if let Some(topology) = &topology {
            debug!("Loaded topology for {} from {}", topology.alias, path.display());
        }
        Ok(topology)
    }

    async fn save(&self, topology: &AppTopology) -> Result<()> {
        let _guard = self.writer.lock().await;

        let path = self.alias_dir(&topology.alias).join(TOPOLOGY_FILE);
        info!("Saving local state to: {}", path.display());
        write_json(&path, topology).await?;
        self.write_projections(topology).await
    }

    async fn write_domain_template(&self, alias: &str, template: &Value) -> Result<()> {
        let _guard = self.writer.lock().await;
        write_json(&self.alias_dir(alias).join(DOMAIN_TEMPLATE_FILE), template).await
    }

    async fn read_domain_template(&self, alias: &str) -> Result<Option<Value>> {
        read_json(&self.alias_dir(alias).join(DOMAIN_TEMPLATE_FILE)).await
    }

    async fn remove_environment(&self, alias: &str, environment: &str) -> Result<usize> {
        let _guard = self.writer.lock().await;

        let dir = self.environment_dir(alias, environment);
        let removed = remove_all(&[
            dir.join(CLIENT_CONFIG_FILE),
            dir.join(BRANCH_PARAMS_FILE),
            dir.join(BACKEND_PARAMS_FILE),
        ])
        .await?;
        remove_dir_if_empty(&dir).await?;

        let info_path = self.alias_dir(alias).join(TEAM_PROVIDER_INFO_FILE);
        if let Some(mut info) = read_json::<Map<String, Value>>(&info_path).await?
            && info.remove(environment).is_some()
        {
            write_json(&info_path, &info).await?;
        }

        info!("Removed {removed} local files of environment {environment}");
        Ok(removed)
    }

    async fn remove_domain(&self, alias: &str) -> Result<usize> {
        let _guard = self.writer.lock().await;
        let dir = self.alias_dir(alias);
        remove_all(&[dir.join(DOMAIN_TEMPLATE_FILE), dir.join(DOMAIN_PARAMS_FILE)]).await
    }

    async fn remove_app(&self, alias: &str) -> Result<usize> {
        let _guard = self.writer.lock().await;
        let dir = self.alias_dir(alias);
        let removed = remove_all(&[
            dir.join(DOMAIN_TEMPLATE_FILE),
            dir.join(DOMAIN_PARAMS_FILE),
            dir.join(AMPLIFY_APP_PARAMS_FILE),
            dir.join(TEAM_PROVIDER_INFO_FILE),
            dir.join(TOPOLOGY_FILE),
        ])
        .await?;
        info!("Removed {removed} local files of {alias}");
        Ok(removed)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
