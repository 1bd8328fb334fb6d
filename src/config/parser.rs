//! Spec parser for loading application spec files.
//!
//! Spec files are JSON by default; `.yml`/`.yaml` files are read as YAML.
//! Secrets can come from the environment or a `.env` file instead of the
//! spec itself.

use crate::error::{ConfigError, AmplistackError, Result};
use std::path::Path;
use tracing::{debug, info};

use super::spec::AppSpec;

/// Environment variable that supplies the repository token.
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";

/// Spec parser for loading application specs.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for locating the `.env` file.
    base_path: Option<std::path::PathBuf>,
}

impl ConfigParser {
    /// Creates a new spec parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path used to find `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a spec from a JSON or YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<AppSpec> {
        let path = path.as_ref();
        info!("Loading application spec from: {}", path.display());

        if !path.exists() {
            return Err(AmplistackError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AmplistackError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));

        if is_yaml {
            self.parse_yaml(&content, Some(path))
        } else {
            self.parse_json(&content, Some(path))
        }
    }

    /// Parses a spec from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn parse_json(&self, content: &str, source: Option<&Path>) -> Result<AppSpec> {
        debug!("Parsing JSON application spec");

        let spec: AppSpec = serde_json::from_str(content).map_err(|e| {
            AmplistackError::Config(ConfigError::ParseError {
                message: format!("JSON parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        debug!("Parsed spec for app: {}", spec.app_name);
        Ok(spec)
    }

    /// Parses a spec from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<AppSpec> {
        debug!("Parsing YAML application spec");

        let spec: AppSpec = serde_yaml::from_str(content).map_err(|e| {
            AmplistackError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        debug!("Parsed spec for app: {}", spec.app_name);
        Ok(spec)
    }

    /// Loads a spec and fills secrets from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<AppSpec> {
        let mut spec = self.load_file(path)?;
        Self::apply_env_overrides(&mut spec);
        Ok(spec)
    }

    /// Applies environment variable overrides to the spec.
    fn apply_env_overrides(spec: &mut AppSpec) {
        if spec.github_token.is_none()
            && let Ok(token) = std::env::var(GITHUB_TOKEN_VAR)
        {
            debug!("Using repository token from {GITHUB_TOKEN_VAR}");
            spec.github_token = Some(token);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                AmplistackError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Returns the repository token, from the spec or the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if neither source provides one.
    pub fn require_github_token(spec: &AppSpec) -> Result<String> {
        if let Some(token) = &spec.github_token {
            return Ok(token.clone());
        }
        std::env::var(GITHUB_TOKEN_VAR).map_err(|_| {
            AmplistackError::Config(ConfigError::MissingEnvVar {
                name: String::from(GITHUB_TOKEN_VAR),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_spec() {
        let json = r#"{
            "appName": "acme",
            "repositoryUrl": "https://github.com/acme/web",
            "alias": "acme"
        }"#;
        let parser = ConfigParser::new();
        let spec = parser.parse_json(json, None).expect("spec should parse");

        assert_eq!(spec.app_name, "acme");
        assert!(spec.environments.is_empty());
        assert!(spec.domain.is_none());
        assert!(spec.auth);
    }

    #[test]
    fn test_parse_full_yaml_spec() {
        let yaml = r"
appName: acme
repositoryUrl: https://github.com/acme/web
domain: acme.io
alias: acme-prod
defaultEnvironment: dev
environments:
  - environmentName: dev
    branch: develop
  - environmentName: prod
    branch: main
lambdas:
  - name: custom-message
    artifact: lambda/custom-message/build.zip
";
        let parser = ConfigParser::new();
        let spec = parser.parse_yaml(yaml, None).expect("spec should parse");

        assert_eq!(spec.alias, "acme-prod");
        assert_eq!(spec.environments.len(), 2);
        assert_eq!(spec.environments[1].branch, "main");
        assert_eq!(spec.lambdas.len(), 1);
        assert_eq!(spec.domain.as_deref(), Some("acme.io"));
    }

    #[test]
    fn test_load_file_by_extension() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("app.yaml");
        std::fs::write(
            &path,
            "appName: acme\nrepositoryUrl: https://github.com/acme/web\nalias: acme\n",
        )
        .expect("write spec");

        let spec = ConfigParser::new().load_file(&path).expect("load");
        assert_eq!(spec.app_name, "acme");
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigParser::new().load_file("/definitely/not/here.json");
        assert!(matches!(
            result,
            Err(AmplistackError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_parse_error_reports_location() {
        let result = ConfigParser::new().parse_json("{", Some(Path::new("app.json")));
        match result {
            Err(AmplistackError::Config(ConfigError::ParseError { location, .. })) => {
                assert_eq!(location.as_deref(), Some("app.json"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
