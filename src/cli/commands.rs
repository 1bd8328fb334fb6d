//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{
    DEFAULT_APPS_DIR, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PROFILE, DEFAULT_STACK_TIMEOUT_SECS,
    DEFAULT_TEMPLATES_DIR, Settings,
};
use crate::orchestrator::UpdateTarget;

/// Amplistack - Amplify app provisioning over CloudFormation.
#[derive(Parser, Debug)]
#[command(name = "amplistack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root directory of the local mirror.
    #[arg(long, global = true, env = "AMPLISTACK_APPS_DIR", default_value = DEFAULT_APPS_DIR)]
    pub apps_dir: PathBuf,

    /// Directory holding the stack templates.
    #[arg(long, global = true, env = "AMPLISTACK_TEMPLATES_DIR", default_value = DEFAULT_TEMPLATES_DIR)]
    pub templates_dir: PathBuf,

    /// AWS named profile.
    #[arg(long, global = true, env = "AWS_PROFILE", default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// AWS region (defaults to the profile's region).
    #[arg(long, global = true, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Seconds between stack status polls.
    #[arg(long, global = true, env = "AMPLISTACK_POLL_INTERVAL_SECS", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval: u64,

    /// Seconds before a stack operation is abandoned.
    #[arg(long, global = true, env = "AMPLISTACK_STACK_TIMEOUT_SECS", default_value_t = DEFAULT_STACK_TIMEOUT_SECS)]
    pub stack_timeout: u64,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create every resource of an application.
    Create {
        /// Path to the application spec (JSON or YAML).
        #[arg(short, long)]
        src: PathBuf,

        /// Default environment, overriding the spec.
        #[arg(short, long)]
        environment: Option<String>,
    },

    /// Update one stack of an existing application.
    Update {
        /// Application alias.
        #[arg(short, long)]
        alias: String,

        /// Stack to update.
        #[arg(value_parser = parse_target)]
        target: UpdateTarget,

        /// Environment for branch, backend and lambda updates.
        #[arg(short, long)]
        environment: Option<String>,

        /// Parameter override as KEY=VALUE (repeatable).
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// Delete every resource of an application.
    Delete {
        /// Application alias.
        #[arg(short, long)]
        alias: String,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the recorded topology and live stack status.
    Status {
        /// Application alias.
        #[arg(short, long)]
        alias: String,
    },

    /// Validate an application spec without touching anything.
    Validate {
        /// Path to the application spec (JSON or YAML).
        #[arg(short, long)]
        src: PathBuf,

        /// Also check that lambda artifacts exist.
        #[arg(long)]
        artifacts: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

fn parse_target(raw: &str) -> Result<UpdateTarget, String> {
    raw.parse().map_err(|e: crate::error::ConfigError| e.to_string())
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolves the runtime settings from flags and environment.
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            apps_dir: self.apps_dir.clone(),
            templates_dir: self.templates_dir.clone(),
            profile: self.profile.clone(),
            region: self.region.clone(),
            ..Settings::default()
        }
        .with_poll_secs(self.poll_interval, self.stack_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_update_command() {
        let cli = Cli::try_parse_from([
            "amplistack",
            "update",
            "--alias",
            "acme",
            "lambdas",
            "--environment",
            "dev",
            "--set",
            "A=1",
            "--set",
            "B=2",
        ])
        .expect("parse");

        match cli.command {
            Commands::Update {
                alias,
                target,
                environment,
                overrides,
            } => {
                assert_eq!(alias, "acme");
                assert_eq!(target, UpdateTarget::Lambdas);
                assert_eq!(environment.as_deref(), Some("dev"));
                assert_eq!(overrides, vec!["A=1", "B=2"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_target_rejected() {
        assert!(Cli::try_parse_from(["amplistack", "update", "--alias", "acme", "database"]).is_err());
    }

    #[test]
    fn test_settings_from_flags() {
        let cli = Cli::try_parse_from([
            "amplistack",
            "--apps-dir",
            "/tmp/apps",
            "--profile",
            "acme-admin",
            "--region",
            "us-east-2",
            "--poll-interval",
            "2",
            "--stack-timeout",
            "60",
            "status",
            "--alias",
            "acme",
        ])
        .expect("parse");

        let settings = cli.settings();
        assert_eq!(settings.apps_dir, PathBuf::from("/tmp/apps"));
        assert_eq!(settings.profile, "acme-admin");
        assert_eq!(settings.region.as_deref(), Some("us-east-2"));
        assert_eq!(settings.poll.interval, Duration::from_secs(2));
        assert_eq!(settings.poll.timeout, Duration::from_secs(60));
    }
}
