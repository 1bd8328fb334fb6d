//! Amplistack CLI entrypoint.
//!
//! This is the main entrypoint for the amplistack command-line tool.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use amplistack_deploy::cli::{Cli, Commands, OutputFormat, OutputFormatter};
use amplistack_deploy::cloudformation::{AwsCloudFormation, StackClient};
use amplistack_deploy::config::{AppSpec, ConfigParser, ConfigValidator, Settings};
use amplistack_deploy::error::Result;
use amplistack_deploy::mirror::LocalMirrorStore;
use amplistack_deploy::orchestrator::{
    Orchestrator, TemplateSet, UpdateRequest, UpdateTarget, parse_override,
};
use amplistack_deploy::uploader::S3ArtifactStore;

use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

type AwsOrchestrator = Orchestrator<AwsCloudFormation, S3ArtifactStore, LocalMirrorStore>;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = e.kind(), "{e}");
            eprintln!("{}", formatter.format_error(e.kind(), &e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool, format: OutputFormat) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        OutputFormat::Json => builder.json().init(),
        OutputFormat::Text => builder.init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    ConfigParser::new().load_dotenv()?;
    let settings = cli.settings();

    match cli.command {
        Commands::Create { src, environment } => {
            cmd_create(&settings, &src, environment, formatter).await
        }
        Commands::Update {
            alias,
            target,
            environment,
            overrides,
        } => cmd_update(&settings, &alias, target, environment, &overrides, formatter).await,
        Commands::Delete { alias, yes } => cmd_delete(&settings, &alias, yes, formatter).await,
        Commands::Status { alias } => cmd_status(&settings, &alias, formatter).await,
        Commands::Validate { src, artifacts } => cmd_validate(&src, artifacts, formatter),
    }
}

/// Create every resource of an application.
async fn cmd_create(
    settings: &Settings,
    src: &Path,
    environment: Option<String>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut spec = load_spec(src)?;
    if environment.is_some() {
        spec.default_environment = environment;
    }
    info!("Creating {} ({} environment(s))", spec.app_name, spec.environments.len());

    let orchestrator = build_orchestrator(settings).await;
    let report = orchestrator.create(&spec).await?;
    println!("{}", formatter.format_report(&report));
    Ok(())
}

/// Update one stack of an application.
async fn cmd_update(
    settings: &Settings,
    alias: &str,
    target: UpdateTarget,
    environment: Option<String>,
    overrides: &[String],
    formatter: &OutputFormatter,
) -> Result<()> {
    let overrides = overrides
        .iter()
        .map(String::as_str)
        .map(parse_override)
        .collect::<Result<Vec<_>>>()?;

    let mut request = UpdateRequest::new(target).with_overrides(overrides);
    if let Some(environment) = environment {
        request = request.for_environment(environment);
    }

    let orchestrator = build_orchestrator(settings).await;
    let report = orchestrator.update(alias, &request).await?;
    println!("{}", formatter.format_report(&report));
    Ok(())
}

/// Delete every resource of an application.
async fn cmd_delete(
    settings: &Settings,
    alias: &str,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    if !auto_approve {
        eprint!("This deletes every stack of '{alias}' and empties its buckets. Type the alias to confirm: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != alias {
            eprintln!("Delete cancelled.");
            return Ok(());
        }
    }

    let orchestrator = build_orchestrator(settings).await;
    let report = orchestrator.delete(alias).await?;
    println!("{}", formatter.format_report(&report));
    Ok(())
}

/// Show the recorded topology and live stack status.
async fn cmd_status(settings: &Settings, alias: &str, formatter: &OutputFormatter) -> Result<()> {
    let orchestrator = build_orchestrator(settings).await;
    let status = orchestrator.status(alias).await?;
    println!("{}", formatter.format_status(&status));
    Ok(())
}

/// Validate a spec without touching anything.
fn cmd_validate(src: &Path, check_artifacts: bool, formatter: &OutputFormatter) -> Result<()> {
    let spec = load_spec(src)?;
    let result = ConfigValidator::new()
        .with_artifact_check(check_artifacts)
        .validate(&spec)?;
    println!("{}", formatter.format_validation(&spec, &result));
    Ok(())
}

/// Loads a spec, picking up a `.env` next to it.
fn load_spec(src: &Path) -> Result<AppSpec> {
    let base = src.parent().unwrap_or_else(|| Path::new("."));
    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;
    parser.load_with_env(src)
}

/// Wires the AWS-backed orchestrator for the configured profile and region.
async fn build_orchestrator(settings: &Settings) -> AwsOrchestrator {
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).profile_name(&settings.profile);
    if let Some(region) = &settings.region {
        loader = loader.region(Region::new(region.clone()));
    }
    let sdk_config = loader.load().await;
    debug!(
        profile = %settings.profile,
        region = ?sdk_config.region().map(ToString::to_string),
        "Loaded AWS configuration"
    );

    Orchestrator::new(
        StackClient::new(Arc::new(AwsCloudFormation::new(&sdk_config)), settings.poll),
        S3ArtifactStore::new(&sdk_config),
        LocalMirrorStore::new(&settings.apps_dir),
        TemplateSet::new(&settings.templates_dir),
    )
}
