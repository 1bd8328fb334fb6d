//! Configuration module for the Amplistack provisioning system.
//!
//! This module handles everything that happens before the first remote call:
//! - Parsing the application spec (`app-params.json` or YAML)
//! - Validating it
//! - Template fingerprints
//! - Runtime settings (mirror root, templates, profile, polling)

mod spec;
mod parser;
mod validator;
mod hash;
mod settings;

pub use spec::{
    AppSpec, Capabilities, EnvironmentSpec, LambdaSpec, CUSTOM_MESSAGE_LAMBDA,
    CUSTOM_MESSAGE_PARAMETER_KEY,
};
pub use parser::{ConfigParser, GITHUB_TOKEN_VAR};
pub use validator::{ConfigValidator, ValidationResult};
pub use hash::TemplateHasher;
pub use settings::{
    Settings, DEFAULT_APPS_DIR, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PROFILE,
    DEFAULT_STACK_TIMEOUT_SECS, DEFAULT_TEMPLATES_DIR,
};
