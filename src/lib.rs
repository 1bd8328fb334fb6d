// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items should be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Amplistack Deploy
//!
//! Sequenced `CloudFormation` provisioning for multi-environment Amplify
//! applications.
//!
//! ## Overview
//!
//! An application is a hosting app, one branch and one backend per
//! environment, optional nested auth and lambda resources, and an optional
//! custom domain. Amplistack creates, updates and tears these down as
//! `CloudFormation` stacks, in dependency order:
//!
//! - Every stack operation is awaited until the stack settles
//! - Outputs of finished stacks become parameters of dependent ones
//! - A local mirror of the provisioned topology is saved after every stage
//!
//! ## Architecture
//!
//! 1. **Spec**: `app-params.json` (or YAML) describing the app
//! 2. **Orchestrator**: sequences stack, artifact and mirror operations
//! 3. **Mirror**: `<apps_dir>/<alias>/` JSON files consumed by the front end
//!
//! ## Modules
//!
//! - [`config`]: Spec parsing, validation and runtime settings
//! - [`cloudformation`]: Stack client, wait primitive and parameter binding
//! - [`uploader`]: Deployment bucket artifacts (S3)
//! - [`mirror`]: Local state mirror
//! - [`orchestrator`]: Create, update and delete workflows
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```json
//! {
//!   "appName": "acme",
//!   "repositoryUrl": "https://github.com/acme/web",
//!   "domain": "acme.io",
//!   "alias": "acme",
//!   "defaultEnvironment": "dev",
//!   "environments": [{ "environmentName": "dev", "branch": "develop" }],
//!   "lambdas": [{ "name": "custom-message", "artifact": "lambda/custom-message/build.zip" }]
//! }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod cloudformation;
pub mod config;
pub mod error;
pub mod mirror;
pub mod orchestrator;
pub mod uploader;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use cloudformation::{AwsCloudFormation, CloudFormationApi, ParameterBinder, StackClient};
pub use config::{AppSpec, ConfigParser, ConfigValidator, Settings, TemplateHasher};
pub use error::{AmplistackError, Result};
pub use mirror::{AppTopology, LocalMirrorStore, MirrorStore};
pub use orchestrator::{Orchestrator, UpdateRequest, UpdateTarget, WorkflowReport};
pub use uploader::{ArtifactStore, S3ArtifactStore};
