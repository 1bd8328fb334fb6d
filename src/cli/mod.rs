//! CLI module for the Amplistack provisioning tool.
//!
//! This module provides the command-line interface for creating, updating
//! and deleting Amplify applications.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
