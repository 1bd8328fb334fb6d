//! Stack operations against AWS CloudFormation.
//!
//! This module provides:
//! - The raw provider seam (`CloudFormationApi`) and its AWS implementation
//! - The single wait primitive shared by create, update and delete
//! - `StackClient`, which only returns once a stack has settled
//! - Parameter binding and key-indexed output extraction

mod api;
mod aws;
mod client;
mod parameters;
mod poller;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use api::CloudFormationApi;
#[cfg(test)]
pub use api::MockCloudFormationApi;
pub use aws::AwsCloudFormation;
pub use client::StackClient;
pub use parameters::{
    Parameter, ParameterBinder, ParameterSpec, ParameterValue, StackOperation, StackOutputs,
};
pub use poller::{PollSettings, Waiter, poll_until_terminal};
pub use types::{
    Capability, StackDescription, StackPhase, StackRequest, StackResult, StackStatus, Tag,
};
