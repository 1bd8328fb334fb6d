//! Provider seam for stack operations.

use async_trait::async_trait;

use super::types::{StackDescription, StackRequest};
use crate::error::Result;

/// The raw stack provider calls the client is built on.
///
/// Implementations submit requests and describe stacks; they never wait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudFormationApi: Send + Sync {
    /// Submits a create request and returns the new stack id.
    async fn submit_create(&self, request: &StackRequest) -> Result<String>;

    /// Submits an update request.
    ///
    /// Returns `None` when the provider reports there is nothing to update.
    async fn submit_update(&self, request: &StackRequest) -> Result<Option<String>>;

    /// Submits a delete request.
    async fn submit_delete(&self, stack_name: &str) -> Result<()>;

    /// Describes a stack, returning `None` if it does not exist.
    async fn describe(&self, stack_name: &str) -> Result<Option<StackDescription>>;
}
