//! Blocking-until-terminal stack operations.
//!
//! `StackClient` turns the fire-and-forget provider calls into operations
//! that only return once the stack has settled, and reads outputs only from
//! stacks that are in a readable state.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::api::CloudFormationApi;
use super::parameters::StackOutputs;
use super::poller::{PollSettings, Waiter, poll_until_terminal};
use super::types::{StackRequest, StackResult};
use crate::error::{Result, StackError};

/// Stack operations that wait for a terminal status.
#[derive(Debug)]
pub struct StackClient<A: ?Sized> {
    api: Arc<A>,
    poll: PollSettings,
}

impl<A: ?Sized> Clone for StackClient<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            poll: self.poll,
        }
    }
}

impl<A: CloudFormationApi + ?Sized> StackClient<A> {
    /// Creates a client over a provider.
    #[must_use]
    pub const fn new(api: Arc<A>, poll: PollSettings) -> Self {
        Self { api, poll }
    }

    /// Creates a stack and waits for `CREATE_COMPLETE`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected, the stack ends in any
    /// other terminal status, or the wait times out.
    #[instrument(skip(self, request), fields(stack = %request.name))]
    pub async fn create_stack(&self, request: &StackRequest) -> Result<StackResult> {
        info!("Creating stack");
        let stack_id = self.api.submit_create(request).await?;
        let description =
            poll_until_terminal(&*self.api, &request.name, Waiter::CreateComplete, &self.poll)
                .await?
                .ok_or_else(|| StackError::NotFound {
                    stack: request.name.clone(),
                })?;

        info!(stack_id = %stack_id, "Stack created");
        Ok(StackResult {
            stack_id,
            outputs: description.outputs,
            changed: true,
        })
    }

    /// Updates a stack and waits for `UPDATE_COMPLETE`.
    ///
    /// A provider "no updates" answer resolves to the current outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected, the stack ends in any
    /// other terminal status, or the wait times out.
    #[instrument(skip(self, request), fields(stack = %request.name))]
    pub async fn update_stack(&self, request: &StackRequest) -> Result<StackResult> {
        info!("Updating stack");
        match self.api.submit_update(request).await? {
            Some(_) => {
                let description = poll_until_terminal(
                    &*self.api,
                    &request.name,
                    Waiter::UpdateComplete,
                    &self.poll,
                )
                .await?
                .ok_or_else(|| StackError::NotFound {
                    stack: request.name.clone(),
                })?;

                info!("Stack updated");
                Ok(StackResult {
                    stack_id: description.stack_id,
                    outputs: description.outputs,
                    changed: true,
                })
            }
            None => {
                info!("Stack already up to date");
                let description = self.api.describe(&request.name).await?.ok_or_else(|| {
                    StackError::NotFound {
                        stack: request.name.clone(),
                    }
                })?;
                Ok(StackResult {
                    stack_id: description.stack_id,
                    outputs: description.outputs,
                    changed: false,
                })
            }
        }
    }

    /// Deletes a stack and waits until it is gone.
    ///
    /// Deleting a stack that does not exist succeeds without a request and
    /// returns `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails or times out.
    #[instrument(skip(self))]
    pub async fn delete_stack(&self, stack_name: &str) -> Result<bool> {
        if !self.exists(stack_name).await? {
            warn!("Stack does not exist, nothing to delete");
            return Ok(false);
        }

        info!("Deleting stack");
        self.api.submit_delete(stack_name).await?;
        poll_until_terminal(&*self.api, stack_name, Waiter::DeleteComplete, &self.poll).await?;
        info!("Stack deleted");
        Ok(true)
    }

    /// Reads the outputs of a settled stack.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the stack is missing and `InvalidState` unless it
    /// is `CREATE_COMPLETE`, `UPDATE_COMPLETE` or `UPDATE_ROLLBACK_COMPLETE`.
    pub async fn describe_outputs(&self, stack_name: &str) -> Result<StackOutputs> {
        let description =
            self.api
                .describe(stack_name)
                .await?
                .ok_or_else(|| StackError::NotFound {
                    stack: stack_name.to_string(),
                })?;

        if !description.status.outputs_readable() {
            return Err(StackError::InvalidState {
                stack: stack_name.to_string(),
                status: description.status.to_string(),
            }
            .into());
        }
        Ok(description.outputs)
    }

    /// Returns true if the stack exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the describe call fails.
    pub async fn exists(&self, stack_name: &str) -> Result<bool> {
        Ok(self.api.describe(stack_name).await?.is_some())
    }

    /// Returns the current status string of a stack, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the describe call fails.
    pub async fn status(&self, stack_name: &str) -> Result<Option<String>> {
        Ok(self
            .api
            .describe(stack_name)
            .await?
            .map(|d| d.status.to_string()))
    }
}
