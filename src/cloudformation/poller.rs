//! Waiting for stack operations to settle.

use std::time::Duration;
use tracing::{debug, info};

use super::api::CloudFormationApi;
use super::types::{StackDescription, StackPhase, StackStatus};
use crate::error::{Result, StackError};

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between describe calls.
    pub interval: Duration,
    /// Upper bound on the whole wait.
    pub timeout: Duration,
}

impl PollSettings {
    /// Creates poll settings.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Terminal condition being waited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waiter {
    /// Wait for `CREATE_COMPLETE`.
    CreateComplete,
    /// Wait for `UPDATE_COMPLETE`.
    UpdateComplete,
    /// Wait for `DELETE_COMPLETE` or the stack to disappear.
    DeleteComplete,
}

impl Waiter {
    /// Operation label used in errors and logs.
    #[must_use]
    pub const fn operation(self) -> &'static str {
        match self {
            Self::CreateComplete => "create",
            Self::UpdateComplete => "update",
            Self::DeleteComplete => "delete",
        }
    }

    const fn target(self) -> StackStatus {
        match self {
            Self::CreateComplete => StackStatus::CreateComplete,
            Self::UpdateComplete => StackStatus::UpdateComplete,
            Self::DeleteComplete => StackStatus::DeleteComplete,
        }
    }
}

enum Observation {
    Pending,
    Done(Option<StackDescription>),
}

fn observe(
    stack_name: &str,
    waiter: Waiter,
    description: Option<StackDescription>,
) -> Result<Observation> {
    let Some(description) = description else {
        return match waiter {
            Waiter::DeleteComplete => Ok(Observation::Done(None)),
            _ => Err(StackError::NotFound {
                stack: stack_name.to_string(),
            }
            .into()),
        };
    };

    if description.status == waiter.target() {
        return Ok(Observation::Done(Some(description)));
    }

    match description.status.phase() {
        StackPhase::InProgress => {
            debug!(stack = %stack_name, status = %description.status, "Still in progress");
            Ok(Observation::Pending)
        }
        _ => Err(StackError::OperationFailed {
            stack: stack_name.to_string(),
            operation: waiter.operation().to_string(),
            status: description.status.to_string(),
            reason: description
                .status_reason
                .unwrap_or_else(|| String::from("no reason given")),
        }
        .into()),
    }
}

/// Polls a stack until it reaches the waiter's terminal status.
///
/// Returns the final description, or `None` for a delete whose stack is gone.
///
/// # Errors
///
/// Returns `OperationFailed` on any other terminal status, `NotFound` if a
/// create or update target disappears, and `Timeout` once `settings.timeout`
/// has elapsed.
pub async fn poll_until_terminal<A: CloudFormationApi + ?Sized>(
    api: &A,
    stack_name: &str,
    waiter: Waiter,
    settings: &PollSettings,
) -> Result<Option<StackDescription>> {
    info!(stack = %stack_name, operation = waiter.operation(), "Waiting for stack");

    let poll = async {
        loop {
            let description = api.describe(stack_name).await?;
            if let Observation::Done(result) = observe(stack_name, waiter, description)? {
                return Ok(result);
            }
            tokio::time::sleep(settings.interval).await;
        }
    };

    match tokio::time::timeout(settings.timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(StackError::Timeout {
            stack: stack_name.to_string(),
            operation: waiter.operation().to_string(),
            waited_secs: settings.timeout.as_secs(),
        }
        .into()),
    }
}
