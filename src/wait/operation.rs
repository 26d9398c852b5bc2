//! Long-running operation waiter.
//!
//! Mutating HCP calls return an [`Operation`]. The operation is only ever
//! observed by the client: [`OperationWaiter`] fetches it by id until it is
//! done, has failed, the deadline passes, or the context is cancelled.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::client::config::DEFAULT_POLL_INTERVAL;
use crate::client::HcpClient;
use crate::error::HcpError;
use crate::link::Location;
use crate::wait::{poll_until, Poll, WaitContext};

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
    /// Accepted but not started.
    #[default]
    Pending,
    /// In progress.
    Running,
    /// Finished. Check [`Operation::error`] for the outcome.
    Done,
    /// A state this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Error attached to a finished operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OperationError {
    /// Backend status code.
    #[serde(default)]
    pub code: i32,
    /// Human readable message, surfaced verbatim to the user.
    #[serde(default)]
    pub message: String,
}

/// An asynchronous backend task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Operation {
    /// Operation id.
    pub id: String,
    /// Current state.
    #[serde(default)]
    pub state: OperationState,
    /// Set when the operation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    /// Where the operation runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Operation {
    /// Whether the operation will not change state again.
    pub fn is_terminal(&self) -> bool {
        self.state == OperationState::Done || self.error.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OperationResponse {
    pub operation: Operation,
}

/// Anything that can fetch an operation by id.
#[async_trait::async_trait]
pub trait OperationSource: Send + Sync {
    /// Fetch the current view of an operation.
    async fn get_operation(&self, id: &str, location: &Location) -> Result<Operation, HcpError>;
}

#[async_trait::async_trait]
impl OperationSource for HcpClient {
    async fn get_operation(&self, id: &str, location: &Location) -> Result<Operation, HcpError> {
        let path = format!(
            "/operation/2020-05-05/organizations/{}/projects/{}/operations/{}",
            location.organization_id, location.project_id, id
        );
        let response: OperationResponse = self.get(&path).await?;
        Ok(response.operation)
    }
}

/// Polls an operation at a fixed interval until it reaches a terminal state.
#[derive(Debug, Clone, Copy)]
pub struct OperationWaiter {
    poll_interval: Duration,
}

impl Default for OperationWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl OperationWaiter {
    /// Create a waiter that polls every `poll_interval`.
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Block until operation `id` completes.
    ///
    /// - `Ok(operation)` once it is done without error.
    /// - [`HcpError::OperationFailed`] if it carries an error. Not retried.
    /// - [`HcpError::OperationTimeout`] if `ctx`'s deadline passes first.
    /// - [`HcpError::Cancelled`] if `ctx` is cancelled.
    #[instrument(skip(self, source, ctx, location), fields(operation_id = %id))]
    pub async fn wait<S>(
        &self,
        source: &S,
        ctx: &WaitContext,
        id: &str,
        location: &Location,
        action: &str,
    ) -> Result<Operation, HcpError>
    where
        S: OperationSource + ?Sized,
    {
        poll_until(ctx, self.poll_interval, action, move || async move {
            let operation = source.get_operation(id, location).await?;
            if let Some(err) = &operation.error {
                return Err(HcpError::OperationFailed {
                    action: action.to_string(),
                    message: err.message.clone(),
                });
            }
            match operation.state {
                OperationState::Done => Ok(Poll::Ready(operation)),
                state => Ok(Poll::Pending(format!("{:?}", state))),
            }
        })
        .await
    }
}

/// Wait for `operation` using the client's poll interval.
///
/// An operation that is already done is checked without another request.
pub async fn wait_for_operation(
    client: &HcpClient,
    ctx: &WaitContext,
    operation: &Operation,
    action: &str,
) -> Result<Operation, HcpError> {
    if let Some(err) = &operation.error {
        return Err(HcpError::OperationFailed {
            action: action.to_string(),
            message: err.message.clone(),
        });
    }
    if operation.state == OperationState::Done {
        return Ok(operation.clone());
    }

    let location = operation
        .location
        .clone()
        .unwrap_or_else(|| client.location().clone());
    let done = OperationWaiter::new(client.poll_interval())
        .wait(client, ctx, &operation.id, &location, action)
        .await?;
    info!(operation_id = %operation.id, action, "Operation complete");
    Ok(done)
}
