//! Waiting on HCP.
//!
//! HCP mutations are asynchronous: they either return an operation id to poll
//! ([`operation`]) or leave an entity in a transitional state that eventually
//! settles ([`state`]). Both waiters share the polling loop in this module.
//!
//! Every wait is bound to a [`WaitContext`], which carries a deadline and a
//! cancellation token. Polls are strictly sequential. Cancellation races both
//! the in-flight request and the sleep between polls, so a cancelled wait
//! returns without issuing another request.

pub mod operation;
pub mod state;

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::HcpError;

pub use operation::{
    wait_for_operation, Operation, OperationSource, OperationState, OperationWaiter,
};
pub use state::{NotFoundPolicy, StateWaiter, Stateful, WaitOutcome};

/// Longest wait a context allows. Longer timeouts are clamped to this.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Deadline and cancellation for a single wait.
#[derive(Debug, Clone)]
pub struct WaitContext {
    deadline: Instant,
    cancel: CancellationToken,
}

impl WaitContext {
    /// A context that expires `timeout` from now, or [`MAX_TIMEOUT`] if shorter.
    pub fn with_timeout(timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now.checked_add(timeout.min(MAX_TIMEOUT)).unwrap_or(now);
        Self::with_deadline(deadline)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Tie this context to an outer cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// When the wait gives up.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// The cancellation token for this context.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run a single request bound to this context.
    ///
    /// If the context is cancelled or its deadline passes first, the request
    /// is dropped and [`HcpError::Cancelled`] or [`HcpError::OperationTimeout`]
    /// is returned.
    pub async fn run<T, Fut>(&self, action: &str, request: Fut) -> Result<T, HcpError>
    where
        Fut: Future<Output = Result<T, HcpError>>,
    {
        let started = Instant::now();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HcpError::Cancelled {
                action: action.to_string(),
            }),
            result = request => result,
            _ = sleep_until(self.deadline) => Err(HcpError::OperationTimeout {
                action: action.to_string(),
                elapsed: started.elapsed(),
            }),
        }
    }
}

/// Result of a single poll.
pub(crate) enum Poll<T> {
    /// Done; stop polling.
    Ready(T),
    /// Not yet; the string describes the observed state for logs.
    Pending(String),
}

/// Poll until `poll` is ready, fails, the deadline passes, or `ctx` is cancelled.
///
/// The first poll is immediate. Subsequent polls are `interval` apart, except
/// the last sleep is cut short so that one final poll happens at the deadline.
pub(crate) async fn poll_until<T, F, Fut>(
    ctx: &WaitContext,
    interval: Duration,
    action: &str,
    mut poll: F,
) -> Result<T, HcpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll<T>, HcpError>>,
{
    let started = Instant::now();
    let timed_out = || HcpError::OperationTimeout {
        action: action.to_string(),
        elapsed: started.elapsed(),
    };
    let cancelled = || HcpError::Cancelled {
        action: action.to_string(),
    };

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        let polled = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(cancelled()),
            result = poll() => result?,
            _ = sleep_until(ctx.deadline) => return Err(timed_out()),
        };

        match polled {
            Poll::Ready(value) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                debug!(action, attempt, elapsed_ms, "Wait complete");
                return Ok(value);
            },
            Poll::Pending(state) => {
                debug!(action, attempt, state = %state, "Still waiting");
            },
        }

        let now = Instant::now();
        if now >= ctx.deadline {
            return Err(timed_out());
        }
        let wake = (now + interval).min(ctx.deadline);

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(cancelled()),
            _ = sleep_until(wake) => {},
        }
    }
}
