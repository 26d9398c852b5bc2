//! State-transition waiter.
//!
//! Some HCP resources report progress through a `state` field instead of an
//! operation. [`StateWaiter`] re-fetches the entity until its state is one of
//! the targets, stopping early on a known failure state.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tracing::instrument;

use crate::client::config::DEFAULT_POLL_INTERVAL;
use crate::error::HcpError;
use crate::wait::{poll_until, Poll, WaitContext};

/// An entity with an observable lifecycle state.
pub trait Stateful {
    /// The state enum.
    type State: PartialEq + Debug + Clone;

    /// The entity's current state.
    fn state(&self) -> Self::State;
}

/// What to do when the entity returns 404 mid-wait.
///
/// Whether a vanished entity is good news depends on the lifecycle phase the
/// caller is waiting on, so the caller decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotFoundPolicy {
    /// Treat it as success, e.g. when waiting for deletion.
    Succeed,
    /// Fail with [`HcpError::NotFound`].
    #[default]
    Fail,
    /// Keep polling, e.g. right after create while reads are eventually consistent.
    Continue,
}

/// How a state wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T> {
    /// The entity reached a target state.
    Reached(T),
    /// The entity disappeared and the policy was [`NotFoundPolicy::Succeed`].
    Gone,
}

impl<T> WaitOutcome<T> {
    /// The entity, if it reached a target state.
    pub fn reached(self) -> Option<T> {
        match self {
            Self::Reached(value) => Some(value),
            Self::Gone => None,
        }
    }
}

/// Polls an entity until its state matches a target.
#[derive(Debug, Clone)]
pub struct StateWaiter<S> {
    targets: Vec<S>,
    failures: Vec<S>,
    poll_interval: Duration,
    not_found: NotFoundPolicy,
}

impl<S: PartialEq + Debug + Clone> StateWaiter<S> {
    /// Wait for any of `targets`.
    pub fn new(targets: impl IntoIterator<Item = S>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
            failures: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            not_found: NotFoundPolicy::default(),
        }
    }

    /// States that end the wait with an error.
    pub fn with_failures(mut self, failures: impl IntoIterator<Item = S>) -> Self {
        self.failures = failures.into_iter().collect();
        self
    }

    /// Change the interval between polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Change how a 404 is handled.
    pub fn with_not_found(mut self, policy: NotFoundPolicy) -> Self {
        self.not_found = policy;
        self
    }

    /// Poll `fetch` until the entity reaches a target state.
    ///
    /// Fails with [`HcpError::UnexpectedState`] as soon as a failure state is
    /// observed; failure states never resolve into success.
    #[instrument(skip(self, ctx, fetch), fields(targets = ?self.targets))]
    pub async fn wait<T, F, Fut>(
        &self,
        ctx: &WaitContext,
        action: &str,
        mut fetch: F,
    ) -> Result<WaitOutcome<T>, HcpError>
    where
        T: Stateful<State = S>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HcpError>>,
    {
        let targets = &self.targets;
        let failures = &self.failures;
        let not_found = self.not_found;

        poll_until(ctx, self.poll_interval, action, move || {
            let fetched = fetch();
            async move {
                let entity = match fetched.await {
                    Ok(entity) => entity,
                    Err(err) if err.is_not_found() => {
                        return match not_found {
                            NotFoundPolicy::Succeed => Ok(Poll::Ready(WaitOutcome::Gone)),
                            NotFoundPolicy::Fail => Err(err),
                            NotFoundPolicy::Continue => Ok(Poll::Pending("NOT_FOUND".to_string())),
                        };
                    },
                    Err(err) => return Err(err),
                };

                let state = entity.state();
                if targets.contains(&state) {
                    Ok(Poll::Ready(WaitOutcome::Reached(entity)))
                } else if failures.contains(&state) {
                    Err(HcpError::UnexpectedState {
                        action: action.to_string(),
                        state: format!("{:?}", state),
                    })
                } else {
                    Ok(Poll::Pending(format!("{:?}", state)))
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Phase {
        Creating,
        Active,
        Failed,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Thing(Phase);

    impl Stateful for Thing {
        type State = Phase;

        fn state(&self) -> Phase {
            self.0
        }
    }

    fn script(
        steps: Vec<Result<Phase, u16>>,
    ) -> (Mutex<VecDeque<Result<Phase, u16>>>, Mutex<u32>) {
        (Mutex::new(steps.into()), Mutex::new(0))
    }

    async fn next(
        steps: &Mutex<VecDeque<Result<Phase, u16>>>,
        calls: &Mutex<u32>,
    ) -> Result<Thing, HcpError> {
        *calls.lock().unwrap() += 1;
        let step = steps.lock().unwrap().pop_front().unwrap_or(Ok(Phase::Creating));
        match step {
            Ok(phase) => Ok(Thing(phase)),
            Err(404) => Err(HcpError::NotFound("thing".to_string())),
            Err(status) => Err(HcpError::Api {
                status,
                message: String::new(),
            }),
        }
    }

    fn waiter() -> StateWaiter<Phase> {
        StateWaiter::new([Phase::Active])
            .with_failures([Phase::Failed])
            .with_poll_interval(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_target() {
        let (steps, calls) = script(vec![
            Ok(Phase::Creating),
            Ok(Phase::Creating),
            Ok(Phase::Active),
        ]);
        let ctx = WaitContext::with_timeout(Duration::from_secs(60));
        let outcome = waiter()
            .wait(&ctx, "activate thing", || next(&steps, &calls))
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Reached(Thing(Phase::Active)));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_state_stops_early() {
        let (steps, calls) = script(vec![
            Ok(Phase::Creating),
            Ok(Phase::Failed),
            Ok(Phase::Active),
        ]);
        let ctx = WaitContext::with_timeout(Duration::from_secs(600));
        let started = tokio::time::Instant::now();
        let result = waiter()
            .wait(&ctx, "activate thing", || next(&steps, &calls))
            .await;
        match result {
            Err(HcpError::UnexpectedState { state, .. }) => assert_eq!(state, "Failed"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(*calls.lock().unwrap(), 2);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_policies() {
        let ctx = WaitContext::with_timeout(Duration::from_secs(60));

        let (steps, calls) = script(vec![Ok(Phase::Creating), Err(404)]);
        let outcome = waiter()
            .with_not_found(NotFoundPolicy::Succeed)
            .wait(&ctx, "delete thing", || next(&steps, &calls))
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Gone);
        assert_eq!(outcome.reached(), None);

        let (steps, calls) = script(vec![Err(404)]);
        let result = waiter()
            .wait(&ctx, "activate thing", || next(&steps, &calls))
            .await;
        assert!(result.unwrap_err().is_not_found());

        let (steps, calls) = script(vec![Err(404), Err(404), Ok(Phase::Active)]);
        let outcome = waiter()
            .with_not_found(NotFoundPolicy::Continue)
            .wait(&ctx, "activate thing", || next(&steps, &calls))
            .await
            .unwrap();
        assert!(matches!(outcome, WaitOutcome::Reached(_)));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_propagate() {
        let (steps, calls) = script(vec![Err(403)]);
        let ctx = WaitContext::with_timeout(Duration::from_secs(60));
        let result = waiter()
            .wait(&ctx, "activate thing", || next(&steps, &calls))
            .await;
        assert!(matches!(result, Err(HcpError::Api { status: 403, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_in_transitional_state() {
        let (steps, calls) = script(vec![]);
        let ctx = WaitContext::with_timeout(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        let result = waiter()
            .wait(&ctx, "activate thing", || next(&steps, &calls))
            .await;
        assert!(matches!(result, Err(HcpError::OperationTimeout { .. })));
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
