//! Polling primitive that blocks until a remote resource reaches a terminal
//! lifecycle state.
//!
//! The waiter knows nothing about pipeline steps; it only knows how to ask a
//! state accessor for a status string repeatedly. Callers enumerate the
//! states that mean "still converging" and name the single state that means
//! "done"; anything else observed is treated as the resource having diverged
//! into an error branch and fails immediately. The cadence is constant; there
//! is no backoff and no jitter, because each wait covers a single low-churn
//! resource.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poll cadence and retry budget for [`wait_for_state`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitPolicy {
    /// Fixed delay between consecutive polls.
    pub poll_interval: Duration,
    /// Maximum number of polls before giving up. Zero polls forever.
    pub max_retries: u32,
}

impl WaitPolicy {
    /// Creates a policy with the given interval and unlimited retries.
    #[must_use]
    pub const fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            max_retries: 0,
        }
    }

    /// Bounds the number of polls. Zero restores unlimited retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

/// Errors raised while waiting on a resource state transition.
#[derive(Debug, Error)]
pub enum WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the state accessor itself fails; never retried.
    #[error("failed to read state of resource {resource_id}: {source}")]
    Transport {
        /// Resource the poll ran against.
        resource_id: String,
        /// Error returned by the state accessor.
        #[source]
        source: E,
    },
    /// Raised when the resource settles in a state that is neither in the
    /// wait set nor the terminal state. Deliberately fatal: the wait set is
    /// trusted completely and anything outside it means the resource entered
    /// an error or unanticipated lifecycle branch.
    #[error(
        "resource {resource_id} entered unexpected state {state:?} while waiting \
         for one of {wait_states:?} or terminal state {terminal_state:?}"
    )]
    UnexpectedState {
        /// Resource the poll ran against.
        resource_id: String,
        /// State the resource reported.
        state: String,
        /// States the caller declared as still-converging.
        wait_states: Vec<String>,
        /// State the caller was waiting for.
        terminal_state: String,
    },
    /// Raised when a bounded policy runs out of polls before observing the
    /// terminal state.
    #[error("resource {resource_id} did not reach state {terminal_state:?} within {max_retries} polls")]
    RetriesExhausted {
        /// Resource the poll ran against.
        resource_id: String,
        /// State the caller was waiting for.
        terminal_state: String,
        /// Poll budget that was exhausted.
        max_retries: u32,
    },
}

/// Polls `fetch_state` until the resource reports `terminal_state`.
///
/// While the reported state is in `wait_states` the waiter sleeps for the
/// policy's interval and polls again, up to `max_retries` polls (zero meaning
/// unbounded). Accessor errors propagate immediately without a retry.
///
/// # Errors
///
/// Returns [`WaitError::Transport`] when the accessor fails,
/// [`WaitError::UnexpectedState`] when a state outside the declared set is
/// observed, and [`WaitError::RetriesExhausted`] when a bounded policy never
/// observes the terminal state.
pub async fn wait_for_state<E, F, Fut>(
    fetch_state: F,
    resource_id: &str,
    wait_states: &[&str],
    terminal_state: &str,
    policy: WaitPolicy,
) -> Result<(), WaitError<E>>
where
    E: std::error::Error + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<String, E>>,
{
    let mut polls = 0u32;
    loop {
        if policy.max_retries != 0 && polls >= policy.max_retries {
            return Err(WaitError::RetriesExhausted {
                resource_id: resource_id.to_owned(),
                terminal_state: terminal_state.to_owned(),
                max_retries: policy.max_retries,
            });
        }
        polls += 1;

        let state = fetch_state()
            .await
            .map_err(|source| WaitError::Transport {
                resource_id: resource_id.to_owned(),
                source,
            })?;

        if wait_states.contains(&state.as_str()) {
            sleep(policy.poll_interval).await;
            continue;
        }
        if state == terminal_state {
            return Ok(());
        }
        return Err(WaitError::UnexpectedState {
            resource_id: resource_id.to_owned(),
            state,
            wait_states: wait_states.iter().map(|name| (*name).to_owned()).collect(),
            terminal_state: terminal_state.to_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use thiserror::Error;

    #[derive(Clone, Debug, Error, Eq, PartialEq)]
    #[error("poll failed: {0}")]
    struct PollError(String);

    fn scripted(
        states: &[Result<&str, &str>],
    ) -> RefCell<VecDeque<Result<String, PollError>>> {
        RefCell::new(
            states
                .iter()
                .map(|entry| {
                    entry
                        .map(str::to_owned)
                        .map_err(|message| PollError(message.to_owned()))
                })
                .collect(),
        )
    }

    fn fast_policy() -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn terminal_state_on_first_poll_succeeds() {
        let responses = scripted(&[Ok("RUNNING")]);
        let fetch = || {
            let next = responses.borrow_mut().pop_front();
            async move { next.unwrap_or_else(|| Err(PollError(String::from("exhausted")))) }
        };

        let result =
            wait_for_state(fetch, "res-1", &["STARTING"], "RUNNING", fast_policy()).await;
        assert!(result.is_ok(), "unexpected outcome: {result:?}");
    }

    #[tokio::test]
    async fn accessor_error_propagates_without_retry() {
        let responses = scripted(&[Err("connection reset")]);
        let fetch = || {
            let next = responses.borrow_mut().pop_front();
            async move { next.unwrap_or_else(|| Err(PollError(String::from("exhausted")))) }
        };

        let result =
            wait_for_state(fetch, "res-1", &["STARTING"], "RUNNING", fast_policy()).await;
        assert!(
            matches!(result, Err(WaitError::Transport { ref source, .. }) if source.0 == "connection reset"),
            "unexpected outcome: {result:?}"
        );
    }
}
