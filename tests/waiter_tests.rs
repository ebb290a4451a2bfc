//! Behavioural tests for the resource-state waiter.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use kiln::test_support::ScriptedDriverError;
use kiln::waiter::{WaitError, WaitPolicy, wait_for_state};

const WAIT_STATES: &[&str] = &["STARTING"];
const TERMINAL: &str = "RUNNING";

struct ScriptedStates {
    responses: RefCell<VecDeque<Result<String, ScriptedDriverError>>>,
    polls: Cell<u32>,
}

impl ScriptedStates {
    fn new(states: &[Result<&str, &str>]) -> Self {
        Self {
            responses: RefCell::new(
                states
                    .iter()
                    .map(|entry| {
                        entry
                            .map(str::to_owned)
                            .map_err(|message| ScriptedDriverError(message.to_owned()))
                    })
                    .collect(),
            ),
            polls: Cell::new(0),
        }
    }

    fn fetch(&self) -> impl Future<Output = Result<String, ScriptedDriverError>> {
        self.polls.set(self.polls.get() + 1);
        let next = self.responses.borrow_mut().pop_front();
        async move {
            next.unwrap_or_else(|| Err(ScriptedDriverError(String::from("script exhausted"))))
        }
    }

    fn polls(&self) -> u32 {
        self.polls.get()
    }
}

fn fast_policy() -> WaitPolicy {
    WaitPolicy::new(Duration::from_millis(1))
}

/// The waiter keeps polling through wait states and succeeds on the first
/// observation of the terminal state.
#[tokio::test]
async fn converges_after_wait_states() {
    let states = ScriptedStates::new(&[Ok("STARTING"), Ok("STARTING"), Ok("RUNNING")]);

    let result = wait_for_state(|| states.fetch(), "res-1", WAIT_STATES, TERMINAL, fast_policy())
        .await;

    assert!(result.is_ok(), "unexpected outcome: {result:?}");
    assert_eq!(states.polls(), 3, "expected exactly three polls");
}

/// A state outside the declared wait set is fatal on first sight: the
/// waiter fails closed instead of hoping the resource recovers.
#[tokio::test]
async fn fails_closed_on_divergent_state() {
    let states = ScriptedStates::new(&[Ok("STARTING"), Ok("FAULTED")]);

    let result = wait_for_state(|| states.fetch(), "res-1", WAIT_STATES, TERMINAL, fast_policy())
        .await;

    assert!(
        matches!(
            result,
            Err(WaitError::UnexpectedState { ref state, .. }) if state == "FAULTED"
        ),
        "unexpected outcome: {result:?}"
    );
    assert_eq!(states.polls(), 2, "divergence must not be retried");
}

/// A bounded policy gives up after exactly `max_retries` polls.
#[tokio::test]
async fn bounded_policy_exhausts_retries() {
    let states = ScriptedStates::new(&[Ok("STARTING"), Ok("STARTING"), Ok("STARTING")]);
    let policy = fast_policy().with_max_retries(2);

    let result = wait_for_state(|| states.fetch(), "res-1", WAIT_STATES, TERMINAL, policy).await;

    assert!(
        matches!(
            result,
            Err(WaitError::RetriesExhausted { max_retries: 2, .. })
        ),
        "unexpected outcome: {result:?}"
    );
    assert_eq!(states.polls(), 2, "expected the budget to cap the polls");
}

/// Accessor failures propagate immediately without another poll.
#[tokio::test]
async fn accessor_errors_are_not_retried() {
    let states = ScriptedStates::new(&[Ok("STARTING"), Err("connection reset")]);

    let result = wait_for_state(|| states.fetch(), "res-1", WAIT_STATES, TERMINAL, fast_policy())
        .await;

    assert!(
        matches!(result, Err(WaitError::Transport { .. })),
        "unexpected outcome: {result:?}"
    );
    assert_eq!(states.polls(), 2);
}

/// The unexpected-state message names the observed state and the states the
/// caller declared, so provisioning failures are diagnosable from the error
/// alone.
#[tokio::test]
async fn unexpected_state_error_is_descriptive() {
    let states = ScriptedStates::new(&[Ok("FAULTED")]);

    let err = wait_for_state(|| states.fetch(), "res-1", WAIT_STATES, TERMINAL, fast_policy())
        .await
        .expect_err("divergent state must error");

    let rendered = err.to_string();
    assert!(rendered.contains("FAULTED"), "rendered: {rendered}");
    assert!(rendered.contains("STARTING"), "rendered: {rendered}");
    assert!(rendered.contains("RUNNING"), "rendered: {rendered}");
}
