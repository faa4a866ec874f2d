//! Bounded retry around a worker executor

use crate::crawler::DelayPolicy;
use crate::state::UnitState;
use crate::worker::protocol::{WorkerPayload, WorkerTask};
use crate::worker::{WorkerExecutor, WorkerFailure};

/// How often and how patiently a unit is retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: DelayPolicy,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: DelayPolicy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Terminal result of a unit
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    /// Payload of the successful attempt; `None` when exhausted
    pub payload: Option<WorkerPayload>,

    /// Number of attempts made
    pub attempts: u32,

    /// Terminal state of the unit
    pub state: UnitState,

    /// Failure of the last attempt, if it failed
    pub last_failure: Option<WorkerFailure>,
}

impl RetryOutcome {
    pub fn succeeded(&self) -> bool {
        self.state.is_success()
    }
}

/// Runs `task` until it succeeds or `policy.max_attempts` attempts failed
///
/// Each attempt gets a fresh worker from the executor; the only state carried
/// between attempts is the target and the attempt counter. The delay policy is
/// waited between attempts, not after the last one. Exhaustion is returned as
/// an outcome, never as an error.
pub async fn execute_with_retry(
    executor: &dyn WorkerExecutor,
    task: &WorkerTask,
    policy: &RetryPolicy,
) -> RetryOutcome {
    let mut state = UnitState::Pending;
    let mut attempts = 0;
    let mut last_failure = None;

    while attempts < policy.max_attempts {
        advance(&mut state, UnitState::Attempting);
        attempts += 1;
        tracing::debug!(
            "Attempt {}/{} for {} {}",
            attempts,
            policy.max_attempts,
            task.kind,
            task.target
        );

        let failure = match executor.execute(task).await {
            Ok(payload) if payload.answers(task.kind) => {
                advance(&mut state, UnitState::Succeeded);
                return RetryOutcome {
                    payload: Some(payload),
                    attempts,
                    state,
                    last_failure: None,
                };
            }
            Ok(_) => WorkerFailure::Protocol(format!(
                "payload does not match {} task",
                task.kind
            )),
            Err(failure) => failure,
        };

        tracing::warn!(
            "Attempt {}/{} failed for {}: {}",
            attempts,
            policy.max_attempts,
            task.target,
            failure
        );
        last_failure = Some(failure);

        if attempts < policy.max_attempts {
            policy.delay.wait().await;
        }
    }

    advance(&mut state, UnitState::Exhausted);
    tracing::error!(
        "Giving up on {} after {} attempts",
        task.target,
        attempts
    );

    RetryOutcome {
        payload: None,
        attempts,
        state,
        last_failure,
    }
}

fn advance(state: &mut UnitState, next: UnitState) {
    if let Err(e) = state.transition(next) {
        tracing::error!("Retry loop left its state machine: {}", e);
        *state = next;
    }
}
