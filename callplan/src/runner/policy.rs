//! Per-test retry state machine.
//!
//! ```text
//! Pending --Start--> Running(0)
//! Running(n) --success--> Complete(n)
//! Running(n) --failure, n < max_retries--> Retry(n+1) --DelayElapsed--> Running(n+1)
//! Running(n) --failure, n == max_retries--> Failed(n)
//! ```
//!
//! Timeouts, agent errors and unsuccessful results are all failures.

use std::time::Duration;

use shared_types::AgentResult;

use crate::protocol::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestState {
    Pending,
    Running { attempt: u32 },
    Retry { attempt: u32 },
    Complete { attempt: u32 },
    Failed { attempt: u32 },
}

impl TestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TestState::Complete { .. } | TestState::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestEvent {
    Start,
    AttemptFinished { success: bool },
    DelayElapsed,
}

/// Outcome of a single attempt against the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(AgentResult),
    /// The agent ran but reported `success == false`.
    Unsuccessful(AgentResult),
    Timeout(Duration),
    Error(AgentError),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success(_))
    }

    pub fn into_result(self) -> AgentResult {
        match self {
            AttemptOutcome::Success(result) | AttemptOutcome::Unsuccessful(result) => result,
            AttemptOutcome::Timeout(limit) => AgentResult::failure(format!(
                "Test timed out after {} seconds",
                limit.as_secs_f64()
            )),
            AttemptOutcome::Error(e) => AgentResult::failure(format!("Test failed with error: {e}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Fixed pause before each retry.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Pure transition function. Events that do not apply to the current
    /// state leave it unchanged.
    pub fn transition(&self, state: TestState, event: TestEvent) -> TestState {
        match (state, event) {
            (TestState::Pending, TestEvent::Start) => TestState::Running { attempt: 0 },
            (TestState::Running { attempt }, TestEvent::AttemptFinished { success: true }) => {
                TestState::Complete { attempt }
            }
            (TestState::Running { attempt }, TestEvent::AttemptFinished { success: false }) => {
                if attempt < self.max_retries {
                    TestState::Retry {
                        attempt: attempt + 1,
                    }
                } else {
                    TestState::Failed { attempt }
                }
            }
            (TestState::Retry { attempt }, TestEvent::DelayElapsed) => {
                TestState::Running { attempt }
            }
            (state, _) => state,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
