//! Retry, delay and timeout policy around one executor
//!
//! Every attempt moves `Pending -> Running -> Succeeded | Failed | TimedOut`.
//! A failed or timed-out attempt is retried after `delay` seconds while
//! retries remain. The reported duration is the sum of all attempt durations;
//! delays between attempts are not counted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn, Instrument, Span};

use super::{Executor, ExecutorResult, StepError};
use crate::assertions::AssertionEvaluator;
use crate::models::{Aliases, Step, StepPolicy};

/// State of a step attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl AttemptState {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptState::Succeeded)
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptState::Pending => write!(f, "pending"),
            AttemptState::Running => write!(f, "running"),
            AttemptState::Succeeded => write!(f, "succeeded"),
            AttemptState::Failed => write!(f, "failed"),
            AttemptState::TimedOut => write!(f, "timed out"),
        }
    }
}

/// One executor invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attempt {
    pub number: u32,
    pub state: AttemptState,
    pub duration: Duration,
}

/// Terminal outcome of a wrapped step
#[derive(Clone, Debug)]
pub struct StepOutcome {
    pub state: AttemptState,
    pub result: Option<ExecutorResult>,
    pub error: Option<StepError>,
    pub attempts: Vec<Attempt>,
    pub duration: Duration,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }
}

/// An executor bound to the retry/delay/timeout policy of one step
pub struct ExecutorWrap {
    name: String,
    executor: Arc<dyn Executor>,
    policy: StepPolicy,
    assertions: Vec<String>,
}

impl fmt::Debug for ExecutorWrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorWrap")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("assertions", &self.assertions)
            .finish_non_exhaustive()
    }
}

impl ExecutorWrap {
    pub fn new(name: impl Into<String>, executor: Arc<dyn Executor>, policy: StepPolicy) -> Self {
        Self {
            name: name.into(),
            executor,
            policy,
            assertions: Vec::new(),
        }
    }

    pub fn with_assertions(mut self, assertions: Vec<String>) -> Self {
        self.assertions = assertions;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn retry(&self) -> u32 {
        self.policy.retry
    }

    pub fn delay(&self) -> u64 {
        self.policy.delay
    }

    pub fn timeout(&self) -> u64 {
        self.policy.timeout
    }

    pub fn assertions(&self) -> &[String] {
        &self.assertions
    }

    /// Run the step until it succeeds or its retries are exhausted
    pub async fn run(
        &self,
        log: &Span,
        aliases: &Aliases,
        step: &Step,
        evaluator: &dyn AssertionEvaluator,
    ) -> StepOutcome {
        let mut remaining = self.policy.retry;
        let mut attempts = Vec::new();
        let mut total = Duration::ZERO;

        loop {
            let number = attempts.len() as u32 + 1;
            debug!(parent: log, "attempt {} ({})", number, AttemptState::Running);

            let start = Instant::now();
            let (state, result, error) = self.attempt(log, aliases, step, evaluator).await;
            let elapsed = start.elapsed();
            total += elapsed;

            attempts.push(Attempt {
                number,
                state,
                duration: elapsed,
            });

            let permanent = error.as_ref().map(StepError::is_permanent).unwrap_or(false);
            if state.is_success() || remaining == 0 || permanent {
                if !state.is_success() {
                    warn!(
                        parent: log,
                        "step {} after {} attempt(s): {}",
                        state,
                        number,
                        error.as_ref().map(ToString::to_string).unwrap_or_default()
                    );
                }
                return StepOutcome {
                    state,
                    result,
                    error,
                    attempts,
                    duration: total,
                };
            }

            remaining -= 1;
            debug!(
                parent: log,
                "attempt {} {}, retrying in {}s ({} left)", number, state, self.policy.delay, remaining
            );
            if self.policy.delay > 0 {
                sleep(Duration::from_secs(self.policy.delay)).await;
            }
        }
    }

    async fn attempt(
        &self,
        log: &Span,
        aliases: &Aliases,
        step: &Step,
        evaluator: &dyn AssertionEvaluator,
    ) -> (AttemptState, Option<ExecutorResult>, Option<StepError>) {
        let run = self.executor.run(log, aliases, step).instrument(log.clone());

        let outcome = if self.policy.timeout > 0 {
            match timeout(Duration::from_secs(self.policy.timeout), run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return (
                        AttemptState::TimedOut,
                        None,
                        Some(StepError::Timeout(self.policy.timeout)),
                    )
                }
            }
        } else {
            run.await
        };

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                // Executors surface decode problems as StepError::Decode
                let error = match e.downcast::<StepError>() {
                    Ok(step_error) => step_error,
                    Err(other) => StepError::Execution(format!("{other:#}")),
                };
                return (AttemptState::Failed, None, Some(error));
            }
        };

        let failed: Vec<String> = evaluator
            .evaluate(&result, &self.assertions)
            .into_iter()
            .filter(|a| !a.passed)
            .map(|a| a.message.unwrap_or(a.expression))
            .collect();

        if failed.is_empty() {
            (AttemptState::Succeeded, Some(result), None)
        } else {
            (
                AttemptState::Failed,
                Some(result),
                Some(StepError::Assertion(failed.join("; "))),
            )
        }
    }
}
