//! Parallel suite execution
//!
//! At most `parallel` suites run at once. Completed suites are published on
//! a channel in completion order; the receiver closes once every suite has
//! been published. A suite whose task panics is still published, with the
//! panic recorded as a failure.

use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info};

use super::{panic_message, StepError, SuiteRunner};
use crate::models::{TestSuite, Tests};
use crate::results::Aggregator;

/// Bounded-concurrency suite dispatcher
pub struct Scheduler {
    runner: Arc<SuiteRunner>,
    parallel: usize,
}

impl Scheduler {
    pub fn new(runner: Arc<SuiteRunner>, parallel: usize) -> Self {
        Self {
            runner,
            parallel: parallel.max(1),
        }
    }

    pub fn parallel(&self) -> usize {
        self.parallel
    }

    /// Start every suite and return the completion stream
    pub fn run(&self, suites: Vec<TestSuite>) -> mpsc::Receiver<TestSuite> {
        let (tx, rx) = mpsc::channel(self.parallel);
        let slots = Arc::new(Semaphore::new(self.parallel));
        let runner = self.runner.clone();
        let parallel = self.parallel;

        tokio::spawn(async move {
            info!(
                "Dispatching {} suite(s), {} at a time",
                suites.len(),
                parallel
            );
            let mut handles = Vec::with_capacity(suites.len());

            for (index, mut suite) in suites.into_iter().enumerate() {
                suite.discovery_index = index;

                let permit = match slots.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!("Admission pool closed: {}", e);
                        break;
                    }
                };
                debug!("Starting suite {} (#{})", suite.name, index);

                let runner = runner.clone();
                let tx = tx.clone();
                handles.push(tokio::spawn(async move {
                    let fallback = suite.clone();
                    let suite = match AssertUnwindSafe(runner.run_suite(suite))
                        .catch_unwind()
                        .await
                    {
                        Ok(suite) => suite,
                        Err(panic) => {
                            let message = panic_message(panic.as_ref());
                            error!("Suite {} panicked: {}", fallback.name, message);
                            fallback.abort(&StepError::Execution(format!(
                                "suite panicked: {message}"
                            )))
                        }
                    };
                    drop(permit);
                    if tx.send(suite).await.is_err() {
                        error!("Completion stream closed before suite was published");
                    }
                }));
            }
            drop(tx);

            for joined in join_all(handles).await {
                if let Err(e) = joined {
                    error!("Suite task failed: {}", e);
                }
            }
        });

        rx
    }

    /// Run every suite and aggregate the results
    pub async fn run_all(&self, suites: Vec<TestSuite>) -> Tests {
        let completed = self.run(suites);
        Aggregator::new().consume(completed).await
    }
}
