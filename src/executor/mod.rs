//! Test execution engine
//!
//! Provides the executor contract, the retry/timeout wrapper, the suite
//! runner and the bounded parallel scheduler.

#![allow(dead_code)]

mod error;
mod parallel;
mod registry;
mod runner;
mod wrap;

#[cfg(test)]
pub(crate) mod testing;

pub use error::StepError;
pub use parallel::Scheduler;
pub use registry::ExecutorRegistry;
pub use runner::{FailurePolicy, SuiteRunner};
pub use wrap::{Attempt, AttemptState, ExecutorWrap, StepOutcome};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::any::Any;
use tracing::Span;

use crate::models::{Aliases, Step};

/// Structured result of one executor invocation
///
/// Always a JSON object with lowercase keys so assertions can address
/// `result.<field>`.
pub type ExecutorResult = serde_json::Value;

/// A pluggable step executor
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one attempt of a step
    async fn run(&self, log: &Span, aliases: &Aliases, step: &Step) -> Result<ExecutorResult>;

    /// Assertions applied when the step declares none
    fn default_assertions(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Convert an executor's result struct into an [`ExecutorResult`]
pub fn to_result<T: Serialize>(result: &T) -> Result<ExecutorResult> {
    Ok(serde_json::to_value(result)?)
}

/// Text carried by a caught panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
