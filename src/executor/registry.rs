//! Executor registry
//!
//! Built once before any suite starts and shared read-only afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{Executor, ExecutorWrap, StepError};
use crate::models::Step;

/// Name to executor lookup table
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: BTreeMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor; names are case-insensitive
    pub fn register(&mut self, name: &str, executor: impl Executor + 'static) {
        let name = name.to_lowercase();
        debug!("Registering executor {}", name);
        self.executors.insert(name, Arc::new(executor));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, name: &str, executor: impl Executor + 'static) -> Self {
        self.register(name, executor);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Executor>, StepError> {
        self.executors
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| StepError::ExecutorNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(&name.to_lowercase())
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.executors.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    /// Resolve the executor and policy for a step
    ///
    /// The policy is validated before the executor lookup, so a step with a
    /// bad `retry` is reported as a configuration error even if its type is
    /// also unknown.
    pub fn wrap(&self, step: &Step) -> Result<ExecutorWrap, StepError> {
        let policy = step.policy()?;
        let assertions = step.assertions()?;
        let name = step.executor_type()?;
        let executor = self.get(&name)?;

        let assertions = if assertions.is_empty() {
            executor.default_assertions()
        } else {
            assertions
        };

        Ok(ExecutorWrap::new(name, executor, policy).with_assertions(assertions))
    }
}
