//! Mock executors for engine tests

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::Span;

use super::{Executor, ExecutorResult, StepError};
use crate::models::{Aliases, Step};

/// Shared record of invocation instants
#[derive(Clone, Default)]
pub struct CallLog {
    times: Arc<Mutex<Vec<Instant>>>,
}

impl CallLog {
    fn record(&self) -> usize {
        let mut times = self.times.lock().unwrap();
        times.push(Instant::now());
        times.len()
    }

    pub fn count(&self) -> usize {
        self.times.lock().unwrap().len()
    }

    pub fn times(&self) -> Vec<Instant> {
        self.times.lock().unwrap().clone()
    }
}

/// Tracks how many invocations overlap
#[derive(Clone, Default)]
pub struct Gauge {
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Gauge {
    fn enter(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

enum Behavior {
    Return(Value),
    Fail(String),
    Flaky(usize),
    Decode,
}

/// Executor with a fixed behaviour
pub struct StaticExecutor {
    behavior: Behavior,
    defaults: Vec<String>,
    calls: CallLog,
}

impl StaticExecutor {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            defaults: Vec::new(),
            calls: CallLog::default(),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Behavior::Return(json!({"code": 0})))
    }

    pub fn returning(value: Value) -> Self {
        Self::new(Behavior::Return(value))
    }

    pub fn failing(message: &str) -> Self {
        Self::new(Behavior::Fail(message.to_string()))
    }

    /// Fails the first `failures` calls, then succeeds
    pub fn flaky(failures: usize) -> Self {
        Self::new(Behavior::Flaky(failures))
    }

    pub fn decode_error() -> Self {
        Self::new(Behavior::Decode)
    }

    pub fn with_defaults(mut self, assertions: &[&str]) -> Self {
        self.defaults = assertions.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl Executor for StaticExecutor {
    async fn run(&self, _log: &Span, _aliases: &Aliases, _step: &Step) -> Result<ExecutorResult> {
        let call = self.calls.record();
        match &self.behavior {
            Behavior::Return(value) => Ok(value.clone()),
            Behavior::Fail(message) => Err(anyhow!("{message}")),
            Behavior::Flaky(failures) if call <= *failures => Err(anyhow!("flaky call {call}")),
            Behavior::Flaky(_) => Ok(json!({"code": 0})),
            Behavior::Decode => Err(StepError::Decode("unknown field `scirpt`".into()).into()),
        }
    }

    fn default_assertions(&self) -> Vec<String> {
        self.defaults.clone()
    }
}

/// Executor that sleeps before answering
pub struct SlowExecutor {
    delay: Duration,
    fail: bool,
    calls: CallLog,
    gauge: Gauge,
}

impl SlowExecutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            fail: false,
            calls: CallLog::default(),
            gauge: Gauge::default(),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    pub fn gauge(&self) -> Gauge {
        self.gauge.clone()
    }
}

#[async_trait]
impl Executor for SlowExecutor {
    async fn run(&self, _log: &Span, _aliases: &Aliases, _step: &Step) -> Result<ExecutorResult> {
        self.calls.record();
        self.gauge.enter();
        sleep(self.delay).await;
        self.gauge.exit();

        if self.fail {
            Err(anyhow!("slow failure"))
        } else {
            Ok(json!({"code": 0}))
        }
    }
}

/// Returns the executor fields of the step it receives
pub struct EchoExecutor;

#[async_trait]
impl Executor for EchoExecutor {
    async fn run(&self, _log: &Span, _aliases: &Aliases, step: &Step) -> Result<ExecutorResult> {
        Ok(serde_json::to_value(step.executor_fields())?)
    }
}

/// Executor whose every call panics
pub struct PanickingExecutor;

#[async_trait]
impl Executor for PanickingExecutor {
    async fn run(&self, _log: &Span, _aliases: &Aliases, _step: &Step) -> Result<ExecutorResult> {
        panic!("boom")
    }
}
