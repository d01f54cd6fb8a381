//! Suite execution runner
//!
//! Runs the cases of one suite, and the steps of each case, strictly in
//! declaration order.

use futures::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, debug_span, error, info, info_span, Instrument};

use super::{panic_message, AttemptState, ExecutorRegistry, StepError, StepOutcome};
use crate::assertions::{AssertionEvaluator, Matcher};
use crate::models::{Aliases, CaseStatus, Failure, Step, StepResult, TestCase, TestSuite};
use crate::template::{flatten, Templater};

/// What happens to the rest of a case after one of its steps fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep running the remaining steps
    #[default]
    Continue,
    /// Skip the remaining steps of the case
    StopCase,
}

/// Whether the suite may carry on after a case
enum Flow {
    Continue,
    StopSuite,
}

/// Runs whole suites against a shared registry
pub struct SuiteRunner {
    registry: Arc<ExecutorRegistry>,
    aliases: Arc<Aliases>,
    variables: Arc<BTreeMap<String, String>>,
    evaluator: Arc<dyn AssertionEvaluator>,
    policy: FailurePolicy,
}

impl SuiteRunner {
    pub fn new(registry: Arc<ExecutorRegistry>) -> Self {
        Self {
            registry,
            aliases: Arc::new(Aliases::new()),
            variables: Arc::new(BTreeMap::new()),
            evaluator: Arc::new(Matcher),
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_aliases(mut self, aliases: Arc<Aliases>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Base templating values shared by every suite
    pub fn with_variables(mut self, variables: Arc<BTreeMap<String, String>>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn AssertionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Templater seeded with variables, aliases and suite vars, in that
    /// order of precedence (later wins)
    fn templater_for(&self, suite: &TestSuite) -> Templater {
        let mut templater = Templater::new(self.variables.as_ref().clone());
        templater.extend(self.aliases.iter().map(|(k, v)| (k.clone(), v.clone())));
        templater.extend(suite.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        templater
    }

    /// Run one suite to completion and hand it back with its counters filled
    pub async fn run_suite(&self, mut suite: TestSuite) -> TestSuite {
        let span = info_span!("suite", name = %suite.name);
        let start = Instant::now();
        let mut templater = self.templater_for(&suite);

        async {
            info!("Running suite {} ({} cases)", suite.name, suite.case_count());

            let mut stopped = false;
            for case in suite.test_cases.iter_mut() {
                if stopped {
                    break;
                }
                if case.skip {
                    case.status = CaseStatus::Skip;
                    continue;
                }
                if let Flow::StopSuite = self.run_case(case, &mut templater).await {
                    error!("Stopping suite {} after a configuration error", suite.name);
                    stopped = true;
                }
            }
        }
        .instrument(span)
        .await;

        suite.tally();
        suite.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Suite {} finished in {}ms - {} failure(s), {} skipped",
            suite.name, suite.duration_ms, suite.failures, suite.skipped
        );
        suite
    }

    async fn run_case(&self, case: &mut TestCase, templater: &mut Templater) -> Flow {
        let start = Instant::now();
        let mut flow = Flow::Continue;

        debug!("Running case {}", case.name);

        for index in 0..case.steps.len() {
            let outcome = self.run_step(case, index, templater).await;

            match outcome {
                Ok((executor, outcome)) => {
                    if let Some(result) = &outcome.result {
                        templater.add(&case.name, flatten("result", result));
                    }
                    let failed = !outcome.is_success();
                    record(case, index, executor, outcome);
                    if failed && self.policy == FailurePolicy::StopCase {
                        break;
                    }
                }
                Err((executor, err)) => {
                    let fatal = err.is_suite_fatal();
                    case.results.push(StepResult {
                        index,
                        executor,
                        state: AttemptState::Failed,
                        attempts: 0,
                        duration_ms: 0,
                        result: None,
                        error: Some(err.to_string()),
                    });
                    case.failures.push(Failure::new(index, &err));
                    if fatal {
                        flow = Flow::StopSuite;
                        break;
                    }
                    if self.policy == FailurePolicy::StopCase {
                        break;
                    }
                }
            }
        }

        case.status = if case.failures.is_empty() {
            CaseStatus::Pass
        } else {
            CaseStatus::Fail
        };
        case.duration_ms = start.elapsed().as_millis() as u64;
        debug!("  {}", case);

        flow
    }

    /// Template, wrap and run a single step
    ///
    /// Errors that happen before any attempt are returned with the executor
    /// name they were resolved against, if any. A panicking executor fails
    /// the step with an execution error.
    async fn run_step(
        &self,
        case: &TestCase,
        index: usize,
        templater: &Templater,
    ) -> Result<(String, StepOutcome), (String, StepError)> {
        let raw = &case.steps[index];
        let name_of = |step: &Step| step.executor_type().unwrap_or_default();

        let step = templater.apply(raw).map_err(|e| (name_of(raw), e))?;
        let wrap = self.registry.wrap(&step).map_err(|e| (name_of(&step), e))?;

        let span = debug_span!("step", case = %case.name, index, executor = %wrap.name());
        let attempt = wrap.run(&span, &self.aliases, &step, self.evaluator.as_ref());
        let outcome = AssertUnwindSafe(attempt)
            .catch_unwind()
            .await
            .map_err(|panic| {
                let message = panic_message(panic.as_ref());
                error!("Executor {} panicked: {}", wrap.name(), message);
                (
                    wrap.name().to_string(),
                    StepError::Execution(format!("executor panicked: {message}")),
                )
            })?;
        Ok((wrap.name().to_string(), outcome))
    }
}

fn record(case: &mut TestCase, index: usize, executor: String, outcome: StepOutcome) {
    if let Some(err) = &outcome.error {
        case.failures.push(Failure::new(index, err));
    } else {
        case.passed += 1;
    }

    case.results.push(StepResult {
        index,
        executor,
        state: outcome.state,
        attempts: outcome.attempt_count(),
        duration_ms: outcome.duration.as_millis() as u64,
        result: outcome.result,
        error: outcome.error.map(|e| e.to_string()),
    });
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::executor::testing::{EchoExecutor, PanickingExecutor, StaticExecutor};
    use serde_json::json;

    fn step(yaml: &str) -> Step {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn runner(registry: ExecutorRegistry) -> SuiteRunner {
        SuiteRunner::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_passing_suite() {
        let registry = ExecutorRegistry::new().with("exec", StaticExecutor::succeeding());
        let suite = TestSuite::new("ok")
            .with_case(TestCase::new("a").with_step(step("script: ls")))
            .with_case(TestCase::new("b").with_step(step("script: ls")));

        let suite = runner(registry).run_suite(suite).await;
        assert_eq!(suite.failures, 0);
        assert_eq!(suite.skipped, 0);
        assert!(suite.test_cases.iter().all(|c| c.status == CaseStatus::Pass));
        assert_eq!(suite.test_cases[0].passed, 1);
    }

    #[tokio::test]
    async fn test_failures_are_counted_per_case() {
        let registry = ExecutorRegistry::new()
            .with("exec", StaticExecutor::succeeding())
            .with("broken", StaticExecutor::failing("nope"));
        let suite = TestSuite::new("mixed")
            .with_case(
                TestCase::new("bad")
                    .with_step(step("type: broken"))
                    .with_step(step("type: broken")),
            )
            .with_case(TestCase::new("good").with_step(step("script: ls")));

        let suite = runner(registry).run_suite(suite).await;
        assert_eq!(suite.failures, 1);
        assert_eq!(suite.test_cases[0].failures.len(), 2);
        assert_eq!(suite.test_cases[1].status, CaseStatus::Pass);
    }

    #[tokio::test]
    async fn test_continue_policy_runs_remaining_steps() {
        let ok = StaticExecutor::succeeding();
        let calls = ok.calls();
        let registry = ExecutorRegistry::new()
            .with("exec", ok)
            .with("broken", StaticExecutor::failing("nope"));
        let suite = TestSuite::new("s").with_case(
            TestCase::new("c")
                .with_step(step("type: broken"))
                .with_step(step("script: ls")),
        );

        let suite = runner(registry).run_suite(suite).await;
        assert_eq!(calls.count(), 1);
        assert_eq!(suite.test_cases[0].results.len(), 2);
        assert_eq!(suite.test_cases[0].passed, 1);
        assert_eq!(suite.test_cases[0].status, CaseStatus::Fail);
    }

    #[tokio::test]
    async fn test_stop_case_policy_skips_remaining_steps() {
        let ok = StaticExecutor::succeeding();
        let calls = ok.calls();
        let registry = ExecutorRegistry::new()
            .with("exec", ok)
            .with("broken", StaticExecutor::failing("nope"));
        let suite = TestSuite::new("s")
            .with_case(
                TestCase::new("c")
                    .with_step(step("type: broken"))
                    .with_step(step("script: ls")),
            )
            .with_case(TestCase::new("next").with_step(step("script: ls")));

        let suite = runner(registry)
            .with_policy(FailurePolicy::StopCase)
            .run_suite(suite)
            .await;
        assert_eq!(suite.test_cases[0].results.len(), 1);
        // the following case still runs
        assert_eq!(calls.count(), 1);
        assert_eq!(suite.test_cases[1].status, CaseStatus::Pass);
    }

    #[tokio::test]
    async fn test_configuration_error_stops_suite() {
        let ok = StaticExecutor::succeeding();
        let calls = ok.calls();
        let registry = ExecutorRegistry::new().with("exec", ok);
        let suite = TestSuite::new("s")
            .with_case(TestCase::new("bad").with_step(step("retry: lots")))
            .with_case(TestCase::new("never").with_step(step("script: ls")));

        let suite = runner(registry).run_suite(suite).await;
        assert_eq!(calls.count(), 0);
        assert_eq!(suite.failures, 1);
        assert_eq!(suite.test_cases[0].failures[0].kind, "configuration");
        assert_eq!(suite.test_cases[1].status, CaseStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_executor_fails_step_only() {
        let registry = ExecutorRegistry::new().with("exec", StaticExecutor::succeeding());
        let suite = TestSuite::new("s")
            .with_case(TestCase::new("bogus").with_step(step("type: bogus")))
            .with_case(TestCase::new("fine").with_step(step("script: ls")));

        let suite = runner(registry).run_suite(suite).await;
        assert_eq!(suite.failures, 1);
        let failure = &suite.test_cases[0].failures[0];
        assert_eq!(failure.kind, "executor_not_found");
        assert_eq!(suite.test_cases[0].results[0].attempts, 0);
        assert_eq!(suite.test_cases[1].status, CaseStatus::Pass);
    }

    #[tokio::test]
    async fn test_panicking_executor_fails_its_step() {
        let ok = StaticExecutor::succeeding();
        let calls = ok.calls();
        let registry = ExecutorRegistry::new()
            .with("exec", ok)
            .with("boom", PanickingExecutor);
        let suite = TestSuite::new("s")
            .with_case(
                TestCase::new("crash")
                    .with_step(step("type: boom"))
                    .with_step(step("script: ls")),
            )
            .with_case(TestCase::new("after").with_step(step("script: ls")));

        let suite = runner(registry).run_suite(suite).await;
        assert_eq!(suite.failures, 1);
        let failure = &suite.test_cases[0].failures[0];
        assert_eq!(failure.kind, "execution");
        assert!(failure.message.contains("executor panicked: boom"));
        assert_eq!(calls.count(), 2);
        assert_eq!(suite.test_cases[1].status, CaseStatus::Pass);
    }

    #[tokio::test]
    async fn test_skipped_cases() {
        let registry = ExecutorRegistry::new().with("exec", StaticExecutor::succeeding());
        let suite = TestSuite::new("s")
            .with_case(TestCase::new("later").skipped().with_step(step("script: ls")))
            .with_case(TestCase::new("now").with_step(step("script: ls")));

        let suite = runner(registry).run_suite(suite).await;
        assert_eq!(suite.skipped, 1);
        assert_eq!(suite.failures, 0);
        assert!(suite.test_cases[0].results.is_empty());
    }

    #[tokio::test]
    async fn test_variables_and_captured_outputs() {
        let registry = ExecutorRegistry::new().with("echo", EchoExecutor);
        let variables: BTreeMap<_, _> = [("host".to_string(), "example.com".to_string())]
            .into_iter()
            .collect();
        let aliases: Aliases = [("greet".to_string(), "echo hello".to_string())]
            .into_iter()
            .collect();

        let suite = TestSuite::new("s").with_var("user", "alice").with_case(
            TestCase::new("login")
                .with_step(step("type: echo\ntoken: 'tok-{{.user}}'"))
                .with_step(step(
                    "type: echo\nurl: 'http://{{.host}}/{{.login.result.token}}'\ncmd: '{{.greet}}'",
                )),
        );

        let suite = runner(registry)
            .with_variables(Arc::new(variables))
            .with_aliases(Arc::new(aliases))
            .run_suite(suite)
            .await;

        let results = &suite.test_cases[0].results;
        assert_eq!(results[0].result, Some(json!({"token": "tok-alice"})));
        assert_eq!(
            results[1].result,
            Some(json!({"url": "http://example.com/tok-alice", "cmd": "echo hello"}))
        );
    }
}
