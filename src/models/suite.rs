//! Suite, case and run result models
//!
//! Suites are decoded from YAML once and then only mutated by the task that
//! runs them. Result fields are skipped on deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::Step;
use crate::executor::{AttemptState, StepError};

/// Execution status of a test case
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    #[default]
    Pending,
    Pass,
    Fail,
    Skip,
}

impl CaseStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            CaseStatus::Pending => "…",
            CaseStatus::Pass => "✓",
            CaseStatus::Fail => "✗",
            CaseStatus::Skip => "○",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CaseStatus::Pass)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Pending => write!(f, "PENDING"),
            CaseStatus::Pass => write!(f, "PASS"),
            CaseStatus::Fail => write!(f, "FAIL"),
            CaseStatus::Skip => write!(f, "SKIP"),
        }
    }
}

/// Why a step failed
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Failure {
    pub step: usize,
    pub kind: String,
    pub message: String,
}

impl Failure {
    pub fn new(step: usize, error: &StepError) -> Self {
        Self {
            step,
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {}: [{}] {}", self.step, self.kind, self.message)
    }
}

/// Outcome of one executed step
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub executor: String,
    pub state: AttemptState,
    pub attempts: u32,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A named, ordered list of steps
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,

    #[serde(default)]
    pub skip: bool,

    #[serde(default)]
    pub steps: Vec<Step>,

    #[serde(default, skip_deserializing)]
    pub status: CaseStatus,

    #[serde(default, skip_deserializing)]
    pub passed: usize,

    #[serde(default, skip_deserializing)]
    pub failures: Vec<Failure>,

    #[serde(default, skip_deserializing)]
    pub results: Vec<StepResult>,

    #[serde(default, skip_deserializing)]
    pub duration_ms: u64,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == CaseStatus::Fail
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.name,
            self.duration_ms
        )?;
        if !self.failures.is_empty() {
            write!(f, " - {} failure(s)", self.failures.len())?;
        }
        Ok(())
    }
}

/// A test suite loaded from one file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestSuite {
    /// Falls back to the file stem when empty
    #[serde(default)]
    pub name: String,

    /// Suite-scoped templating values
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    #[serde(default, rename = "testcases")]
    pub test_cases: Vec<TestCase>,

    /// Number of failed cases
    #[serde(default, skip_deserializing)]
    pub failures: usize,

    /// Number of skipped cases
    #[serde(default, skip_deserializing)]
    pub skipped: usize,

    #[serde(default, skip_deserializing)]
    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none", skip_deserializing)]
    pub filename: Option<String>,

    #[serde(skip)]
    pub discovery_index: usize,
}

impl TestSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_case(mut self, case: TestCase) -> Self {
        self.test_cases.push(case);
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn case_count(&self) -> usize {
        self.test_cases.len()
    }

    pub fn is_all_passed(&self) -> bool {
        self.failures == 0
    }

    /// Recount failed and skipped cases from their status
    pub fn tally(&mut self) {
        self.failures = self.test_cases.iter().filter(|c| c.is_failed()).count();
        self.skipped = self
            .test_cases
            .iter()
            .filter(|c| c.status == CaseStatus::Skip)
            .count();
    }

    /// Fail the first case that has not run with `error`
    ///
    /// Used when the suite ended abnormally, so it is still reported as
    /// failed. A suite without a runnable case gets one named after it.
    pub fn abort(mut self, error: &StepError) -> Self {
        for case in self.test_cases.iter_mut().filter(|c| c.skip) {
            case.status = CaseStatus::Skip;
        }
        let pending = self
            .test_cases
            .iter()
            .position(|c| !c.skip && c.status == CaseStatus::Pending);
        let index = match pending {
            Some(index) => index,
            None => {
                self.test_cases.push(TestCase::new(self.name.clone()));
                self.test_cases.len() - 1
            }
        };

        let case = &mut self.test_cases[index];
        case.status = CaseStatus::Fail;
        case.failures.push(Failure::new(0, error));
        self.tally();
        self
    }
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Suite {}", self.name)?;
        for case in &self.test_cases {
            writeln!(f, "  {case}")?;
        }
        write!(
            f,
            "Cases: {} | Failures: {} | Skipped: {} | Duration: {}ms",
            self.case_count(),
            self.failures,
            self.skipped,
            self.duration_ms
        )
    }
}

/// Global result of a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tests {
    pub total: usize,
    pub total_ok: usize,
    pub total_ko: usize,
    pub total_skipped: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub test_suites: Vec<TestSuite>,
}

impl Tests {
    pub fn new() -> Self {
        Self {
            total: 0,
            total_ok: 0,
            total_ko: 0,
            total_skipped: 0,
            started_at: Utc::now(),
            duration_ms: 0,
            test_suites: Vec::new(),
        }
    }

    /// Restore discovery order; suites arrive in completion order
    pub fn sort_by_discovery(&mut self) {
        self.test_suites.sort_by_key(|s| s.discovery_index);
    }

    pub fn has_failures(&self) -> bool {
        self.total_ko > 0
    }
}

impl Default for Tests {
    fn default() -> Self {
        Self::new()
    }
}
