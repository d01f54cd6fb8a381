//! Run statistics
//!
//! The aggregator is the only writer of [`Tests`]. It drains the completion
//! stream on a single task, so no locking is involved.

use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::models::{TestSuite, Tests};

/// Single consumer turning completed suites into global totals
pub struct Aggregator {
    tests: Tests,
    start: Instant,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            tests: Tests::new(),
            start: Instant::now(),
        }
    }

    /// Account for one completed suite
    pub fn record(&mut self, suite: TestSuite) {
        let tests = &mut self.tests;

        if suite.failures > 0 {
            tests.total_ko += suite.failures;
        } else {
            tests.total_ok += suite.case_count() - suite.failures;
        }
        tests.total_skipped += suite.skipped;
        tests.total = tests.total_ok + tests.total_ko + tests.total_skipped;

        debug!(
            "Recorded suite {} - totals ok={} ko={} skipped={}",
            suite.name, tests.total_ok, tests.total_ko, tests.total_skipped
        );
        tests.test_suites.push(suite);
    }

    /// Drain the completion stream until every sender is gone
    pub async fn consume(mut self, mut completed: mpsc::Receiver<TestSuite>) -> Tests {
        while let Some(suite) = completed.recv().await {
            self.record(suite);
        }
        let tests = self.finish();
        info!(
            "Run completed in {}ms - Total: {} | OK: {} | KO: {} | Skipped: {}",
            tests.duration_ms, tests.total, tests.total_ok, tests.total_ko, tests.total_skipped
        );
        tests
    }

    pub fn finish(mut self) -> Tests {
        self.tests.duration_ms = self.start.elapsed().as_millis() as u64;
        self.tests
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}
