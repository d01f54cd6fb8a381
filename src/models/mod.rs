//! Data models for test suites and run results
//!
//! This module contains all data structures shared by the engine.

#![allow(dead_code)]

use std::collections::BTreeMap;

mod step;
mod suite;

pub use step::{Step, StepPolicy, DEFAULT_EXECUTOR, RESERVED_KEYS};
pub use suite::{CaseStatus, Failure, StepResult, TestCase, TestSuite, Tests};

/// Short-name substitutions, built once before any suite runs
pub type Aliases = BTreeMap<String, String>;
