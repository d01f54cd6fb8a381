//! Step-level errors
//!
//! None of these are fatal to the process. They are recorded on the case that
//! owns the step.

use thiserror::Error;

/// Errors raised while preparing or running a step
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("attribute {attribute} is invalid: {reason}")]
    Configuration { attribute: String, reason: String },

    #[error("type '{0}' is not implemented")]
    ExecutorNotFound(String),

    #[error("templating failed: {0}")]
    Templating(String),

    #[error("step does not match executor fields: {0}")]
    Decode(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("assertion failed: {0}")]
    Assertion(String),
}

impl StepError {
    /// Short category name used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::Configuration { .. } => "configuration",
            StepError::ExecutorNotFound(_) => "executor_not_found",
            StepError::Templating(_) => "templating",
            StepError::Decode(_) => "decode",
            StepError::Execution(_) => "execution",
            StepError::Timeout(_) => "timeout",
            StepError::Assertion(_) => "assertion",
        }
    }

    /// Errors that stop the whole suite instead of only the case
    pub fn is_suite_fatal(&self) -> bool {
        matches!(self, StepError::Configuration { .. })
    }

    /// Errors that another attempt cannot fix
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            StepError::Configuration { .. }
                | StepError::ExecutorNotFound(_)
                | StepError::Templating(_)
                | StepError::Decode(_)
        )
    }
}
