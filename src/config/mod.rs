//! Configuration module
//!
//! Run settings are layered: config file, then `ITEST_*` environment
//! variables, then command-line flags.

mod env;
mod file;
mod vars;

pub use env::EnvConfig;
pub use file::ConfigFile;
pub use vars::{compute_aliases, load_var_file, parse_variables, process_environment};

#[cfg(test)]
pub(crate) use env::EnvBuilder;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::{DetailsLevel, OutputFormat};

/// Settings of one `itest run`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum number of suites running at once
    pub parallel: usize,

    /// trace, debug, info, warn or error
    pub log_level: String,

    /// Console details: low, medium or high
    pub details: String,

    /// Report format: xml, json, yaml or tap
    pub format: String,

    /// Directory receiving the report file; stdout when unset
    pub output_dir: Option<PathBuf>,

    /// Exit with status 2 when a test fails
    pub strict: bool,

    /// Print the one-line summary
    pub resume: bool,

    /// Print one line per failed case
    pub resume_failures: bool,

    /// Skip the rest of a case after a failed step
    pub stop_on_failure: bool,

    /// Expose process environment variables to templates
    pub with_env: bool,

    /// Glob patterns of suite files to leave out
    pub exclude: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallel: 1,
            log_level: "warn".to_string(),
            details: "medium".to_string(),
            format: "xml".to_string(),
            output_dir: None,
            strict: false,
            resume: true,
            resume_failures: true,
            stop_on_failure: false,
            with_env: true,
            exclude: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn output_format(&self) -> Result<OutputFormat> {
        OutputFormat::from_str(&self.format).with_context(|| {
            format!(
                "Invalid format '{}'. Must be xml, json, yaml or tap",
                self.format
            )
        })
    }

    pub fn details_level(&self) -> Result<DetailsLevel> {
        DetailsLevel::from_str(&self.details).with_context(|| {
            format!(
                "Invalid details '{}'. Must be low, medium or high",
                self.details
            )
        })
    }
}

/// Check if file is YAML based on extension
pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
