//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RunConfig;

/// Declarative integration test runner
#[derive(Parser, Debug)]
#[command(name = "itest")]
#[command(version = "0.1.0")]
#[command(about = "Run YAML-described integration test suites")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: ./itest.yaml, ./.itest.yaml, ~/.config/itest/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run test suites
    Run(RunArgs),

    /// List available executors
    List(ListArgs),
}

/// Arguments for run command
///
/// Options left unset fall back to the environment and the config file.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Suite files, directories or glob patterns (default: current directory)
    pub paths: Vec<String>,

    /// Template variable, key=value (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Read template variables from a .json or .yaml file
    #[arg(long, value_name = "FILE")]
    pub var_from_file: Option<PathBuf>,

    /// Command alias, name:replacement (repeatable)
    #[arg(long = "alias", value_name = "NAME:REPLACEMENT")]
    pub aliases: Vec<String>,

    /// Glob pattern of suite files to exclude (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Report format (xml, json, yaml, tap)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Do not expose environment variables to templates
    #[arg(long)]
    pub no_env: bool,

    /// Number of suites run at once
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Exit with status 2 if a test fails
    #[arg(long)]
    pub strict: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log")]
    pub log_level: Option<String>,

    /// Write the report into this directory instead of stdout
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Console details (low, medium, high)
    #[arg(long)]
    pub details: Option<String>,

    /// Print the one-line summary
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub resume: Option<bool>,

    /// Print one line per failed case
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub resume_failures: Option<bool>,

    /// Skip the remaining steps of a case after a failed step
    #[arg(long)]
    pub stop_on_failure: bool,

    /// Never colour console output
    #[arg(long)]
    pub no_color: bool,
}

impl RunArgs {
    /// Paths to scan, defaulting to the current directory
    pub fn paths(&self) -> Vec<String> {
        if self.paths.is_empty() {
            vec![".".to_string()]
        } else {
            self.paths.clone()
        }
    }

    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
        if let Some(ref level) = self.log_level {
            config.log_level = level.clone();
        }
        if let Some(ref details) = self.details {
            config.details = details.clone();
        }
        if let Some(ref format) = self.format {
            config.format = format.clone();
        }
        if let Some(ref dir) = self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(resume) = self.resume {
            config.resume = resume;
        }
        if let Some(resume_failures) = self.resume_failures {
            config.resume_failures = resume_failures;
        }
        if self.strict {
            config.strict = true;
        }
        if self.stop_on_failure {
            config.stop_on_failure = true;
        }
        if self.no_env {
            config.with_env = false;
        }
        config.exclude.extend(self.exclude.iter().cloned());
    }
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Show default assertions of each executor
    #[arg(short, long)]
    pub detailed: bool,
}
