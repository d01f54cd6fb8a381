//! Local shell executor

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, Span};

use super::CommandResult;
use crate::executor::{to_result, Executor, ExecutorResult};
use crate::models::{Aliases, Step};
use crate::utils::timer::Timer;

pub const NAME: &str = "exec";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecStep {
    script: String,
}

/// Runs `script` with `sh -c`
pub struct ExecExecutor;

#[async_trait]
impl Executor for ExecExecutor {
    async fn run(&self, log: &Span, aliases: &Aliases, step: &Step) -> Result<ExecutorResult> {
        let ExecStep { script } = step.decode()?;
        let script = expand_alias(&script, aliases);
        debug!(parent: log, "exec: {}", script);

        let timer = Timer::start("exec");
        let output = Command::new("sh")
            .arg("-c")
            .arg(&script)
            .kill_on_drop(true)
            .output()
            .await;

        let result = match output {
            Ok(output) => CommandResult::from_output(output),
            Err(e) => CommandResult {
                code: -1,
                err: Some(format!("unable to spawn sh: {e}")),
                ..Default::default()
            },
        };
        to_result(&result.timed(timer.stop())).context("encoding exec result")
    }

    fn default_assertions(&self) -> Vec<String> {
        vec!["result.code ShouldEqual 0".to_string()]
    }
}

/// Replace the longest alias that prefixes the script
pub fn expand_alias(script: &str, aliases: &Aliases) -> String {
    let matched = aliases
        .iter()
        .filter(|(name, _)| {
            script
                .strip_prefix(name.as_str())
                .map(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
                .unwrap_or(false)
        })
        .max_by_key(|(name, _)| name.len());

    match matched {
        Some((name, replacement)) => format!("{}{}", replacement, &script[name.len()..]),
        None => script.to_string(),
    }
}
