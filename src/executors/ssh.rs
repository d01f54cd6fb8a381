//! Remote command executor
//!
//! Shells out to the system `ssh` client in batch mode, so key-based
//! authentication must already work non-interactively.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, Span};

use super::CommandResult;
use crate::executor::{to_result, Executor, ExecutorResult};
use crate::models::{Aliases, Step};
use crate::utils::timer::Timer;

pub const NAME: &str = "ssh";

/// Connect timeout handed to `ssh`, in seconds
const CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SshStep {
    host: String,
    command: String,

    /// Login user; the ssh client default applies when absent
    #[serde(default)]
    user: Option<String>,

    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    privatekey: Option<PathBuf>,
}

fn default_port() -> u16 {
    22
}

impl SshStep {
    /// Build ssh command arguments
    fn build_ssh_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={CONNECT_TIMEOUT_SECS}"),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-p".to_string(),
            self.port.to_string(),
        ];

        if let Some(ref key_path) = self.privatekey {
            args.push("-i".to_string());
            args.push(key_path.to_string_lossy().to_string());
        }

        args.push(match self.user {
            Some(ref user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        });
        args.push(self.command.clone());
        args
    }
}

/// Runs `command` on `host` over ssh
pub struct SshExecutor;

#[async_trait]
impl Executor for SshExecutor {
    async fn run(&self, log: &Span, _aliases: &Aliases, step: &Step) -> Result<ExecutorResult> {
        let ssh: SshStep = step.decode()?;
        debug!(parent: log, "Executing SSH command on {}: {}", ssh.host, ssh.command);

        let timer = Timer::start("ssh");
        let output = Command::new("ssh")
            .args(ssh.build_ssh_args())
            .kill_on_drop(true)
            .output()
            .await;

        let result = match output {
            Ok(output) => CommandResult::from_output(output),
            Err(e) => CommandResult {
                code: -1,
                err: Some(format!("Failed to execute SSH command: {e}")),
                ..Default::default()
            },
        };
        to_result(&result.timed(timer.stop())).context("encoding ssh result")
    }

    fn default_assertions(&self) -> Vec<String> {
        vec!["result.code ShouldEqual 0".to_string()]
    }
}
