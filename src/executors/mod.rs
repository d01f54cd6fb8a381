//! Built-in executors
//!
//! `exec` and `ssh` run commands, `readfile` reads local files and `http`
//! issues a single request.

mod exec;
mod http;
mod readfile;
mod ssh;

pub use exec::ExecExecutor;
pub use http::HttpExecutor;
pub use readfile::ReadFileExecutor;
pub use ssh::SshExecutor;

use serde::Serialize;
use std::time::Duration;

use crate::executor::ExecutorRegistry;
use crate::utils::timer::humanize;

/// Registry holding every built-in executor
pub fn builtin_registry() -> ExecutorRegistry {
    ExecutorRegistry::new()
        .with(exec::NAME, ExecExecutor)
        .with(readfile::NAME, ReadFileExecutor)
        .with(http::NAME, HttpExecutor)
        .with(ssh::NAME, SshExecutor)
}

/// Output of a local or remote command
#[derive(Clone, Debug, Default, Serialize)]
pub struct CommandResult {
    pub systemout: String,
    pub systemerr: String,
    pub code: i32,
    pub err: Option<String>,
    pub timeseconds: f64,
    pub timehuman: String,
}

impl CommandResult {
    fn from_output(output: std::process::Output) -> Self {
        Self {
            systemout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            systemerr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            code: output.status.code().unwrap_or(-1),
            ..Default::default()
        }
    }

    fn timed(mut self, elapsed: Duration) -> Self {
        self.timeseconds = elapsed.as_secs_f64();
        self.timehuman = humanize(elapsed);
        self
    }
}
