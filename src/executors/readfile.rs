//! Local file reader

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, Span};

use crate::executor::{to_result, Executor, ExecutorResult};
use crate::models::{Aliases, Step};
use crate::utils::timer::{humanize, Timer};

pub const NAME: &str = "readfile";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadFileStep {
    path: String,
}

#[derive(Debug, Default, Serialize)]
struct ReadFileResult {
    content: String,
    err: Option<String>,
    timeseconds: f64,
    timehuman: String,
}

/// Concatenates the files matched by `path`
///
/// A directory stands for the `*.yml` files it contains.
pub struct ReadFileExecutor;

#[async_trait]
impl Executor for ReadFileExecutor {
    async fn run(&self, log: &Span, _aliases: &Aliases, step: &Step) -> Result<ExecutorResult> {
        let ReadFileStep { path } = step.decode()?;
        if path.trim().is_empty() {
            bail!("invalid path");
        }

        let timer = Timer::start("readfile");
        let mut result = ReadFileResult::default();
        match read_matching(log, &path).await {
            Ok(content) => result.content = content,
            Err(e) => result.err = Some(format!("{e:#}")),
        }

        let elapsed = timer.stop();
        result.timeseconds = elapsed.as_secs_f64();
        result.timehuman = humanize(elapsed);
        to_result(&result)
    }

    fn default_assertions(&self) -> Vec<String> {
        vec!["result.err ShouldNotExist".to_string()]
    }
}

async fn read_matching(log: &Span, path: &str) -> Result<String> {
    let (span, path) = (log.clone(), path.to_string());
    let files = tokio::task::spawn_blocking(move || matching_files(&span, &path))
        .await
        .context("file lookup task failed")??;

    let mut content = String::new();
    for file in files {
        debug!(parent: log, "read {}", file.display());
        let data = tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;
        content.push_str(&data);
    }
    Ok(content)
}

/// Sorted files matched by `path`; a directory means its `*.yml` files
fn matching_files(log: &Span, path: &str) -> Result<Vec<PathBuf>> {
    let pattern = if Path::new(path).is_dir() {
        format!("{}/*.yml", path.trim_end_matches('/'))
    } else {
        path.to_string()
    };
    debug!(parent: log, "readfile pattern: {}", pattern);

    let mut files = Vec::new();
    for entry in glob::glob(&pattern).with_context(|| format!("bad pattern {pattern}"))? {
        files.push(entry.with_context(|| format!("reading files on path {pattern}"))?);
    }
    files.sort();
    Ok(files)
}
