//! Suite discovery and decoding
//!
//! Paths given on the command line are either directories (every `*.yml` and
//! `*.yaml` file inside) or glob patterns.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::TestSuite;

const SUITE_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// Resolve paths and globs into a sorted, deduplicated list of suite files
pub fn discover(paths: &[String], exclude: &[String]) -> Result<Vec<PathBuf>> {
    let excluded = exclude
        .iter()
        .map(|p| glob::Pattern::new(p).with_context(|| format!("Invalid exclude pattern: {p}")))
        .collect::<Result<Vec<_>>>()?;

    let mut files = BTreeSet::new();
    for path in paths {
        for file in expand(path)? {
            if excluded.iter().any(|p| p.matches_path(&file)) {
                debug!("Excluding {}", file.display());
                continue;
            }
            files.insert(file);
        }
    }

    info!("Discovered {} suite file(s)", files.len());
    Ok(files.into_iter().collect())
}

fn expand(path: &str) -> Result<Vec<PathBuf>> {
    let dir = Path::new(path);
    if dir.is_dir() {
        let mut files = Vec::new();
        for entry in
            fs::read_dir(dir).with_context(|| format!("Failed to read directory: {path}"))?
        {
            let file = entry?.path();
            let is_suite = file
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| SUITE_EXTENSIONS.contains(&e))
                .unwrap_or(false);
            if file.is_file() && is_suite {
                files.push(file);
            }
        }
        return Ok(files);
    }

    let mut files = Vec::new();
    for entry in glob::glob(path).with_context(|| format!("Invalid path pattern: {path}"))? {
        let file = entry.with_context(|| format!("Failed to read path: {path}"))?;
        if file.is_file() {
            files.push(file);
        }
    }
    Ok(files)
}

/// Decode one suite file
pub fn load_suite(path: &Path) -> Result<TestSuite> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read suite file: {}", path.display()))?;
    let mut suite: TestSuite = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse suite file: {}", path.display()))?;

    if suite.name.trim().is_empty() {
        suite.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
    }
    suite.filename = Some(path.display().to_string());
    Ok(suite)
}

/// Decode every file, in the given order
pub fn load_suites(files: &[PathBuf]) -> Result<Vec<TestSuite>> {
    files.iter().map(|f| load_suite(f)).collect()
}
