//! Template variables and command aliases

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::models::Aliases;

/// Parse `key=value` pairs; entries without `=` are ignored
pub fn parse_variables<S: AsRef<str>>(entries: &[S]) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for entry in entries {
        match entry.as_ref().split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                vars.insert(key.to_string(), value.to_string());
            }
            _ => debug!("Ignoring variable without '=': {}", entry.as_ref()),
        }
    }
    vars
}

/// Every process environment variable as `KEY=value`
pub fn process_environment() -> Vec<String> {
    std::env::vars().map(|(k, v)| format!("{k}={v}")).collect()
}

/// Load a flat string map from a `.json` or `.yaml`/`.yml` file
pub fn load_var_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read variables file: {}", path.display()))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON variables: {}", path.display())),
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML variables: {}", path.display())),
        _ => bail!(
            "Unsupported variables file format: {} (expected .json or .yaml)",
            path.display()
        ),
    }
}

/// Parse `name:replacement` pairs; entries without `:` are ignored
pub fn compute_aliases<S: AsRef<str>>(entries: &[S]) -> Aliases {
    let mut aliases = Aliases::new();
    for entry in entries {
        match entry.as_ref().split_once(':') {
            Some((name, replacement)) if !name.trim().is_empty() => {
                aliases.insert(name.trim().to_string(), replacement.to_string());
            }
            _ => warn!("Ignoring alias without ':': {}", entry.as_ref()),
        }
    }
    aliases
}
