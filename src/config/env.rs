//! Environment variable configuration
//!
//! `ITEST_*` variables override the config file and are overridden by flags.

use std::env;
use std::path::PathBuf;

use super::RunConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ITEST";

/// Overrides read from the environment
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// ITEST_PARALLEL
    pub parallel: Option<usize>,
    /// ITEST_LOG
    pub log_level: Option<String>,
    /// ITEST_DETAILS
    pub details: Option<String>,
    /// ITEST_FORMAT
    pub format: Option<String>,
    /// ITEST_OUTPUT_DIR
    pub output_dir: Option<PathBuf>,
    /// ITEST_STRICT
    pub strict: Option<bool>,
    /// ITEST_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            parallel: get_env_parse("PARALLEL"),
            log_level: get_env("LOG"),
            details: get_env("DETAILS"),
            format: get_env("FORMAT"),
            output_dir: get_env("OUTPUT_DIR").map(PathBuf::from),
            strict: get_env_bool("STRICT"),
            config_file: get_env("CONFIG"),
        }
    }

    /// Overlay the variables that are set onto `config`
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
        if let Some(strict) = self.strict {
            config.strict = strict;
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables in tests
#[cfg(test)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Set `ITEST_<name>`
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Set an unprefixed variable
    pub fn raw(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((name.to_string(), value.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}
