//! itest - declarative integration test runner
//!
//! Loads YAML test suites, runs their steps through pluggable executors with
//! per-step retry, delay and timeout, runs suites concurrently up to a bound
//! and reports aggregate results.
//!
//! ## Usage
//!
//! ```bash
//! # Run every suite in a directory, four at a time
//! itest run tests/ --parallel 4
//!
//! # Pass variables and write a JUnit report
//! itest run "suites/*.yml" --var host=localhost --output-dir reports
//!
//! # Fail the build when a test fails
//! itest run tests/ --strict --format tap
//!
//! # List executors and their default assertions
//! itest list --detailed
//! ```

use anyhow::Result;
use clap::Parser;
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{debug, info};

mod assertions;
mod cli;
mod config;
mod executor;
mod executors;
mod loader;
mod models;
mod output;
mod results;
mod template;
mod utils;

use cli::{Args, ListArgs, RunArgs};
use config::{ConfigFile, EnvConfig, RunConfig};
use executor::{FailurePolicy, Scheduler, SuiteRunner};
use models::{Aliases, Tests};
use output::{resume_failures, resume_line, ResultFormatter};
use utils::logger::{init_logger, LogLevel};

/// Exit status when `--strict` is set and a test failed
const STRICT_FAILURE_EXIT_CODE: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let file = match args.config.as_ref().map(|p| p.to_string_lossy().to_string()) {
        Some(path) => ConfigFile::load(path)?,
        None => match env.config_file {
            Some(ref path) => ConfigFile::load(path)?,
            None => ConfigFile::load_default()?,
        },
    };

    match args.command {
        cli::Command::Run(run_args) => {
            let code = run_suites(file, &env, run_args).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        cli::Command::List(list_args) => {
            init_logger(LogLevel::default());
            list_executors(list_args);
        }
    }

    Ok(())
}

async fn run_suites(file: ConfigFile, env: &EnvConfig, args: RunArgs) -> Result<i32> {
    let mut config = file.run.clone();
    env.apply(&mut config);
    args.apply(&mut config);

    init_logger(LogLevel::from_str(&config.log_level).unwrap_or_default());
    let format = config.output_format()?;
    let details = config.details_level()?;
    debug!("Run configuration: {:?}", config);

    let variables = resolve_variables(&file, &config, &args)?;
    let aliases = resolve_aliases(&file, &args);

    let files = loader::discover(&args.paths(), &config.exclude)?;
    let suites = loader::load_suites(&files)?;

    let policy = if config.stop_on_failure {
        FailurePolicy::StopCase
    } else {
        FailurePolicy::Continue
    };
    let runner = SuiteRunner::new(Arc::new(executors::builtin_registry()))
        .with_aliases(Arc::new(aliases))
        .with_variables(Arc::new(variables))
        .with_policy(policy);

    let scheduler = Scheduler::new(Arc::new(runner), config.parallel);
    let mut tests = scheduler.run_all(suites).await;
    tests.sort_by_discovery();

    // Keep stdout clean for the report when it is printed there
    let console_on_stdout = config.output_dir.is_some();
    let mut formatter = ResultFormatter::new(format);
    if !use_color(args.no_color, console_on_stdout) {
        formatter = formatter.no_color();
    }
    formatter.write_report(&tests, config.output_dir.as_deref())?;

    let console = |line: &str| {
        if console_on_stdout {
            println!("{line}");
        } else {
            eprintln!("{line}");
        }
    };
    for line in formatter.console_lines(&tests, details) {
        console(&line);
    }
    if config.resume_failures {
        for line in resume_failures(&tests) {
            console(&line);
        }
    }
    if config.resume {
        console(&resume_line(&tests));
    }

    info!("Finished in {}ms", tests.duration_ms);
    Ok(exit_code(&config, &tests))
}

/// Config file variables, then the process environment, then `--var`, then
/// `--var-from-file`; later sources win
fn resolve_variables(
    file: &ConfigFile,
    config: &RunConfig,
    args: &RunArgs,
) -> Result<BTreeMap<String, String>> {
    let mut variables = file.variables.clone();
    if config.with_env {
        variables.extend(config::parse_variables(&config::process_environment()));
    }
    variables.extend(config::parse_variables(&args.vars));
    if let Some(ref path) = args.var_from_file {
        variables.extend(config::load_var_file(path)?);
    }
    Ok(variables)
}

fn resolve_aliases(file: &ConfigFile, args: &RunArgs) -> Aliases {
    let mut aliases = file.aliases.clone();
    aliases.extend(config::compute_aliases(&args.aliases));
    aliases
}

/// Colour only when allowed and the console stream is a terminal
fn use_color(no_color: bool, console_on_stdout: bool) -> bool {
    if no_color {
        return false;
    }
    if console_on_stdout {
        std::io::stdout().is_terminal()
    } else {
        std::io::stderr().is_terminal()
    }
}

fn exit_code(config: &RunConfig, tests: &Tests) -> i32 {
    if config.strict && tests.has_failures() {
        STRICT_FAILURE_EXIT_CODE
    } else {
        0
    }
}

fn list_executors(args: ListArgs) {
    let registry = executors::builtin_registry();

    println!("\nAvailable executors:\n");
    for name in registry.names() {
        println!("  {name}");
        if !args.detailed {
            continue;
        }
        if let Ok(executor) = registry.get(name) {
            for assertion in executor.default_assertions() {
                println!("      default: {assertion}");
            }
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["itest", "run"];
        full.extend_from_slice(argv);
        match Args::parse_from(full).command {
            cli::Command::Run(args) => args,
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_variable_precedence() {
        let dir = tempdir().unwrap();
        let var_file = dir.path().join("vars.yaml");
        std::fs::write(&var_file, "from_file: yes\nshared: file\n").unwrap();

        let mut file = ConfigFile::default();
        file.variables.insert("shared".into(), "config".into());
        file.variables.insert("only_config".into(), "c".into());

        let args = run_args(&[
            "--no-env",
            "--var",
            "shared=flag",
            "--var",
            "only_flag=f",
            "--var-from-file",
            var_file.to_str().unwrap(),
        ]);
        let mut config = file.run.clone();
        args.apply(&mut config);

        let vars = resolve_variables(&file, &config, &args).unwrap();
        assert_eq!(vars["shared"], "file");
        assert_eq!(vars["only_config"], "c");
        assert_eq!(vars["only_flag"], "f");
        assert_eq!(vars["from_file"], "yes");
    }

    #[test]
    fn test_flag_aliases_override_config() {
        let mut file = ConfigFile::default();
        file.aliases.insert("kc".into(), "kubectl".into());
        file.aliases.insert("ll".into(), "ls -l".into());

        let aliases = resolve_aliases(&file, &run_args(&["--alias", "kc:kubectl -n test"]));
        assert_eq!(aliases["kc"], "kubectl -n test");
        assert_eq!(aliases["ll"], "ls -l");
    }

    #[test]
    fn test_no_color_flag_disables_color() {
        let args = run_args(&["--no-color"]);
        assert!(args.no_color);
        assert!(!use_color(args.no_color, true));
        assert!(!use_color(args.no_color, false));
        assert!(!run_args(&[]).no_color);
    }

    #[test]
    fn test_strict_exit_code() {
        let mut tests = Tests::new();
        let mut config = RunConfig::default();
        assert_eq!(exit_code(&config, &tests), 0);

        tests.total_ko = 1;
        assert_eq!(exit_code(&config, &tests), 0);

        config.strict = true;
        assert_eq!(exit_code(&config, &tests), STRICT_FAILURE_EXIT_CODE);
    }

    #[tokio::test]
    async fn test_suite_file_end_to_end() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("ok.yml"),
            "name: ok\ntestcases:\n  - name: echo\n    steps:\n      - script: echo {{.who}}\n        assertions:\n          - result.systemout ShouldEqual world\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("ko.yml"),
            "name: ko\ntestcases:\n  - name: exit\n    steps:\n      - type: exec\n        script: exit 1\n",
        )
        .unwrap();

        let files = loader::discover(&[dir.path().to_str().unwrap().to_string()], &[]).unwrap();
        let suites = loader::load_suites(&files).unwrap();

        let mut variables = BTreeMap::new();
        variables.insert("who".to_string(), "world".to_string());
        let runner = SuiteRunner::new(Arc::new(executors::builtin_registry()))
            .with_variables(Arc::new(variables));
        let mut tests = Scheduler::new(Arc::new(runner), 2).run_all(suites).await;
        tests.sort_by_discovery();

        assert_eq!(tests.total, 2);
        assert_eq!(tests.total_ok, 1);
        assert_eq!(tests.total_ko, 1);
        assert_eq!(tests.test_suites[0].name, "ko");
        assert_eq!(
            resume_line(&tests),
            "Total:2 TotalOK:1 TotalKO:1 TotalSkipped:0 TotalTestSuite:2"
        );
    }
}
