//! Report and console formatters
//!
//! Reports come in JUnit XML, JSON, YAML and TAP. Console output is driven by
//! the detail level and always ends with the resume line.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{CaseStatus, TestCase, TestSuite, Tests};

/// Report file stem, the extension follows the format
const REPORT_STEM: &str = "test_results";

/// Report format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Xml,
    Json,
    Yaml,
    Tap,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "xml" | "junit" => Some(OutputFormat::Xml),
            "json" => Some(OutputFormat::Json),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            "tap" => Some(OutputFormat::Tap),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Tap => "tap",
        }
    }
}

/// Console verbosity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum DetailsLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl DetailsLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(DetailsLevel::Low),
            "medium" => Some(DetailsLevel::Medium),
            "high" => Some(DetailsLevel::High),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render the full report
    pub fn render(&self, tests: &Tests) -> Result<String> {
        match self.format {
            OutputFormat::Xml => Ok(render_junit(tests)),
            OutputFormat::Json => {
                serde_json::to_string_pretty(tests).context("Failed to render JSON report")
            }
            OutputFormat::Yaml => serde_yaml::to_string(tests).context("Failed to render YAML report"),
            OutputFormat::Tap => Ok(render_tap(tests)),
        }
    }

    /// Write the report into `output_dir`, or print it when no directory is set
    pub fn write_report(&self, tests: &Tests, output_dir: Option<&Path>) -> Result<Option<PathBuf>> {
        let content = self.render(tests)?;

        let Some(dir) = output_dir else {
            println!("{content}");
            return Ok(None);
        };

        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        let path = dir.join(format!("{}.{}", REPORT_STEM, self.format.extension()));
        fs::write(&path, content)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;

        info!("Report written to {}", path.display());
        Ok(Some(path))
    }

    /// Per-suite and per-case console lines for the given detail level
    pub fn console_lines(&self, tests: &Tests, level: DetailsLevel) -> Vec<String> {
        let mut lines = Vec::new();
        if level == DetailsLevel::Low {
            return lines;
        }

        for suite in &tests.test_suites {
            lines.push(self.suite_line(suite));
            if level < DetailsLevel::High {
                continue;
            }
            for case in &suite.test_cases {
                lines.push(format!("    {} {} [{}ms]", self.status(case.status), case.name, case.duration_ms));
                for failure in &case.failures {
                    lines.push(format!("        {failure}"));
                }
            }
        }
        lines
    }

    fn suite_line(&self, suite: &TestSuite) -> String {
        let status = if suite.failures > 0 {
            CaseStatus::Fail
        } else {
            CaseStatus::Pass
        };
        format!(
            "{} {} ({} cases, {} failed, {} skipped) [{}ms]",
            self.status(status),
            suite.name,
            suite.case_count(),
            suite.failures,
            suite.skipped,
            suite.duration_ms
        )
    }

    fn status(&self, status: CaseStatus) -> String {
        let plain = format!("{} {}", status.symbol(), status);
        if !self.colorize {
            return plain;
        }
        match status {
            CaseStatus::Pass => format!("\x1b[32m{plain}\x1b[0m"),
            CaseStatus::Fail => format!("\x1b[31m{plain}\x1b[0m"),
            CaseStatus::Skip => format!("\x1b[33m{plain}\x1b[0m"),
            CaseStatus::Pending => plain,
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

/// One-line run summary
pub fn resume_line(tests: &Tests) -> String {
    format!(
        "Total:{} TotalOK:{} TotalKO:{} TotalSkipped:{} TotalTestSuite:{}",
        tests.total,
        tests.total_ok,
        tests.total_ko,
        tests.total_skipped,
        tests.test_suites.len()
    )
}

/// One line per failed case, with its failures
pub fn resume_failures(tests: &Tests) -> Vec<String> {
    let mut lines = Vec::new();
    for suite in &tests.test_suites {
        for case in suite.test_cases.iter().filter(|c| c.is_failed()) {
            let reasons: Vec<String> = case.failures.iter().map(ToString::to_string).collect();
            lines.push(format!(
                "FAILURE {} / {}: {}",
                suite.name,
                case.name,
                reasons.join(" | ")
            ));
        }
    }
    lines
}

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn render_junit(tests: &Tests) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<testsuites tests=\"{}\" failures=\"{}\" skipped=\"{}\" time=\"{}\">\n",
        tests.total,
        tests.total_ko,
        tests.total_skipped,
        seconds(tests.duration_ms)
    ));

    for suite in &tests.test_suites {
        out.push_str(&format!(
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" skipped=\"{}\" time=\"{}\"",
            escape_xml(&suite.name),
            suite.case_count(),
            suite.failures,
            suite.skipped,
            seconds(suite.duration_ms)
        ));
        if let Some(ref file) = suite.filename {
            out.push_str(&format!(" file=\"{}\"", escape_xml(file)));
        }
        out.push_str(">\n");

        for case in &suite.test_cases {
            out.push_str(&junit_case(&suite.name, case));
        }
        out.push_str("  </testsuite>\n");
    }
    out.push_str("</testsuites>\n");
    out
}

fn junit_case(suite: &str, case: &TestCase) -> String {
    let open = format!(
        "    <testcase classname=\"{}\" name=\"{}\" time=\"{}\"",
        escape_xml(suite),
        escape_xml(&case.name),
        seconds(case.duration_ms)
    );

    match case.status {
        CaseStatus::Skip => format!("{open}>\n      <skipped/>\n    </testcase>\n"),
        CaseStatus::Pending => {
            format!("{open}>\n      <skipped message=\"not run\"/>\n    </testcase>\n")
        }
        CaseStatus::Fail => {
            let mut out = format!("{open}>\n");
            for failure in &case.failures {
                out.push_str(&format!(
                    "      <failure type=\"{}\" message=\"{}\">step {}</failure>\n",
                    escape_xml(&failure.kind),
                    escape_xml(&failure.message),
                    failure.step
                ));
            }
            out.push_str("    </testcase>\n");
            out
        }
        CaseStatus::Pass => format!("{open}/>\n"),
    }
}

fn render_tap(tests: &Tests) -> String {
    let cases: Vec<(&TestSuite, &TestCase)> = tests
        .test_suites
        .iter()
        .flat_map(|s| s.test_cases.iter().map(move |c| (s, c)))
        .collect();

    let mut out = format!("TAP version 13\n1..{}\n", cases.len());
    for (number, (suite, case)) in cases.iter().enumerate() {
        let number = number + 1;
        match case.status {
            CaseStatus::Fail => {
                out.push_str(&format!("not ok {} - {} / {}\n", number, suite.name, case.name));
                out.push_str("  ---\n");
                for failure in &case.failures {
                    out.push_str(&format!("  - {}\n", failure.to_string().replace('\n', " ")));
                }
                out.push_str("  ...\n");
            }
            CaseStatus::Skip => {
                out.push_str(&format!("ok {} - {} / {} # SKIP\n", number, suite.name, case.name));
            }
            CaseStatus::Pending => {
                out.push_str(&format!(
                    "not ok {} - {} / {} # not run\n",
                    number, suite.name, case.name
                ));
            }
            CaseStatus::Pass => {
                out.push_str(&format!("ok {} - {} / {}\n", number, suite.name, case.name));
            }
        }
    }
    out
}
