//! Output formatting module
//!
//! Report renderers, resume lines and console summaries.

mod formatter;

pub use formatter::{resume_failures, resume_line, DetailsLevel, OutputFormat, ResultFormatter};
