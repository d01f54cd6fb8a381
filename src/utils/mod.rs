//! Utility module
//!
//! Logging setup and timing helpers.

pub mod logger;
pub mod timer;
