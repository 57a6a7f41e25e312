//! Infrastructure shared by the peercall crates.
//!
//! Holds the logging bootstrap used by binaries and tests, and the TOML
//! configuration loader every crate's config structs go through.

pub mod config;
pub mod errors;
pub mod logging;

pub use errors::types::{Error, Result};
pub use logging::setup::{log_welcome, parse_log_level, setup_logging, LoggingConfig, LoggingSection};
