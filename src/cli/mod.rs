//! CLI module
//!
//! Command-line runner for one scope at a time.
//!
//! # Commands
//!
//! - `run` - Collect then extract, optionally exporting Parquet
//! - `collect` - Fetch raw pages only
//! - `extract` - Replay extraction over stored pages
//! - `records` - Print stored usage rows
//! - `validate` - Check the configuration file

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, ScopeArgs};
pub use runner::Runner;
