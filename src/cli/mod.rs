//! CLI module for devhost
//!
//! Provides command-line interface for:
//! - serve: Boot the dev server and serve until interrupted
//! - check: Validate a configuration file
//! - capabilities: Print the plugin capability surfaces

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{capabilities, capability_surfaces, check, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
