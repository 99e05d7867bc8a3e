//! CLI argument definitions using clap
//!
//! Commands:
//! - devhost serve --config <path>
//! - devhost check --config <path>
//! - devhost capabilities

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// devhost - dev server host for foreign build-tool plugins
#[derive(Parser, Debug)]
#[command(name = "devhost")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the dev server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./devhost.json")]
        config: PathBuf,

        /// Override the configured host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate a configuration file and print it resolved
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./devhost.json")]
        config: PathBuf,
    },

    /// Print the plugin capability surfaces
    Capabilities,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
