//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::compat::{CapabilitySurface, DevServerProperty, ModuleGraphMethod, ModuleNodeField, PluginHost};
use crate::config::DevConfig;
use crate::module_graph::InMemoryModuleGraph;
use crate::server::{DevServer, ServerError};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, host, port } => serve(&config, host, port),
        Command::Check { config } => check(&config),
        Command::Capabilities => capabilities(),
    }
}

/// Boot the dev server and serve until interrupted
pub fn serve(config_path: &Path, host: Option<String>, port: Option<u16>) -> CliResult<()> {
    let mut config = DevConfig::load(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::server_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        let server = DevServer::new(config).create_server().await?;

        let plugins = PluginHost::new(Arc::clone(&server));
        plugins.build_start(Arc::new(InMemoryModuleGraph::new()))?;

        let reloads = server.spawn_watch_reloads();
        server.listen().await?;

        tokio::signal::ctrl_c().await.map_err(ServerError::Io)?;

        reloads.abort();
        server.close().await?;
        Ok::<(), CliError>(())
    })
}

/// Validate a configuration file and print it with defaults applied
pub fn check(config_path: &Path) -> CliResult<()> {
    match DevConfig::load(config_path) {
        Ok(config) => write_response(serde_json::to_value(&config)?),
        Err(e) => {
            write_error(e.code(), &e.to_string())?;
            Err(e.into())
        }
    }
}

/// The capability surfaces plugins can reach, keyed by capability name
pub fn capability_surfaces() -> Value {
    json!({
        (DevServerProperty::CAPABILITY): DevServerProperty::names(),
        (ModuleGraphMethod::CAPABILITY): ModuleGraphMethod::names(),
        (ModuleNodeField::CAPABILITY): ModuleNodeField::names(),
    })
}

/// Print the capability surfaces
pub fn capabilities() -> CliResult<()> {
    write_response(capability_surfaces())
}
