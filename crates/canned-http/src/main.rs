//! canned-http - scriptable HTTP test double

use anyhow::{anyhow, Context, Result};
use canned_http_core::{load_script, ScriptFile, ScriptFormat};
use canned_http_server::{HttpServer, Runner, RunnerConfig};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "canned_http={0},canned_http_core={0},canned_http_server={0}",
                    log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    // One diagnostic line, independent of the log level
    if let Err(e) = run(cli).await {
        match e.downcast_ref::<canned_http_core::Error>() {
            Some(err) if err.is_script_violation() => info!("Client deviated from the script"),
            _ => debug!("Stopped before the script could be served"),
        }
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = cli
        .script_path()
        .context("Must specify either --json-filename or --yaml-filename")?;
    let script = Arc::new(read_script(path, cli.json_filename.is_some())?);
    info!("Loaded {} connections from {}", script.len(), path.display());

    let server = HttpServer::bind(&cli.bind_addr()).await?;
    let config = RunnerConfig {
        close_grace: cli.close_grace(),
    };

    let summary = Runner::new(script, server, config).run().await?;
    info!(
        "Script followed: {} connections, {} requests",
        summary.connections, summary.requests
    );
    Ok(())
}

/// The flag decides the format, whatever the file extension says
fn read_script(path: &Path, json: bool) -> Result<canned_http_core::Script> {
    let format = if json { ScriptFormat::Json } else { ScriptFormat::Yaml };
    if ScriptFormat::from_path(path) == Some(format) {
        return Ok(load_script(path)?);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read script {}: {}", path.display(), e))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(ScriptFile::parse(&content, format)?.into_script(base_dir)?)
}
