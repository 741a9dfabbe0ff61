//! # vidcap-mcp
//!
//! MCP server binary for the VidCap YouTube API. Serves either stdio or
//! streamable HTTP (with legacy SSE) depending on `--transport`.

#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use secrecy::ExposeSecret;
use vidcap_core::{Credential, CredentialScope};
use vidcap_server::{load_settings, Lifecycle, Settings, TransportMode};
use vidcap_telemetry::{init_telemetry, TelemetryConfig};

/// VidCap MCP server.
#[derive(Parser, Debug)]
#[command(name = "vidcap-mcp", version, about = "VidCap MCP server")]
struct Cli {
    /// Transport to serve: `stdio` or `http`.
    #[arg(long, env = "MCP_TRANSPORT", default_value = "stdio")]
    transport: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = load_settings();

    let telemetry = TelemetryConfig {
        format: settings.logging.format,
        ..TelemetryConfig::default()
    }
    .debug(settings.logging.debug);
    init_telemetry(&telemetry);

    match run(cli, settings).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "fatal");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli, settings: Settings) -> Result<u8> {
    let mode: TransportMode = cli.transport.parse()?;

    let default_key = settings
        .vidcap
        .api_key
        .as_ref()
        .map(|key| Credential::new(key.expose_secret()));
    if default_key.is_none() {
        tracing::warn!("VIDCAP_API_KEY not set; requests must supply api_key");
    }
    CredentialScope::install_default(default_key);

    let lifecycle = Lifecycle::new(settings).context("failed to start")?;
    let report = lifecycle.run(mode, shutdown_signal()).await?;

    for failure in &report.close_failures {
        tracing::warn!(error = %failure, "session close failed during shutdown");
    }
    tracing::info!(sessions_closed = report.sessions_closed, "vidcap-mcp stopped");
    Ok(u8::try_from(report.exit_code()).unwrap_or(1))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
