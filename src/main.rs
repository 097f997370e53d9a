//! b2c-graph - Azure AD B2C directory shell
//!
//! Reads, creates, updates and deletes users and extension attributes in a
//! B2C tenant through the Azure AD Graph API.

#![deny(clippy::all)]

mod auth;
mod cli;
mod config;
mod error;
mod graph;
mod output;
mod secure;

use std::io::IsTerminal;
use std::process::ExitCode;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use auth::{CachedTokenProvider, ClientCredentialProvider, TokenProvider};
use cli::{Cli, Command};
use config::Config;
use error::AppError;
use graph::GraphClient;
use output::Output;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        // .env file is optional - only report it if it exists but is broken
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    let color = !cli.no_color
        && std::env::var_os("NO_COLOR").is_none()
        && std::io::stdout().is_terminal();
    let output = Output::new(color);

    match run(cli, &output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output.print_error(&e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing/logging.
///
/// Logs go to stderr so stdout carries only directory responses.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "warn,b2c_graph=debug"
    } else {
        "warn,b2c_graph=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

async fn run(cli: Cli, output: &Output) -> Result<(), AppError> {
    let command = match cli.command {
        Command::Syntax => {
            output.print_syntax()?;
            return Ok(());
        }
        Command::Directory(command) => command,
    };

    let config = Config::load(cli.config_file_path.as_deref())
        .map_err(|e| AppError::Config(format!("{e:#}")))?;
    debug!("Configuration loaded successfully");

    let client = build_client(&config)?;
    info!("Using tenant {}", client.tenant().tenant_id);

    let body = command.execute(&client).await?;
    output.print_result(&body);

    Ok(())
}

fn build_client(config: &Config) -> Result<GraphClient, AppError> {
    let provider = ClientCredentialProvider::new()?;

    let tokens: Box<dyn TokenProvider> = if config.token.cache {
        debug!("Token cache enabled");
        Box::new(CachedTokenProvider::new(
            provider,
            config.token.refresh_before_expiry_seconds,
        ))
    } else {
        Box::new(provider)
    };

    GraphClient::new(config.tenant_context(), tokens)
}
