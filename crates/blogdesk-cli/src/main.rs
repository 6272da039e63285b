//! blogdesk - command-line client for the blog platform.
//!
//! Sign in, read and write posts, comment, search and manage your profile
//! from the terminal. Run `blogdesk --help` for the command list.

mod commands;
mod utils;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blogdesk_core::Config;

use commands::Cli;

/// Directory for an optional log file alongside stderr output
const LOG_DIR_ENV: &str = "BLOGDESK_LOG_DIR";

/// Initialize the tracing subscriber for logging.
///
/// Returns the appender guard when file logging is enabled; it must live
/// until exit so buffered lines are flushed.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), "blogdesk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Prints help/usage errors and exits on its own
    let cli = Cli::parse();

    let _log_guard = init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            commands::report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    debug!(api = %config.api_base_url, backend = ?config.session_backend, "Configuration loaded");
    info!("blogdesk starting");

    commands::execute(cli.command, &mut config).await
}
