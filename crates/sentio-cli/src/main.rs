//! sentio - terminal console for the Sentio IoT observability platform.
//!
//! A thin consumer of `sentio-core`: every read goes through the console's
//! shared query cache, and `watch` keeps the polled resources live.

mod cli;
mod commands;
mod output;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sentio_core::{ApiClient, Config, SessionGate};

use cli::{Cli, Commands};
use commands::App;

// ============================================================================
// Constants
// ============================================================================

/// Log file name prefix inside `<cache dir>/logs`; rotated daily.
const LOG_FILE_PREFIX: &str = "sentio.log";

/// Initialize the tracing subscriber for logging.
///
/// Stderr gets everything the filter lets through; when the cache directory
/// is available a daily log file gets the same events. The returned guard
/// must live until exit so buffered file output is flushed.
fn init_tracing(verbosity: u8, config: &Config) -> Option<WorkerGuard> {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG takes precedence (e.g., RUST_LOG=sentio_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let file = config
        .cache_dir()
        .ok()
        .map(|dir| dir.join("logs"))
        .filter(|dir| std::fs::create_dir_all(dir).is_ok())
        .map(|dir| tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX)));

    let (file_layer, guard) = match file {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }

    let _log_guard = init_tracing(cli.verbose, &config);
    info!(api_url = %config.api_url, "sentio starting");

    let credentials = config
        .credential_store()
        .context("Failed to open session storage")?;
    let api = ApiClient::from_config(&config, credentials).context("Invalid API configuration")?;
    let mut app = App {
        gate: SessionGate::new(api),
        config,
        json: cli.json,
    };

    match cli.command {
        Commands::Login(args) => commands::login(&mut app, args).await,
        Commands::Logout => commands::logout(&app),
        Commands::Status => commands::status(&app).await,
        Commands::Devices(cmd) => commands::devices(&app, cmd).await,
        Commands::Alerts(cmd) => commands::alerts(&app, cmd).await,
        Commands::Anomalies => commands::anomalies(&app).await,
        Commands::Predictions => commands::predictions(&app).await,
        Commands::Metrics(cmd) => commands::metrics(&app, cmd).await,
        Commands::Logs(cmd) => commands::logs(&app, cmd).await,
        Commands::Traces(cmd) => commands::traces(&app, cmd).await,
        Commands::Watch => commands::watch(&app).await,
    }
}
