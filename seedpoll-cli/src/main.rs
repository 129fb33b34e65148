//! seedpoll - wait for PostgreSQL, bootstrap the books table, poll it
//!
//! Reads the database host from `POSTGRES_LOCATION` (or `--host`), retries
//! the connection until the database is up, creates and seeds the `books`
//! table if it is missing, then prints its contents every poll interval
//! until Ctrl+C / SIGTERM or a database error.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use seedpoll_core::config::HOST_ENV;
use seedpoll_core::{ConnectionConfig, WatchSettings};
use seedpoll_db::{Lifecycle, PgConnector};
use tracing::info;

mod signal;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "seedpoll",
    author,
    version,
    about = "Wait for PostgreSQL, bootstrap the books table, and poll it forever",
    long_about = "Connects to the PostgreSQL host named by POSTGRES_LOCATION, retrying until it \
                  accepts connections. Creates and seeds the books table on first run, then \
                  prints every row at a fixed interval until terminated."
)]
struct Cli {
    /// Database host (overrides POSTGRES_LOCATION)
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// TOML settings file for retry and polling behaviour
    #[arg(long, value_name = "PATH", env = "SEEDPOLL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Export traces over OTLP (requires the telemetry feature)
    #[arg(long)]
    otel: bool,
}

fn connection_config(host: Option<String>) -> Result<ConnectionConfig> {
    let config = match host {
        Some(host) => ConnectionConfig::from_lookup(|key| {
            if key == HOST_ENV {
                Some(host.clone())
            } else {
                std::env::var(key).ok()
            }
        }),
        None => ConnectionConfig::from_env(),
    };
    config.context("Invalid database configuration")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })?;

    let settings = WatchSettings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let config = connection_config(cli.host)?;
    info!(host = %config.host, "Database location");

    let report = Lifecycle::new(PgConnector, config)
        .with_retry_policy(settings.retry_policy())
        .with_connect_timeout(settings.connect_timeout())
        .with_poll_interval(settings.poll_interval())
        .run(std::io::stdout(), signal::shutdown_signal())
        .await;

    tracing_setup::shutdown_otel();

    report
        .into_result()
        .context("Error while talking to PostgreSQL")
}
