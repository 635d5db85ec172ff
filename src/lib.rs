use std::{fs::File, io, path::Path, sync::Mutex};

use color_eyre::owo_colors::OwoColorize;
use eyre::{Context, Result};
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod config;
pub mod devices;
pub mod dispatch;
pub mod gesture;
pub mod hardware;
pub mod latency;
pub mod misc;
pub mod protocol;
pub mod ui;

const DEFAULT_LOG_FILTER: &str = "domotica=info";

/// Installs the error report handler and the log subscriber. `RUST_LOG`
/// takes precedence over the default filter.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    color_eyre::install()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .wrap_err_with(|| format!("Failed to create log file {}", path.display()))?;

            subscriber
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }

        None => subscriber.with_writer(io::stderr).init(),
    }

    Ok(())
}

pub fn banner() {
    eprintln!(
        "{} {} {}",
        env!("CARGO_PKG_NAME").bold(),
        env!("CARGO_PKG_VERSION").dimmed(),
        format!(
            "({}-{}-{})",
            env!("CARGO_CFG_TARGET_ARCH"),
            env!("CARGO_CFG_TARGET_OS"),
            env!("CARGO_CFG_TARGET_ENV")
        )
        .dimmed()
    );
}

#[tokio::main]
pub async fn cli(opts: cli::CliOpts) -> Result<()> {
    cli::execute_command(opts.into_command()).await
}
