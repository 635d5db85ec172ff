use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::Result;

mod common;
mod config;
mod console;
mod gestures;
mod send;
mod table;

pub use common::CommonOpts;
pub use console::{Console, ConsoleOpts};
pub use gestures::{GestureOpts, Gestures};
pub use send::{OneShot, SendOpts};

#[derive(Parser)]
#[command(version, about)]
pub struct CliOpts {
    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Line-based serial console with round-trip latency measurement.
    Console(ConsoleOpts),

    /// Drive the devices with hand gestures and the keyboard.
    Gestures(GestureOpts),

    /// Send a single command token, e.g. `FAN_SPEED=128`.
    Send(SendOpts),

    /// Print the effective configuration.
    Config(CommonOpts),

    /// Print the gesture and progressive control tables.
    Table,
}

impl CliOpts {
    const DASHBOARD_LOG: &str = "domotica.log";

    /// Where logs should go. The dashboard owns the terminal, so it logs to
    /// a file unless told otherwise.
    pub fn log_file(&self) -> Option<PathBuf> {
        match (&self.log_file, &self.command) {
            (Some(path), _) => Some(path.clone()),
            (None, Command::Gestures(_)) => Some(PathBuf::from(Self::DASHBOARD_LOG)),
            (None, _) => None,
        }
    }

    pub fn into_command(self) -> Command {
        self.command
    }
}

pub async fn execute_command(command: Command) -> Result<()> {
    match command {
        Command::Console(opts) => Console::run(opts).await,
        Command::Gestures(opts) => Gestures::run(opts).await,
        Command::Send(opts) => OneShot::run(opts).await,
        Command::Config(opts) => self::config::read_and_print(&opts).await,
        Command::Table => {
            self::table::print();
            Ok(())
        }
    }
}
