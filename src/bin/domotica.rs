use clap::Parser;
use eyre::Result;

use domotica::cli::CliOpts;

fn main() -> Result<()> {
    let opts = CliOpts::parse();

    domotica::init(opts.log_file().as_deref())?;
    domotica::banner();

    domotica::cli(opts)
}
