use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result, bail};
use tokio::time::timeout;

use crate::{
    devices::Devices,
    dispatch::Dispatcher,
    hardware::{Received, SerialLink},
    protocol::Command,
};

use super::CommonOpts;

#[derive(Clone, Debug, Parser)]
pub struct SendOpts {
    #[command(flatten)]
    common: CommonOpts,

    /// Command token, e.g. `LED_ON` or `DOOR_SET_ANGLE=45`.
    command: Command,

    /// Seconds to keep printing replies after sending.
    #[arg(long, default_value_t = 1.)]
    wait: f32,
}

pub struct OneShot;

impl SendOpts {
    fn wait(&self) -> Result<Duration> {
        Duration::try_from_secs_f32(self.wait)
            .wrap_err_with(|| format!("Invalid reply wait of {} seconds", self.wait))
    }
}

impl OneShot {
    pub async fn run(opts: SendOpts) -> Result<()> {
        let wait = opts.wait()?;
        let config = opts.common.load().await?;
        let link = SerialLink::open(&config.serial).await;

        if !link.is_connected() {
            bail!("Serial port {} is not available", config.serial.port);
        }

        let mut replies = link.spawn_reader()?;
        let mut dispatcher = Dispatcher::new(link);

        dispatcher.dispatch(opts.command, &mut Devices::new())?;
        println!("{} {}", dispatcher.link(), opts.command);

        let deadline = tokio::time::Instant::now() + wait;

        while let Ok(Some(event)) = timeout(
            deadline.saturating_duration_since(tokio::time::Instant::now()),
            replies.recv(),
        )
        .await
        {
            match event {
                Received::Line(line) => println!("< {line}"),
                Received::Undecodable(e) => tracing::warn!("{e}"),
                Received::Closed(e) => bail!("Serial reader stopped: {e}"),
            }
        }

        Ok(())
    }
}
