use std::path::PathBuf;

use clap::Args;
use eyre::Result;

use crate::config::Config;

/// Options shared by every command that talks to the board.
#[derive(Clone, Debug, Args)]
pub struct CommonOpts {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Serial port, overriding the config file.
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, overriding the config file.
    #[arg(short, long)]
    baud: Option<u32>,
}

impl CommonOpts {
    /// Loads the config file and applies command line overrides.
    pub async fn load(&self) -> Result<Config> {
        let config = Config::load(&self.config).await?;
        self.apply(config)
    }

    fn apply(&self, mut config: Config) -> Result<Config> {
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }

        if let Some(baud) = self.baud {
            config.serial.baud = baud;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let opts = CommonOpts {
            config: PathBuf::from("config.yaml"),
            port: Some("COM4".to_owned()),
            baud: None,
        };

        let config = opts.apply(Config::default()).unwrap();

        assert_eq!(config.serial.port, "COM4");
        assert_eq!(config.serial.baud, 9600);

        let opts = CommonOpts {
            baud: Some(0),
            ..opts
        };

        assert!(opts.apply(Config::default()).is_err());
    }
}
