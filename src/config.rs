use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use eyre::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::misc::serde::deserialise_null_to_default;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default, deserialize_with = "deserialise_null_to_default")]
    pub serial: SerialConfig,
    #[serde(default, deserialize_with = "deserialise_null_to_default")]
    pub gestures: GestureConfig,
    #[serde(default, deserialize_with = "deserialise_null_to_default")]
    pub console: ConsoleConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud: u32,
    /// Read timeout in seconds.
    pub timeout: f32,
    /// Time to wait after opening the port for the board to reset, in seconds.
    pub settle: f32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct GestureConfig {
    pub fps: u32,
    pub debounce: f32,
    /// Command line of a process printing one landmark frame per line.
    /// Frames are read from stdin when absent.
    pub landmarks: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub plot_path: PathBuf,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !fs::try_exists(path).await? {
            tracing::info!("No config found at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let data = fs::read(path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;

        let config = Self::parse(&data)?;
        config.validate()?;

        Ok(config)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(data).wrap_err("Failed to parse config")
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.serial.port.is_empty(), "Serial port must not be empty");
        ensure!(self.serial.baud > 0, "Baud rate must be positive");
        ensure!(
            is_duration(self.serial.timeout) && self.serial.timeout > 0.,
            "Serial timeout must be a positive number of seconds"
        );
        ensure!(
            is_duration(self.serial.settle),
            "Settle time must be a non-negative number of seconds"
        );
        ensure!(self.gestures.fps > 0, "Gesture frame rate must be positive");
        ensure!(
            is_duration(self.gestures.debounce),
            "Debounce must be a non-negative number of seconds"
        );

        if let Some(command) = &self.gestures.landmarks {
            ensure!(!command.is_empty(), "Landmark command must not be empty");
        }

        Ok(())
    }
}

/// Seconds representable as a `Duration`: non-negative, finite and in range.
fn is_duration(seconds: f32) -> bool {
    Duration::try_from_secs_f32(seconds).is_ok()
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f32(self.timeout)
    }
}

impl GestureConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_secs_f32(self.debounce)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1. / self.fps as f64)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: "/dev/ttyACM0".to_owned(),
            baud: 9600,
            timeout: 1.,
            settle: 2.,
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        GestureConfig {
            fps: 30,
            debounce: 0.5,
            landmarks: None,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            plot_path: PathBuf::from("latency.png"),
        }
    }
}

impl fmt::Display for SerialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} baud", self.port, self.baud)
    }
}
