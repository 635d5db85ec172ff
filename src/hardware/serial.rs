use std::{
    fmt,
    io::{self, Read, Write},
    sync::Mutex,
    thread,
};

use serialport::SerialPort;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    config::SerialConfig,
    misc::{
        self,
        buf::{DecodeError, LineBuffer},
    },
};

/* == Definitions == */

/// Serial connection to the board. When the port cannot be opened the link
/// stays disconnected and every write reports [`LinkError::Disconnected`].
pub struct SerialLink {
    name: String,
    port: Option<Mutex<Box<dyn SerialPort>>>,
}

/// Something that can write complete lines to the board.
pub trait Transmit {
    fn transmit(&self, line: &[u8]) -> Result<(), LinkError>;
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Serial port is not connected")]
    Disconnected,

    #[error("Serial port lock was poisoned")]
    Poisoned,

    #[error("Serial I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to clone serial port handle: {0}")]
    Clone(#[from] serialport::Error),
}

/// Events produced by the background reader.
#[derive(Debug)]
pub enum Received {
    Line(String),
    Undecodable(DecodeError),
    /// The read loop hit an unexpected error and has stopped.
    Closed(io::Error),
}

/* == Implementations == */

impl SerialLink {
    const CHANNEL_SIZE: usize = 64;
    const CHUNK_SIZE: usize = 256;

    pub async fn open(config: &SerialConfig) -> Self {
        let port = serialport::new(&config.port, config.baud)
            .timeout(config.timeout())
            .open();

        match port {
            Ok(port) => {
                tracing::info!("Opened {config}, waiting {}s for the board", config.settle);
                misc::sleep(config.settle).await;

                SerialLink {
                    name: config.port.clone(),
                    port: Some(Mutex::new(port)),
                }
            }

            Err(e) => {
                tracing::warn!("Failed to open {}: {e}, running disconnected", config.port);
                Self::disconnected(&config.port)
            }
        }
    }

    pub fn disconnected(name: &str) -> Self {
        SerialLink {
            name: name.to_owned(),
            port: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Starts a background thread reading lines from a cloned port handle.
    pub fn spawn_reader(&self) -> Result<mpsc::Receiver<Received>, LinkError> {
        let port = self.port.as_ref().ok_or(LinkError::Disconnected)?;
        let reader = port.lock().map_err(|_| LinkError::Poisoned)?.try_clone()?;

        let (tx, rx) = mpsc::channel(Self::CHANNEL_SIZE);
        let name = self.name.clone();

        thread::Builder::new()
            .name(format!("serial-reader {name}"))
            .spawn(move || read_loop(reader, tx))?;

        Ok(rx)
    }
}

impl Transmit for SerialLink {
    fn transmit(&self, line: &[u8]) -> Result<(), LinkError> {
        let port = self.port.as_ref().ok_or(LinkError::Disconnected)?;
        let mut port = port.lock().map_err(|_| LinkError::Poisoned)?;

        port.write_all(line)?;
        port.flush()?;

        Ok(())
    }
}

impl fmt::Display for SerialLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", misc::ColourDot(self.is_connected()), self.name)
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        if self.port.is_some() {
            tracing::debug!("Closing {}", self.name);
        }
    }
}

/* == Background reader == */

fn read_loop(mut port: Box<dyn SerialPort>, tx: mpsc::Sender<Received>) {
    let mut lines = LineBuffer::new();
    let mut chunk = [0; SerialLink::CHUNK_SIZE];

    loop {
        match port.read(&mut chunk) {
            Ok(n) => {
                lines.extend(&chunk[..n]);

                while let Some(line) = lines.next_line() {
                    let event = match line {
                        Ok(line) if line.is_empty() => continue,
                        Ok(line) => Received::Line(line),
                        Err(e) => Received::Undecodable(e),
                    };

                    if tx.blocking_send(event).is_err() {
                        return;
                    }
                }
            }

            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {
                if tx.is_closed() {
                    return;
                }
            }

            Err(e) => {
                tracing::error!("Serial read loop terminated: {e}");
                let _ = tx.blocking_send(Received::Closed(e));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_link() {
        let link = SerialLink::disconnected("/dev/null0");

        assert!(!link.is_connected());
        assert!(matches!(
            link.transmit(b"LED_ON\n"),
            Err(LinkError::Disconnected)
        ));
        assert!(matches!(
            link.spawn_reader(),
            Err(LinkError::Disconnected)
        ));
    }
}
