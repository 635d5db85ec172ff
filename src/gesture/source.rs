use std::process::Stdio;

use eyre::{Context, Result, eyre};
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, BufReader, Lines},
    process::{Child, Command},
};

use super::HandLandmarks;

/// Line-delimited stream of landmark frames, produced either by a detector
/// subprocess or piped into stdin.
pub struct LandmarkSource {
    lines: Lines<Box<dyn AsyncBufRead + Send + Unpin>>,
    _child: Option<Child>,
}

impl LandmarkSource {
    pub fn spawn(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| eyre!("Empty landmark command"))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .wrap_err_with(|| format!("Failed to start landmark detector \"{program}\""))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| eyre!("Detector stdout not captured"))?;

        tracing::info!("Started landmark detector \"{program}\"");

        Ok(Self::from_reader(BufReader::new(stdout), Some(child)))
    }

    pub fn stdin() -> Self {
        tracing::info!("Reading landmark frames from stdin");
        Self::from_reader(BufReader::new(io::stdin()), None)
    }

    fn from_reader<R>(reader: R, child: Option<Child>) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(reader);

        LandmarkSource {
            lines: reader.lines(),
            _child: child,
        }
    }

    /// Waits for the next well-formed frame. The inner `None` means no hand
    /// is visible; the outer `None` means the stream has ended. Malformed
    /// frames are logged and skipped.
    ///
    /// Cancel safe.
    pub async fn next_frame(&mut self) -> Result<Option<Option<HandLandmarks>>> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };

            if line.trim().is_empty() {
                continue;
            }

            match HandLandmarks::parse_frame(&line) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => tracing::warn!("Skipping landmark frame: {e}"),
            }
        }
    }
}
