use crate::{
    devices::Devices,
    hardware::{LinkError, Transmit},
    misc::buf::Encode,
    protocol::Command,
};

/// Writes commands to the board, suppressing consecutive duplicates.
pub struct Dispatcher<L> {
    link: L,
    previous: Option<Command>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Sent,
    Suppressed,
}

impl<L: Transmit> Dispatcher<L> {
    const LINE_CAPACITY: usize = 32;

    pub fn new(link: L) -> Self {
        Dispatcher {
            link,
            previous: None,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn previous(&self) -> Option<Command> {
        self.previous
    }

    /// Sends `command` unless it equals the last command sent. Device state is
    /// only updated once the write has succeeded.
    pub fn dispatch(
        &mut self,
        command: Command,
        devices: &mut Devices,
    ) -> Result<Dispatch, LinkError> {
        if self.previous == Some(command) {
            tracing::trace!("Suppressing repeated {command}");
            return Ok(Dispatch::Suppressed);
        }

        let mut buf = Vec::with_capacity(Self::LINE_CAPACITY);
        command.encode(&mut buf);

        if let Err(e) = self.link.transmit(&buf) {
            tracing::warn!("Failed to send {command}: {e}");
            return Err(e);
        }

        tracing::info!("Sent {command}");

        devices.apply_command(&command);
        self.previous = Some(command);

        Ok(Dispatch::Sent)
    }
}
