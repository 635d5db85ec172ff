pub mod serial;

pub use serial::{LinkError, Received, SerialLink, Transmit};
