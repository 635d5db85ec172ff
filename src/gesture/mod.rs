use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::{devices::Colour, protocol::Command};

pub mod landmarks;
pub mod progressive;
pub mod source;

pub use landmarks::HandLandmarks;
pub use progressive::{ProgressiveControl, ProgressiveTracker};

/* == Finger state == */

/// Extension of the five fingers, written thumb first as a `0`/`1` string
/// (`"01100"` is index and middle raised). Stored with the thumb in bit 4.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FingerState(u8);

#[derive(Debug, Error, PartialEq)]
#[error("Expected five '0'/'1' characters, got \"{0}\"")]
pub struct FingerStateError(String);

impl FingerState {
    pub const WIDTH: usize = 5;

    /// Bits ordered thumb, index, middle, ring, pinky.
    pub const fn from_bits(bits: u8) -> Self {
        FingerState(bits & 0b11111)
    }

    pub fn from_fingers(fingers: [bool; Self::WIDTH]) -> Self {
        let bits = fingers
            .iter()
            .fold(0, |bits, &raised| (bits << 1) | raised as u8);

        FingerState(bits)
    }

    pub fn fingers(self) -> [bool; Self::WIDTH] {
        std::array::from_fn(|i| self.0 & (1 << (Self::WIDTH - 1 - i)) != 0)
    }
}

impl fmt::Display for FingerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05b}", self.0)
    }
}

impl FromStr for FingerState {
    type Err = FingerStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || FingerStateError(s.to_owned());

        if s.len() != Self::WIDTH {
            return Err(error());
        }

        let mut fingers = [false; Self::WIDTH];

        for (finger, c) in fingers.iter_mut().zip(s.chars()) {
            *finger = match c {
                '0' => false,
                '1' => true,
                _ => return Err(error()),
            };
        }

        Ok(FingerState::from_fingers(fingers))
    }
}

/* == Gesture table == */

pub struct GestureCommand {
    pub pattern: FingerState,
    pub command: Command,
    pub description: &'static str,
    pub colour: Colour,
}

pub const GESTURE_COMMANDS: [GestureCommand; 9] = [
    GestureCommand {
        pattern: FingerState::from_bits(0b00000),
        command: Command::AllOff,
        description: "Puño cerrado - Apagar todo",
        colour: Colour::Red,
    },
    GestureCommand {
        pattern: FingerState::from_bits(0b11111),
        command: Command::LedOn,
        description: "Mano abierta - Encender luces",
        colour: Colour::Green,
    },
    GestureCommand {
        pattern: FingerState::from_bits(0b01100),
        command: Command::FanOn,
        description: "Paz y amor - Ventilador ON",
        colour: Colour::Blue,
    },
    GestureCommand {
        pattern: FingerState::from_bits(0b01111),
        command: Command::FanOff,
        description: "Cuatro dedos - Ventilador OFF",
        colour: Colour::Red,
    },
    GestureCommand {
        pattern: FingerState::from_bits(0b10000),
        command: Command::BuzzerOn,
        description: "Solo pulgar - Alarma sonora",
        colour: Colour::Orange,
    },
    GestureCommand {
        pattern: FingerState::from_bits(0b00111),
        command: Command::DoorOpen,
        description: "Tres dedos - Abrir puerta",
        colour: Colour::Green,
    },
    GestureCommand {
        pattern: FingerState::from_bits(0b00001),
        command: Command::DoorClose,
        description: "Solo meñique - Cerrar puerta",
        colour: Colour::Red,
    },
    GestureCommand {
        pattern: FingerState::from_bits(0b01000),
        command: Command::DoorSetAngle(90),
        description: "Solo índice - Ángulo 90°",
        colour: Colour::Yellow,
    },
    GestureCommand {
        pattern: FingerState::from_bits(0b11000),
        command: Command::FanReverse,
        description: "Pulgar + índice - Reversa ventilador",
        colour: Colour::Orange,
    },
];

/* == Classifier == */

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Classification {
    pub command: Option<Command>,
    pub description: &'static str,
    pub colour: Colour,
}

impl Classification {
    pub const UNRECOGNISED: Classification = Classification {
        command: None,
        description: "Gesto no reconocido",
        colour: Colour::White,
    };
}

/// Looks up the command mapped to a finger state. Never fails: unmapped
/// patterns yield [`Classification::UNRECOGNISED`].
pub fn classify(state: FingerState) -> Classification {
    GESTURE_COMMANDS
        .iter()
        .find(|g| g.pattern == state)
        .map(|g| Classification {
            command: Some(g.command),
            description: g.description,
            colour: g.colour,
        })
        .unwrap_or(Classification::UNRECOGNISED)
}

/// As [`classify`], for a raw finger-state string.
pub fn classify_pattern(pattern: &str) -> Classification {
    pattern
        .parse()
        .map(classify)
        .unwrap_or(Classification::UNRECOGNISED)
}
