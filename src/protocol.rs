//! Newline-delimited ASCII protocol spoken with the microcontroller.
//!
//! Outbound lines are [`Command`] tokens (or free text from the console).
//! Inbound lines are decoded once into a [`Message`]: a `status:k=v,...`
//! telemetry report, a `message,time,ms` echo, the bare `ERROR` token, or
//! arbitrary text.

use std::{fmt, str::FromStr, time::Duration};

use bytes::BufMut;
use thiserror::Error;

use crate::misc::buf::{BufMutExt, Encode};

/* == Definitions == */

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    LedOn,
    LedOff,
    FanOn,
    FanOff,
    FanSpeed(u8),
    FanReverse,
    DoorOpen,
    DoorClose,
    DoorSetAngle(u8),
    BuzzerOn,
    AllOff,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Status(StatusReport),
    Echo(Echo),
    PeerError,
    Text(String),
}

/// Device telemetry reported by the board. Absent keys were not reported.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusReport {
    pub led: Option<bool>,
    pub fan: Option<u8>,
    pub fan_reverse: Option<bool>,
    pub door: Option<u8>,
    pub buzzer: Option<bool>,
}

/// A free-text message echoed back with the board's processing time.
#[derive(Clone, Debug, PartialEq)]
pub struct Echo {
    pub message: String,
    pub time_ms: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("Unknown command \"{0}\"")]
    Unknown(String),

    #[error("Invalid argument \"{1}\" for {0}")]
    Argument(&'static str, String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Malformed status entry \"{0}\"")]
    StatusEntry(String),

    #[error("Invalid value \"{value}\" for status key \"{key}\"")]
    StatusValue { key: String, value: String },

    #[error("Expected 'message,time,unit', got \"{0}\"")]
    EchoFormat(String),

    #[error("Invalid processing time \"{0}\"")]
    EchoTime(String),

    #[error("Unrecognised time unit \"{0}\"")]
    EchoUnit(String),
}

/* == Command == */

impl Command {
    pub const MAX_FAN_SPEED: u8 = 255;
    pub const MAX_DOOR_ANGLE: u8 = 180;

    const FAN_SPEED: &str = "FAN_SPEED";
    const DOOR_SET_ANGLE: &str = "DOOR_SET_ANGLE";

    pub fn door_angle(angle: u8) -> Self {
        Command::DoorSetAngle(angle.min(Self::MAX_DOOR_ANGLE))
    }

    pub fn token(&self) -> &'static str {
        match self {
            Command::LedOn => "LED_ON",
            Command::LedOff => "LED_OFF",
            Command::FanOn => "FAN_ON",
            Command::FanOff => "FAN_OFF",
            Command::FanSpeed(_) => Self::FAN_SPEED,
            Command::FanReverse => "FAN_REVERSE",
            Command::DoorOpen => "DOOR_OPEN",
            Command::DoorClose => "DOOR_CLOSE",
            Command::DoorSetAngle(_) => Self::DOOR_SET_ANGLE,
            Command::BuzzerOn => "BUZZER_ON",
            Command::AllOff => "ALL_OFF",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::FanSpeed(value) | Command::DoorSetAngle(value) => {
                write!(f, "{}={value}", self.token())
            }
            _ => f.write_str(self.token()),
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some((name, argument)) = s.split_once('=') {
            let parse = |max: u8| {
                argument
                    .trim()
                    .parse::<u16>()
                    .ok()
                    .filter(|&v| v <= max as u16)
                    .map(|v| v as u8)
            };

            return match name.trim() {
                Self::FAN_SPEED => parse(Self::MAX_FAN_SPEED)
                    .map(Command::FanSpeed)
                    .ok_or_else(|| CommandError::Argument(Self::FAN_SPEED, argument.to_owned())),

                Self::DOOR_SET_ANGLE => parse(Self::MAX_DOOR_ANGLE)
                    .map(Command::DoorSetAngle)
                    .ok_or_else(|| {
                        CommandError::Argument(Self::DOOR_SET_ANGLE, argument.to_owned())
                    }),

                _ => Err(CommandError::Unknown(s.to_owned())),
            };
        }

        Ok(match s {
            "LED_ON" => Command::LedOn,
            "LED_OFF" => Command::LedOff,
            "FAN_ON" => Command::FanOn,
            "FAN_OFF" => Command::FanOff,
            "FAN_REVERSE" => Command::FanReverse,
            "DOOR_OPEN" => Command::DoorOpen,
            "DOOR_CLOSE" => Command::DoorClose,
            "BUZZER_ON" => Command::BuzzerOn,
            "ALL_OFF" => Command::AllOff,
            _ => return Err(CommandError::Unknown(s.to_owned())),
        })
    }
}

impl Encode for Command {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_line(&self.to_string());
    }
}

/* == Message == */

impl Message {
    const STATUS_PREFIX: &str = "status:";
    const PEER_ERROR: &str = "ERROR";
    const TIME_UNIT: &str = "ms";

    /// Decodes a single line with its terminator already removed.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        if let Some(body) = line.strip_prefix(Self::STATUS_PREFIX) {
            return StatusReport::parse(body).map(Message::Status);
        }

        if line == Self::PEER_ERROR {
            return Ok(Message::PeerError);
        }

        if line.contains(',') {
            return Echo::parse(line).map(Message::Echo);
        }

        Ok(Message::Text(line.to_owned()))
    }
}

impl StatusReport {
    fn parse(body: &str) -> Result<Self, ParseError> {
        let mut report = StatusReport::default();

        for entry in body.trim().split(',').filter(|e| !e.trim().is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| ParseError::StatusEntry(entry.to_owned()))?;

            let (key, value) = (key.trim(), value.trim());

            let invalid = || ParseError::StatusValue {
                key: key.to_owned(),
                value: value.to_owned(),
            };

            match key {
                "led" => report.led = Some(parse_switch(value).ok_or_else(invalid)?),
                "buzzer" => report.buzzer = Some(parse_switch(value).ok_or_else(invalid)?),
                "fan" => {
                    report.fan = Some(parse_level(value, Command::MAX_FAN_SPEED).ok_or_else(invalid)?)
                }
                "door" => {
                    report.door =
                        Some(parse_level(value, Command::MAX_DOOR_ANGLE).ok_or_else(invalid)?)
                }
                "fan_dir" => {
                    report.fan_reverse = Some(match value {
                        "reverse" => true,
                        "forward" => false,
                        _ => return Err(invalid()),
                    })
                }
                _ => tracing::debug!("Ignoring unknown status key \"{key}\""),
            }
        }

        Ok(report)
    }
}

impl Echo {
    fn parse(line: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = line.split(',').collect();

        let [message, time, unit] = parts[..] else {
            return Err(ParseError::EchoFormat(line.to_owned()));
        };

        if unit.trim() != Message::TIME_UNIT {
            return Err(ParseError::EchoUnit(unit.to_owned()));
        }

        let time_ms = time
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite() && *t >= 0.)
            .filter(|t| Duration::try_from_secs_f64(t / 1000.).is_ok())
            .ok_or_else(|| ParseError::EchoTime(time.to_owned()))?;

        Ok(Echo {
            message: message.to_owned(),
            time_ms,
        })
    }

    /// Round-trip latency reported by the board, saturating for times no
    /// `Duration` can hold.
    pub fn latency(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_ms / 1000.).unwrap_or(Duration::MAX)
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// Parses a non-negative integer, clamping it to `max`.
fn parse_level(value: &str, max: u8) -> Option<u8> {
    value.parse::<u32>().ok().map(|v| v.min(max as u32) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_tokens() {
        let cases = [
            ("LED_ON", Command::LedOn),
            ("ALL_OFF", Command::AllOff),
            ("FAN_SPEED=128", Command::FanSpeed(128)),
            ("DOOR_SET_ANGLE=90", Command::DoorSetAngle(90)),
        ];

        for (token, command) in cases {
            assert_eq!(token.parse::<Command>(), Ok(command));
            assert_eq!(command.to_string(), token);
        }

        let mut buf = Vec::new();
        Command::DoorSetAngle(45).encode(&mut buf);
        assert_eq!(buf, b"DOOR_SET_ANGLE=45\n");
    }

    #[test]
    fn test_command_errors() {
        assert_eq!(
            "LIGHTS".parse::<Command>(),
            Err(CommandError::Unknown("LIGHTS".to_owned()))
        );
        assert!(matches!(
            "DOOR_SET_ANGLE=181".parse::<Command>(),
            Err(CommandError::Argument("DOOR_SET_ANGLE", _))
        ));
        assert!(matches!(
            "FAN_SPEED=-1".parse::<Command>(),
            Err(CommandError::Argument("FAN_SPEED", _))
        ));
        assert_eq!(Command::door_angle(200), Command::DoorSetAngle(180));
    }

    #[test]
    fn test_status() {
        let message = Message::parse("status:led=on,fan=128,door=45").unwrap();

        assert_eq!(
            message,
            Message::Status(StatusReport {
                led: Some(true),
                fan: Some(128),
                door: Some(45),
                ..Default::default()
            })
        );

        let message = Message::parse("status:fan=300,fan_dir=reverse,buzzer=off,temp=21,").unwrap();

        assert_eq!(
            message,
            Message::Status(StatusReport {
                fan: Some(255),
                fan_reverse: Some(true),
                buzzer: Some(false),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_malformed_status() {
        assert_eq!(
            Message::parse("status:led=on,fan"),
            Err(ParseError::StatusEntry("fan".to_owned()))
        );
        assert_eq!(
            Message::parse("status:door=wide"),
            Err(ParseError::StatusValue {
                key: "door".to_owned(),
                value: "wide".to_owned()
            })
        );
    }

    #[test]
    fn test_echo() {
        let Ok(Message::Echo(echo)) = Message::parse("hello,250,ms") else {
            panic!("Expected echo");
        };

        assert_eq!(echo.message, "hello");
        assert_eq!(echo.latency(), Duration::from_millis(250));

        assert_eq!(
            Message::parse("hello,250,s"),
            Err(ParseError::EchoUnit("s".to_owned()))
        );
        assert_eq!(
            Message::parse("hello,soon,ms"),
            Err(ParseError::EchoTime("soon".to_owned()))
        );
        assert_eq!(
            Message::parse("hello,1e300,ms"),
            Err(ParseError::EchoTime("1e300".to_owned()))
        );
        assert_eq!(
            Message::parse("a,b"),
            Err(ParseError::EchoFormat("a,b".to_owned()))
        );
    }

    #[test]
    fn test_other_lines() {
        assert_eq!(Message::parse("ERROR"), Ok(Message::PeerError));
        assert_eq!(
            Message::parse("ready"),
            Ok(Message::Text("ready".to_owned()))
        );
    }
}
