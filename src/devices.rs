use strum::{Display, EnumCount};

use crate::protocol::{Command, StatusReport};

/* == Definitions == */

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumCount)]
pub enum DeviceKind {
    #[strum(serialize = "Luces")]
    Lights,
    #[strum(serialize = "Ventilador")]
    Fan,
    #[strum(serialize = "Alarma")]
    Alarm,
    #[strum(serialize = "Puerta")]
    Door,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Colour {
    White,
    Green,
    Red,
    Blue,
    Yellow,
    Orange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeviceState {
    pub kind: DeviceKind,
    pub state: String,
    pub value: Option<u8>,
    pub max: Option<u8>,
    pub colour: Colour,
}

/// Last known state of every controllable device.
///
/// Updated optimistically by [`Devices::apply_command`] once a command has
/// been written, and overwritten by [`Devices::apply_status`] whenever the
/// board reports its actual state.
#[derive(Clone, Debug, PartialEq)]
pub struct Devices {
    devices: [DeviceState; DeviceKind::COUNT],
    fan_reverse: bool,
}

/* == Implementations == */

impl DeviceKind {
    // Ordered by discriminant
    pub const ALL: [DeviceKind; DeviceKind::COUNT] = [
        DeviceKind::Lights,
        DeviceKind::Fan,
        DeviceKind::Alarm,
        DeviceKind::Door,
    ];

    pub fn icon(self) -> &'static str {
        match self {
            DeviceKind::Lights => "💡",
            DeviceKind::Fan => "🌀",
            DeviceKind::Alarm => "🚨",
            DeviceKind::Door => "🚪",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl DeviceState {
    fn initial(kind: DeviceKind) -> Self {
        let (state, value, max, colour) = match kind {
            DeviceKind::Lights => ("OFF", None, None, Colour::Red),
            DeviceKind::Fan => ("OFF", Some(0), Some(Command::MAX_FAN_SPEED), Colour::Red),
            DeviceKind::Alarm => ("OFF", None, None, Colour::Red),
            DeviceKind::Door => (
                "90°",
                Some(Devices::DEFAULT_DOOR_ANGLE),
                Some(Command::MAX_DOOR_ANGLE),
                Colour::Blue,
            ),
        };

        DeviceState {
            kind,
            state: state.to_owned(),
            value,
            max,
            colour,
        }
    }

    /// Stores a numeric value clamped to `[0, max]`, returning the stored value.
    fn set_value(&mut self, value: u8) -> u8 {
        let value = self.max.map_or(value, |max| value.min(max));
        self.value = Some(value);
        value
    }

    /// Fraction of the declared range, for gauges.
    pub fn ratio(&self) -> Option<f64> {
        match (self.value, self.max) {
            (Some(value), Some(max)) if max > 0 => Some(value as f64 / max as f64),
            _ => None,
        }
    }
}

impl Devices {
    pub const DEFAULT_DOOR_ANGLE: u8 = 90;
    pub const OPEN_DOOR_ANGLE: u8 = Command::MAX_DOOR_ANGLE;
    pub const CLOSED_DOOR_ANGLE: u8 = 0;

    pub fn new() -> Self {
        Devices {
            devices: DeviceKind::ALL.map(DeviceState::initial),
            fan_reverse: false,
        }
    }

    pub fn get(&self, kind: DeviceKind) -> &DeviceState {
        &self.devices[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceState> {
        self.devices.iter()
    }

    pub fn door_angle(&self) -> u8 {
        self.get(DeviceKind::Door)
            .value
            .unwrap_or(Self::DEFAULT_DOOR_ANGLE)
    }

    pub fn fan_speed(&self) -> u8 {
        self.get(DeviceKind::Fan).value.unwrap_or(0)
    }

    /// Optimistic update after `command` has been written to the board.
    pub fn apply_command(&mut self, command: &Command) {
        match *command {
            Command::LedOn => self.set_lights(true),
            Command::LedOff => self.set_lights(false),
            Command::FanOn => self.set_fan(Command::MAX_FAN_SPEED, false),
            Command::FanOff => self.set_fan(0, false),
            Command::FanSpeed(speed) => self.set_fan(speed, self.fan_reverse),
            Command::FanReverse => self.set_fan(Command::MAX_FAN_SPEED, true),
            Command::DoorOpen => self.set_door(Self::OPEN_DOOR_ANGLE),
            Command::DoorClose => self.set_door(Self::CLOSED_DOOR_ANGLE),
            Command::DoorSetAngle(angle) => self.set_door(angle),
            Command::BuzzerOn => self.set_alarm(true),
            Command::AllOff => *self = Devices::new(),
        }
    }

    /// Authoritative update from a board status report. Only the reported
    /// keys are overwritten.
    pub fn apply_status(&mut self, report: &StatusReport) {
        if let Some(on) = report.led {
            self.set_lights(on);
        }

        if let Some(on) = report.buzzer {
            self.set_alarm(on);
        }

        if report.fan.is_some() || report.fan_reverse.is_some() {
            let speed = report.fan.unwrap_or_else(|| self.fan_speed());
            let reverse = report.fan_reverse.unwrap_or(self.fan_reverse);
            self.set_fan(speed, reverse);
        }

        if let Some(angle) = report.door {
            self.set_door(angle);
        }
    }

    fn device_mut(&mut self, kind: DeviceKind) -> &mut DeviceState {
        &mut self.devices[kind.index()]
    }

    fn set_lights(&mut self, on: bool) {
        let lights = self.device_mut(DeviceKind::Lights);
        lights.state = on_off(on).to_owned();
        lights.colour = if on { Colour::Green } else { Colour::Red };
    }

    fn set_alarm(&mut self, on: bool) {
        let alarm = self.device_mut(DeviceKind::Alarm);
        alarm.state = on_off(on).to_owned();
        alarm.colour = if on { Colour::Orange } else { Colour::Red };
    }

    fn set_fan(&mut self, speed: u8, reverse: bool) {
        self.fan_reverse = reverse;

        let fan = self.device_mut(DeviceKind::Fan);
        let speed = fan.set_value(speed);

        fan.state = format!("{speed}/{}", Command::MAX_FAN_SPEED);

        if reverse {
            fan.state.push_str(" (R)");
        }

        fan.colour = match (reverse, speed) {
            (true, 1..) => Colour::Orange,
            (false, 1..) => Colour::Green,
            (_, 0) => Colour::Red,
        };
    }

    fn set_door(&mut self, angle: u8) {
        let door = self.device_mut(DeviceKind::Door);
        let angle = door.set_value(angle);
        door.state = format!("{angle}°");
    }
}

impl Default for Devices {
    fn default() -> Self {
        Devices::new()
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}
