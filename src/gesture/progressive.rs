use std::time::{Duration, Instant};

use strum::Display;

use crate::{devices::Devices, protocol::Command};

use super::FingerState;

/* == Definitions == */

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Increase,
    Decrease,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Target {
    Servo,
    Fan,
}

/// Continuous adjustment applied while a pattern is held past the debounce.
pub struct ProgressiveControl {
    pub pattern: FingerState,
    pub action: Action,
    pub target: Target,
    pub step: u8,
}

pub const PROGRESSIVE_CONTROLS: [ProgressiveControl; 4] = [
    ProgressiveControl {
        pattern: FingerState::from_bits(0b11111),
        action: Action::Increase,
        target: Target::Servo,
        step: 5,
    },
    ProgressiveControl {
        pattern: FingerState::from_bits(0b00000),
        action: Action::Decrease,
        target: Target::Servo,
        step: 5,
    },
    ProgressiveControl {
        pattern: FingerState::from_bits(0b10101),
        action: Action::Increase,
        target: Target::Fan,
        step: 25,
    },
    ProgressiveControl {
        pattern: FingerState::from_bits(0b01010),
        action: Action::Decrease,
        target: Target::Fan,
        step: 25,
    },
];

/// Current servo angle and fan speed that progressive steps start from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Levels {
    pub servo_angle: u8,
    pub fan_speed: u8,
}

/// Tracks how long a progressive pattern has been held. Once held beyond the
/// debounce, every call to [`ProgressiveTracker::update`] applies one step.
#[derive(Debug)]
pub struct ProgressiveTracker {
    debounce: Duration,
    held: Option<(FingerState, Instant)>,
    levels: Levels,
}

/* == Implementations == */

impl ProgressiveControl {
    pub fn lookup(state: FingerState) -> Option<&'static ProgressiveControl> {
        PROGRESSIVE_CONTROLS.iter().find(|c| c.pattern == state)
    }
}

impl Target {
    pub fn max(self) -> u8 {
        match self {
            Target::Servo => Command::MAX_DOOR_ANGLE,
            Target::Fan => Command::MAX_FAN_SPEED,
        }
    }
}

impl Levels {
    fn get_mut(&mut self, target: Target) -> &mut u8 {
        match target {
            Target::Servo => &mut self.servo_angle,
            Target::Fan => &mut self.fan_speed,
        }
    }
}

impl ProgressiveTracker {
    pub fn new(debounce: Duration, devices: &Devices) -> Self {
        ProgressiveTracker {
            debounce,
            held: None,
            levels: Levels {
                servo_angle: devices.door_angle(),
                fan_speed: devices.fan_speed(),
            },
        }
    }

    pub fn levels(&self) -> Levels {
        self.levels
    }

    /// Adopts the device model's door angle and fan speed.
    pub fn sync(&mut self, devices: &Devices) {
        self.levels.servo_angle = devices.door_angle();
        self.levels.fan_speed = devices.fan_speed();
    }

    /// Processes one tick. `state` is `None` when no hand is visible.
    pub fn update(&mut self, state: Option<FingerState>, now: Instant) -> Option<Command> {
        let Some(control) = state.and_then(ProgressiveControl::lookup) else {
            self.held = None;
            return None;
        };

        let since = match self.held {
            Some((pattern, since)) if pattern == control.pattern => since,
            _ => {
                self.held = Some((control.pattern, now));
                now
            }
        };

        if now.duration_since(since) <= self.debounce {
            return None;
        }

        Some(self.step(control))
    }

    fn step(&mut self, control: &ProgressiveControl) -> Command {
        let level = self.levels.get_mut(control.target);

        *level = match control.action {
            Action::Increase => level.saturating_add(control.step).min(control.target.max()),
            Action::Decrease => level.saturating_sub(control.step),
        };

        match control.target {
            Target::Servo => Command::DoorSetAngle(*level),
            Target::Fan => Command::FanSpeed(*level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    fn tracker() -> ProgressiveTracker {
        ProgressiveTracker::new(Duration::from_millis(500), &Devices::new())
    }

    #[test]
    fn test_open_hand_raises_servo_until_clamped() {
        let mut tracker = tracker();
        let open = Some(FingerState::from_bits(0b11111));
        let start = Instant::now();

        let commands: Vec<_> = (0..30)
            .map(|i| tracker.update(open, start + TICK * i))
            .collect();

        // Nothing until the debounce has strictly elapsed
        assert!(commands[..=5].iter().all(Option::is_none));
        assert_eq!(commands[6], Some(Command::DoorSetAngle(95)));
        assert_eq!(commands[7], Some(Command::DoorSetAngle(100)));

        // 90 -> 180 takes 18 steps, then stays clamped
        assert_eq!(commands[23], Some(Command::DoorSetAngle(180)));
        assert_eq!(commands[29], Some(Command::DoorSetAngle(180)));
        assert_eq!(tracker.levels().servo_angle, 180);
    }

    #[test]
    fn test_clamps_at_boundaries() {
        let mut tracker = tracker();
        let start = Instant::now();
        let late = start + Duration::from_secs(1);

        tracker.levels.servo_angle = 178;
        tracker.update(Some(FingerState::from_bits(0b11111)), start);
        assert_eq!(
            tracker.update(Some(FingerState::from_bits(0b11111)), late),
            Some(Command::DoorSetAngle(180))
        );

        let fan_down = Some(FingerState::from_bits(0b01010));
        tracker.levels.fan_speed = 10;
        tracker.update(fan_down, start);
        assert_eq!(tracker.update(fan_down, late), Some(Command::FanSpeed(0)));

        let fan_up = Some(FingerState::from_bits(0b10101));
        tracker.levels.fan_speed = 250;
        tracker.update(fan_up, start);
        assert_eq!(tracker.update(fan_up, late), Some(Command::FanSpeed(255)));
    }

    #[test]
    fn test_pattern_change_resets_timer() {
        let mut tracker = tracker();
        let start = Instant::now();
        let fan_up = Some(FingerState::from_bits(0b10101));
        let servo_up = Some(FingerState::from_bits(0b11111));

        tracker.update(fan_up, start);
        assert_eq!(tracker.update(servo_up, start + TICK * 6), None);
        assert_eq!(tracker.update(servo_up, start + TICK * 11), None);
        assert!(tracker.update(servo_up, start + TICK * 12).is_some());

        // Losing the hand or showing an unrelated pattern also resets
        tracker.update(None, start + TICK * 13);
        assert_eq!(tracker.update(servo_up, start + TICK * 14), None);
        tracker.update(Some(FingerState::from_bits(0b01100)), start + TICK * 15);
        assert_eq!(tracker.update(servo_up, start + TICK * 16), None);
    }

    #[test]
    fn test_sync_from_devices() {
        let mut devices = Devices::new();
        let mut tracker = tracker();

        devices.apply_command(&Command::FanOn);
        devices.apply_command(&Command::DoorClose);
        tracker.sync(&devices);

        assert_eq!(
            tracker.levels(),
            Levels {
                servo_angle: 0,
                fan_speed: 255
            }
        );
    }
}
