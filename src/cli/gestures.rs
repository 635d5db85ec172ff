use std::{
    future,
    io::{self, IsTerminal},
    time::{Duration, Instant},
};

use clap::Parser;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use eyre::Result;
use futures::StreamExt;
use ratatui::DefaultTerminal;
use tokio::{
    select,
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};

use crate::{
    config::GestureConfig,
    devices::Devices,
    dispatch::{Dispatch, Dispatcher},
    gesture::{
        Classification, FingerState, HandLandmarks, ProgressiveTracker, classify,
        source::LandmarkSource,
    },
    hardware::{Received, SerialLink, Transmit},
    protocol::{Command, Message},
    ui::{
        Annotation, EventLog,
        dashboard::{self, DashboardView},
    },
};

use super::CommonOpts;

#[derive(Clone, Debug, Parser)]
pub struct GestureOpts {
    #[command(flatten)]
    common: CommonOpts,

    /// Processing rate in ticks per second, overriding the config file.
    #[arg(long)]
    fps: Option<u32>,
}

pub struct Gestures;

/// State of the gesture controller between ticks.
pub struct GestureApp<L> {
    dispatcher: Dispatcher<L>,
    devices: Devices,
    tracker: ProgressiveTracker,
    finger_state: Option<FingerState>,
    classification: Classification,
    command: Option<Command>,
    events: EventLog,
}

enum Input {
    Tick,
    Key(Option<std::io::Result<Event>>),
    Frame(Result<Option<Option<HandLandmarks>>>),
    Serial(Option<Received>),
}

impl Gestures {
    pub async fn run(opts: GestureOpts) -> Result<()> {
        let mut config = opts.common.load().await?;

        if let Some(fps) = opts.fps {
            config.gestures.fps = fps;
            config.validate()?;
        }

        let link = SerialLink::open(&config.serial).await;

        let serial = link
            .spawn_reader()
            .inspect_err(|e| tracing::warn!("Not listening to the board: {e}"))
            .ok();

        let source = landmark_source(&config.gestures, io::stdin().is_terminal())?;
        let mut app = GestureApp::new(link, config.gestures.debounce());

        if source.is_none() {
            tracing::warn!("stdin is a terminal and no landmark command is set, gestures disabled");
            app.events.push(Annotation::Error, NO_LANDMARKS);
        }

        let mut terminal = ratatui::init();
        let result = app
            .event_loop(&mut terminal, source, serial, config.gestures.tick_period())
            .await;
        ratatui::restore();

        result
    }
}

impl GestureApp<SerialLink> {
    async fn event_loop(
        &mut self,
        terminal: &mut DefaultTerminal,
        mut source: Option<LandmarkSource>,
        mut serial: Option<mpsc::Receiver<Received>>,
        period: Duration,
    ) -> Result<()> {
        let mut keys = EventStream::new();
        let mut timer = interval(period);
        let mut hand: Option<HandLandmarks> = None;

        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let input = select! {
                _ = timer.tick() => Input::Tick,
                key = keys.next() => Input::Key(key),
                frame = next_frame(&mut source) => Input::Frame(frame),
                event = recv(&mut serial) => Input::Serial(event),
            };

            match input {
                Input::Tick => {
                    self.tick(hand.as_ref(), Instant::now());
                    terminal.draw(|frame| dashboard::render(frame, &self.view()))?;
                }

                Input::Key(Some(Ok(Event::Key(key)))) => {
                    if !self.key(key) {
                        break;
                    }
                }

                Input::Key(Some(Ok(_))) => {}
                Input::Key(Some(Err(e))) => return Err(e.into()),
                Input::Key(None) => break,

                Input::Frame(Ok(Some(frame))) => hand = frame,

                Input::Frame(Ok(None)) => {
                    tracing::info!("Landmark stream ended");
                    self.events.push(Annotation::Error, "Landmark stream ended");
                    source = None;
                    hand = None;
                }

                Input::Frame(Err(e)) => {
                    tracing::error!("Landmark stream failed: {e}");
                    self.events.push(Annotation::Error, format!("Landmark stream failed: {e}"));
                    source = None;
                    hand = None;
                }

                Input::Serial(Some(event)) => {
                    if !self.receive(event) {
                        serial = None;
                    }
                }

                Input::Serial(None) => serial = None,
            }
        }

        Ok(())
    }

    fn view(&self) -> DashboardView<'_> {
        let link = self.dispatcher.link();

        DashboardView {
            link: link.name(),
            connected: link.is_connected(),
            finger_state: self.finger_state,
            classification: self.classification,
            command: self.command,
            levels: self.tracker.levels(),
            devices: &self.devices,
            events: &self.events,
        }
    }
}

impl<L: Transmit> GestureApp<L> {
    pub fn new(link: L, debounce: Duration) -> Self {
        let devices = Devices::new();

        GestureApp {
            dispatcher: Dispatcher::new(link),
            tracker: ProgressiveTracker::new(debounce, &devices),
            devices,
            finger_state: None,
            classification: Classification::UNRECOGNISED,
            command: None,
            events: EventLog::default(),
        }
    }

    pub fn devices(&self) -> &Devices {
        &self.devices
    }

    /// Processes one tick with the most recent hand, if any is visible.
    pub fn tick(&mut self, hand: Option<&HandLandmarks>, now: Instant) {
        self.tick_state(hand.map(HandLandmarks::finger_state), now);
    }

    /// A held progressive pattern takes over from the gesture's own command
    /// once the debounce has elapsed.
    pub fn tick_state(&mut self, state: Option<FingerState>, now: Instant) {
        self.finger_state = state;
        self.classification = state.map_or(Classification::UNRECOGNISED, classify);

        let progressive = self.tracker.update(state, now);
        self.command = progressive.or(self.classification.command);

        if let Some(command) = self.command {
            self.send(command);
        }
    }

    /// Handles a key press, returning `false` when the user asked to quit.
    pub fn key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return true;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return false,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
            code => {
                if let Some(command) = key_command(code) {
                    self.send(command);
                }
            }
        }

        true
    }

    /// Handles a reader event, returning `false` once the reader has stopped.
    pub fn receive(&mut self, event: Received) -> bool {
        let line = match event {
            Received::Line(line) => line,

            Received::Undecodable(e) => {
                self.events.push(Annotation::Error, e.to_string());
                return true;
            }

            Received::Closed(e) => {
                self.events.push(Annotation::Error, format!("Serial reader stopped: {e}"));
                return false;
            }
        };

        match Message::parse(&line) {
            Ok(Message::Status(report)) => {
                tracing::debug!("Status {report:?}");
                self.devices.apply_status(&report);
                self.tracker.sync(&self.devices);
                self.events.push(Annotation::Received, line);
            }

            Ok(Message::PeerError) => {
                self.events.push(Annotation::Error, "The board rejected a command");
            }

            Ok(Message::Echo(_) | Message::Text(_)) => self.events.push(Annotation::Received, line),

            Err(e) => {
                tracing::warn!("{e}");
                self.events.push(Annotation::Error, format!("{e}: {line}"));
            }
        }

        true
    }

    fn send(&mut self, command: Command) {
        match self.dispatcher.dispatch(command, &mut self.devices) {
            Ok(Dispatch::Sent) => {
                self.tracker.sync(&self.devices);
                self.events.push(Annotation::Sent, command.to_string());
            }

            Ok(Dispatch::Suppressed) => {}

            Err(e) => self.events.push(Annotation::Error, format!("{command}: {e}")),
        }
    }
}

/// Fixed keyboard shortcuts, usable with or without a hand in view.
pub fn key_command(code: KeyCode) -> Option<Command> {
    let command = match code {
        KeyCode::Char('1') => Command::LedOn,
        KeyCode::Char('2') => Command::LedOff,
        KeyCode::Char('3') => Command::FanOn,
        KeyCode::Char('4') => Command::FanOff,
        KeyCode::Char('5') => Command::BuzzerOn,
        KeyCode::Char('6') => Command::DoorOpen,
        KeyCode::Char('7') => Command::DoorClose,
        KeyCode::Char('0') => Command::AllOff,
        KeyCode::Char('r') => Command::FanReverse,
        _ => return None,
    };

    Some(command)
}

const NO_LANDMARKS: &str = "Gestures disabled: pipe landmark frames into stdin or set gestures.landmarks";

/// Picks where landmark frames come from. A terminal stdin is left to the
/// keyboard, since both would read the same descriptor.
fn landmark_source(config: &GestureConfig, stdin_is_terminal: bool) -> Result<Option<LandmarkSource>> {
    match &config.landmarks {
        Some(command) => LandmarkSource::spawn(command).map(Some),
        None if stdin_is_terminal => Ok(None),
        None => Ok(Some(LandmarkSource::stdin())),
    }
}

async fn next_frame(source: &mut Option<LandmarkSource>) -> Result<Option<Option<HandLandmarks>>> {
    match source {
        Some(source) => source.next_frame().await,
        None => future::pending().await,
    }
}

async fn recv(rx: &mut Option<mpsc::Receiver<Received>>) -> Option<Received> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use crate::{devices::DeviceKind, dispatch::tests::MockLink, misc::buf::DecodeError};

    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    fn app() -> GestureApp<MockLink> {
        GestureApp::new(MockLink::default(), Duration::from_millis(500))
    }

    fn pattern(s: &str) -> Option<FingerState> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn test_held_gesture_sends_once() {
        let mut app = app();
        let start = Instant::now();

        for i in 0..5 {
            app.tick_state(pattern("01100"), start + TICK * i);
        }

        assert_eq!(*app.dispatcher.link().lines.borrow(), ["FAN_ON\n"]);
        assert_eq!(app.devices().fan_speed(), 255);
        assert_eq!(app.tracker.levels().fan_speed, 255);
    }

    #[test]
    fn test_open_hand_then_progressive_servo() {
        let mut app = app();
        let start = Instant::now();

        for i in 0..8 {
            app.tick_state(pattern("11111"), start + TICK * i);
        }

        assert_eq!(
            *app.dispatcher.link().lines.borrow(),
            ["LED_ON\n", "DOOR_SET_ANGLE=95\n", "DOOR_SET_ANGLE=100\n"]
        );
        assert_eq!(app.devices().door_angle(), 100);
        assert_eq!(app.command, Some(Command::DoorSetAngle(100)));
    }

    #[test]
    fn test_unrecognised_and_missing_hand_send_nothing() {
        let mut app = app();
        let start = Instant::now();

        app.tick_state(pattern("10110"), start);
        assert_eq!(app.classification, Classification::UNRECOGNISED);

        app.tick_state(None, start + TICK);
        assert_eq!(app.command, None);
        assert!(app.dispatcher.link().lines.borrow().is_empty());
    }

    #[test]
    fn test_keys_go_through_dispatcher() {
        let mut app = app();
        let press = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);

        assert!(app.key(press('3')));
        assert!(app.key(press('3')));
        assert!(app.key(press('r')));
        assert!(app.key(press('x')));
        assert!(!app.key(press('q')));
        assert!(!app.key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));

        assert_eq!(*app.dispatcher.link().lines.borrow(), ["FAN_ON\n", "FAN_REVERSE\n"]);
        assert_eq!(app.devices().get(DeviceKind::Fan).state, "255/255 (R)");
    }

    #[test]
    fn test_status_overrides_state() {
        let mut app = app();

        assert!(app.receive(Received::Line("status:led=on,fan=128,door=45".to_owned())));

        assert_eq!(app.devices().get(DeviceKind::Lights).state, "ON");
        assert_eq!(app.devices().get(DeviceKind::Fan).state, "128/255");
        assert_eq!(app.devices().get(DeviceKind::Door).state, "45°");
        assert_eq!(app.tracker.levels().servo_angle, 45);
    }

    #[test]
    fn test_malformed_status_leaves_state_unchanged() {
        let mut app = app();

        assert!(app.receive(Received::Line("status:led=on,fan=fast".to_owned())));

        assert_eq!(*app.devices(), Devices::new());

        let errors: Vec<_> = app
            .events
            .iter()
            .filter(|e| e.annotation == Annotation::Error)
            .collect();

        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_stdin_is_not_a_landmark_source() {
        let config = GestureConfig::default();

        assert!(landmark_source(&config, true).unwrap().is_none());
        assert!(landmark_source(&config, false).unwrap().is_some());
    }

    #[test]
    fn test_undecodable_line_keeps_reading() {
        let mut app = app();
        let undecodable = DecodeError::InvalidUtf8(vec![0xc3, 0x28]);

        assert!(app.receive(Received::Undecodable(undecodable)));

        assert_eq!(*app.devices(), Devices::new());
        assert_eq!(app.events.len(), 1);
        assert!(app.events.iter().all(|e| e.annotation == Annotation::Error));

        assert!(app.receive(Received::Line("status:led=on".to_owned())));
        assert_eq!(app.devices().get(DeviceKind::Lights).state, "ON");
    }

    #[test]
    fn test_failed_write_is_reported() {
        let mut app = GestureApp::new(
            MockLink {
                fail: true,
                ..Default::default()
            },
            Duration::from_millis(500),
        );

        app.tick_state(pattern("00111"), Instant::now());

        assert_eq!(app.devices().door_angle(), Devices::DEFAULT_DOOR_ANGLE);
        assert_eq!(app.events.len(), 1);
        assert_eq!(key_command(KeyCode::Char('0')), Some(Command::AllOff));
    }
}
