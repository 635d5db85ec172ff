use std::{collections::VecDeque, fmt};

use chrono::{DateTime, Local};
use ratatui::style::Color;
use strum::Display;

use crate::devices::Colour;

pub mod dashboard;

/// Tag shown in front of every line of serial traffic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Annotation {
    Sent,
    Received,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub at: DateTime<Local>,
    pub annotation: Annotation,
    pub text: String,
    pub repeats: u32,
}

/// Bounded history of recent events, newest last. Identical consecutive
/// events are folded into one entry with a repeat count.
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<Event>,
    capacity: usize,
}

impl Annotation {
    pub fn colour(self) -> Colour {
        match self {
            Annotation::Sent => Colour::Blue,
            Annotation::Received => Colour::Green,
            Annotation::Error => Colour::Red,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.at.format("%H:%M:%S"),
            self.annotation,
            self.text
        )?;

        if self.repeats > 1 {
            write!(f, " (x{})", self.repeats)?;
        }

        Ok(())
    }
}

impl EventLog {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(capacity: usize) -> Self {
        EventLog {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, annotation: Annotation, text: impl Into<String>) {
        self.push_at(annotation, text.into(), Local::now());
    }

    fn push_at(&mut self, annotation: Annotation, text: String, at: DateTime<Local>) {
        if let Some(last) = self.events.back_mut() {
            if last.annotation == annotation && last.text == text {
                last.repeats += 1;
                last.at = at;
                return;
            }
        }

        if self.events.len() == self.capacity {
            self.events.pop_front();
        }

        self.events.push_back(Event {
            at,
            annotation,
            text,
            repeats: 1,
        });
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl From<Colour> for Color {
    fn from(colour: Colour) -> Self {
        match colour {
            Colour::White => Color::White,
            Colour::Green => Color::Green,
            Colour::Red => Color::Red,
            Colour::Blue => Color::Blue,
            Colour::Yellow => Color::Yellow,
            Colour::Orange => Color::Rgb(255, 165, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_events_are_folded() {
        let mut log = EventLog::default();

        log.push(Annotation::Received, "status:led=on");
        log.push(Annotation::Received, "status:led=on");
        log.push(Annotation::Sent, "status:led=on");

        let events: Vec<_> = log.iter().collect();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].repeats, 2);
        assert!(events[0].to_string().ends_with("[RECEIVED] status:led=on (x2)"));
        assert_eq!(events[1].repeats, 1);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = EventLog::new(2);

        for text in ["a", "b", "c"] {
            log.push(Annotation::Error, text);
        }

        let texts: Vec<_> = log.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["b", "c"]);
    }
}
