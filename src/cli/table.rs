use color_eyre::owo_colors::OwoColorize;

use crate::gesture::{GESTURE_COMMANDS, progressive::PROGRESSIVE_CONTROLS};

pub fn print() {
    println!("{}", "Gestures".bold());

    for gesture in &GESTURE_COMMANDS {
        println!(
            "  {}  {:<20} {}",
            gesture.pattern.cyan(),
            gesture.command.to_string(),
            gesture.description
        );
    }

    println!();
    println!("{}", "Progressive controls (held)".bold());

    for control in &PROGRESSIVE_CONTROLS {
        println!(
            "  {}  {:<8} {:<5} step {}",
            control.pattern.cyan(),
            control.action.to_string(),
            control.target.to_string(),
            control.step
        );
    }
}
