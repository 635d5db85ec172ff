use std::{fmt::Display, time::Duration};

use color_eyre::owo_colors::OwoColorize;

pub mod buf;
pub mod serde;

// Small helper function to sleep for a given number of f32 seconds.
pub async fn sleep(seconds: f32) {
    tokio::time::sleep(Duration::from_secs_f32(seconds)).await;
}

pub struct ColourDot(pub bool);

impl Display for ColourDot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let char = '●';

        if self.0 {
            write!(f, "{}", char.bright_green())
        } else {
            write!(f, "{}", char.bright_red())
        }
    }
}
