use serde::Deserialize;
use thiserror::Error;

use super::FingerState;

/// Hand landmark indices, following the 21-point hand model used by common
/// landmark detectors.
pub mod index {
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

/// Normalised image coordinates, `y` growing downwards.
#[derive(Copy, Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(from = "[f32; 3]")]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks(pub [Landmark; HandLandmarks::COUNT]);

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed landmark frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected {expected} landmarks, got {0}", expected = HandLandmarks::COUNT)]
    Count(usize),
}

#[derive(Deserialize)]
struct RawFrame {
    landmarks: Vec<Landmark>,
}

impl From<[f32; 3]> for Landmark {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Landmark { x, y, z }
    }
}

impl HandLandmarks {
    pub const COUNT: usize = 21;

    /// Fingers compared tip against the joint two segments below it.
    const FINGERS: [(usize, usize); 4] = [
        (index::INDEX_TIP, index::INDEX_PIP),
        (index::MIDDLE_TIP, index::MIDDLE_PIP),
        (index::RING_TIP, index::RING_PIP),
        (index::PINKY_TIP, index::PINKY_PIP),
    ];

    /// Parses one frame line: `{"landmarks": [[x, y, z], ...]}` for a
    /// detected hand, or `null` when no hand is visible.
    pub fn parse_frame(line: &str) -> Result<Option<Self>, FrameError> {
        let Some(frame) = serde_json::from_str::<Option<RawFrame>>(line)? else {
            return Ok(None);
        };

        let count = frame.landmarks.len();
        let landmarks = frame
            .landmarks
            .try_into()
            .map_err(|_| FrameError::Count(count))?;

        Ok(Some(HandLandmarks(landmarks)))
    }

    /// Thresholds the landmarks into a finger state. The thumb is raised when
    /// its tip lies left of its IP joint, the other fingers when the tip lies
    /// above the PIP joint.
    pub fn finger_state(&self) -> FingerState {
        let points = &self.0;
        let mut fingers = [false; FingerState::WIDTH];

        fingers[0] = points[index::THUMB_TIP].x < points[index::THUMB_IP].x;

        for (finger, (tip, pip)) in fingers[1..].iter_mut().zip(Self::FINGERS) {
            *finger = points[tip].y < points[pip].y;
        }

        FingerState::from_fingers(fingers)
    }
}
