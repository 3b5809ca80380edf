use serde::{Deserialize, Serialize};

/// Values the external time source provides each tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayPosition {
    /// Current roll-space scroll position.
    pub display_position: f64,
    /// Current judge time in seconds.
    pub judge_time: f64,
}

impl PlayPosition {
    pub fn new(display_position: f64, judge_time: f64) -> Self {
        Self {
            display_position,
            judge_time,
        }
    }
}

/// Scripted time source with a linear scroll, used by the CLI and tests in
/// place of an audio clock.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackClock {
    pub time_seconds: f64,
    pub roll_per_second: f64,
    pub roll_offset: f64,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self {
            time_seconds: 0.0,
            roll_per_second: 1.0,
            roll_offset: 0.0,
        }
    }
}

impl PlaybackClock {
    pub fn new(roll_per_second: f64) -> Self {
        Self {
            roll_per_second,
            ..Self::default()
        }
    }

    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    /// Moves the clock by `delta` seconds; negative values rewind.
    pub fn advance(&mut self, delta: f64) {
        self.time_seconds += delta;
    }

    pub fn seek(&mut self, time_seconds: f64) {
        self.time_seconds = time_seconds;
    }

    pub fn display_position(&self) -> f64 {
        self.time_seconds * self.roll_per_second + self.roll_offset
    }

    pub fn position(&self) -> PlayPosition {
        PlayPosition::new(self.display_position(), self.time_seconds)
    }
}
