use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{Fraction, Result, WindowError};

/// Position of one edge of a carrier on the three timeline axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarrierTiming {
    /// Seconds on the audio clock.
    pub time: f64,
    /// Musical position; absent for timeline modes without a beat grid.
    #[serde(default)]
    pub beat: Option<Fraction>,
    /// Display-space scroll coordinate computed by the timeline processor.
    pub roll: f64,
}

impl CarrierTiming {
    pub const POSITIVE_INFINITY: CarrierTiming = CarrierTiming {
        time: f64::INFINITY,
        beat: None,
        roll: f64::INFINITY,
    };

    pub const NEGATIVE_INFINITY: CarrierTiming = CarrierTiming {
        time: f64::NEG_INFINITY,
        beat: None,
        roll: f64::NEG_INFINITY,
    };

    pub fn new(time: f64, beat: Option<Fraction>, roll: f64) -> Self {
        Self { time, beat, roll }
    }

    /// Timing whose roll equals its time, handy when the scroll is linear.
    pub fn at(time: f64) -> Self {
        Self::new(time, None, time)
    }

    pub fn is_positive_infinity(&self) -> bool {
        self.time == f64::INFINITY || self.roll == f64::INFINITY
    }

    pub fn is_negative_infinity(&self) -> bool {
        self.time == f64::NEG_INFINITY || self.roll == f64::NEG_INFINITY
    }
}

/// Selects which pool instantiates visuals for a carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(pub u32);

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable index of a carrier inside the arena handed to
/// [`RealizationWindow::load`](crate::RealizationWindow::load).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarrierId(pub u32);

impl CarrierId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

fn default_speed_scale() -> f64 {
    1.0
}

/// Timeline-bound logical object (a note, a bar line, ...).
///
/// Carriers are built by the timeline processor and must not change once they
/// are handed to a window: the window's sorted lists are computed from these
/// fields at load time and are never re-validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Carrier {
    pub start: CarrierTiming,
    pub end: CarrierTiming,
    /// Multiplier on how fast this carrier scrolls relative to the play position.
    #[serde(default = "default_speed_scale")]
    pub speed_scale: f64,
    pub category: Category,
}

impl Carrier {
    pub fn new(start: CarrierTiming, end: CarrierTiming, category: Category) -> Self {
        Self {
            start,
            end,
            speed_scale: 1.0,
            category,
        }
    }

    pub fn with_speed_scale(mut self, speed_scale: f64) -> Self {
        self.speed_scale = speed_scale;
        self
    }

    pub fn start_time(&self) -> f64 {
        self.start.time
    }

    pub fn end_time(&self) -> f64 {
        self.end.time
    }

    pub fn start_roll(&self) -> f64 {
        self.start.roll
    }

    pub fn end_roll(&self) -> f64 {
        self.end.roll
    }

    pub fn start_beat(&self) -> Option<Fraction> {
        self.start.beat
    }

    pub fn end_beat(&self) -> Option<Fraction> {
        self.end.beat
    }

    pub fn length_time(&self) -> f64 {
        self.end.time - self.start.time
    }

    pub fn length_roll(&self) -> f64 {
        self.end.roll - self.start.roll
    }

    /// `None` when either beat is missing or the length does not fit in 64 bits.
    pub fn length_beat(&self) -> Option<Fraction> {
        self.end.beat?.checked_sub(self.start.beat?)
    }

    fn edge_roll(&self, use_start: bool) -> f64 {
        if use_start {
            self.start.roll
        } else {
            self.end.roll
        }
    }

    /// Distance from `display_position` to one edge, in this carrier's scroll speed.
    pub fn scaled_delta_roll(&self, display_position: f64, use_start: bool) -> f64 {
        (self.edge_roll(use_start) - display_position) * self.speed_scale
    }

    /// Display position at which one edge sits `delta_roll` away.
    ///
    /// Inverse of [`Carrier::scaled_delta_roll`]; sorting by this value orders
    /// carriers by the moment they cross a window boundary.
    pub fn target_roll(&self, delta_roll: f64, use_start: bool) -> f64 {
        self.edge_roll(use_start) - delta_roll / self.speed_scale
    }

    pub fn cmp_start_time(a: &Carrier, b: &Carrier) -> Ordering {
        a.start.time.total_cmp(&b.start.time)
    }

    pub fn cmp_start_roll(a: &Carrier, b: &Carrier) -> Ordering {
        a.start.roll.total_cmp(&b.start.roll)
    }

    pub fn cmp_end_time(a: &Carrier, b: &Carrier) -> Ordering {
        a.end.time.total_cmp(&b.end.time)
    }

    pub fn cmp_end_roll(a: &Carrier, b: &Carrier) -> Ordering {
        a.end.roll.total_cmp(&b.end.roll)
    }

    /// Checks the construction invariants; `index` is only used for reporting.
    pub fn validate(&self, index: usize) -> Result<()> {
        let fail = |reason: &str| {
            Err(WindowError::InvalidCarrier {
                index,
                reason: reason.to_string(),
            })
        };

        if self.start.time.is_nan() || self.end.time.is_nan() {
            return fail("time is NaN");
        }
        if self.start.roll.is_nan() || self.end.roll.is_nan() {
            return fail("roll is NaN");
        }
        if self.start.time > self.end.time {
            return fail("start time is after end time");
        }
        if self.start.roll > self.end.roll {
            return fail("start roll is after end roll");
        }
        if let (Some(start), Some(end)) = (self.start.beat, self.end.beat) {
            if start > end {
                return fail("start beat is after end beat");
            }
        }
        if !(self.speed_scale.is_finite() && self.speed_scale > 0.0) {
            return fail("speed scale must be finite and positive");
        }
        Ok(())
    }
}
