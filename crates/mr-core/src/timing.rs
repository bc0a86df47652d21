//! Rational timebases and the per-stream timing read once at open time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rational number as reported by the codec library (timebases, frame rates).
///
/// A rational whose denominator is not positive, or whose numerator is
/// negative, is *invalid*. Libraries use `0/0` or `-1/-1` for "unknown", and
/// every consumer here treats those as degenerate rather than dividing by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /// The "unknown" rational.
    pub const INVALID: Rational = Rational { num: -1, den: -1 };

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Numerator may be zero, denominator may not.
    pub fn is_valid(&self) -> bool {
        self.den > 0 && self.num >= 0
    }

    /// Floating point value, or `None` when invalid.
    pub fn to_f64(&self) -> Option<f64> {
        self.is_valid()
            .then(|| f64::from(self.num) / f64::from(self.den))
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Timing facts of one stream. Read once when the source is opened and never
/// changed while it stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamTiming {
    pub time_base: Rational,
    pub avg_frame_rate: Rational,
    /// Duration in timebase units, when the container reports one.
    pub duration: Option<i64>,
    /// First timestamp in timebase units, when the container reports one.
    pub start_time: Option<i64>,
    /// Number of frames, when the container reports one.
    pub frame_count: Option<i64>,
}

impl StreamTiming {
    /// Average frame rate rounded to the nearest integer; 0 when unknown.
    ///
    /// Rounded because containers report rates such as 30.03 for 30 fps material.
    pub fn fps(&self) -> u32 {
        match self.avg_frame_rate.to_f64() {
            Some(rate) if rate.is_finite() && rate > 0.0 => rate.round() as u32,
            _ => 0,
        }
    }

    /// Timebase units covered by one frame, or `None` when either rational is
    /// degenerate or the result truncates to zero.
    pub fn frame_interval(&self) -> Option<i64> {
        let rate = self.avg_frame_rate.to_f64().filter(|r| *r > 0.0)?;
        let units = self.units_per_second_f64()?;
        let interval = (units / rate) as i64;
        (interval > 0).then_some(interval)
    }

    /// Timebase units covered by one second, or `None` when the timebase is
    /// degenerate.
    pub fn units_per_second(&self) -> Option<i64> {
        self.units_per_second_f64()
            .map(|units| units.round() as i64)
            .filter(|units| *units > 0)
    }

    /// Stream duration in seconds, 0.0 when unknown.
    pub fn total_seconds(&self) -> f64 {
        match (self.duration, self.time_base.to_f64()) {
            (Some(duration), Some(base)) if duration > 0 => duration as f64 * base,
            _ => 0.0,
        }
    }

    fn units_per_second_f64(&self) -> Option<f64> {
        if !self.time_base.is_valid() || self.time_base.num == 0 {
            return None;
        }
        Some(f64::from(self.time_base.den) / f64::from(self.time_base.num))
    }
}
