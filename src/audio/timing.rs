//! Engine time units and device period helpers
//!
//! The engine expresses every duration as a count of 100-nanosecond ticks
//! ("reference time"). Buffer duration, periodicity, stream latency and the
//! device periods all use this unit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Ticks per second in reference time
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks per millisecond in reference time
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

/// A duration in 100-nanosecond ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceTime(pub i64);

impl ReferenceTime {
    pub const ZERO: Self = Self(0);

    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    pub const fn from_millis(ms: i64) -> Self {
        Self(ms * TICKS_PER_MILLISECOND)
    }

    pub const fn ticks(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Convert to a std duration; negative values clamp to zero
    pub fn as_duration(self) -> Duration {
        let ticks = self.0.max(0) as u64;
        Duration::from_nanos(ticks.saturating_mul(100))
    }

    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / TICKS_PER_MILLISECOND as f64
    }

    /// Number of frames this duration covers at `sample_rate`, rounded up
    pub fn to_frames(self, sample_rate: u32) -> u32 {
        if self.0 <= 0 || sample_rate == 0 {
            return 0;
        }
        let numerator = self.0 as u128 * sample_rate as u128;
        let frames = numerator.div_ceil(TICKS_PER_SECOND as u128);
        frames.min(u32::MAX as u128) as u32
    }

    /// Duration of `frames` at `sample_rate`
    pub fn from_frames(frames: u32, sample_rate: u32) -> Self {
        if sample_rate == 0 {
            return Self::ZERO;
        }
        Self((frames as i64 * TICKS_PER_SECOND) / sample_rate as i64)
    }
}

impl From<Duration> for ReferenceTime {
    fn from(d: Duration) -> Self {
        let ticks = d.as_nanos() / 100;
        Self(ticks.min(i64::MAX as u128) as i64)
    }
}

impl fmt::Display for ReferenceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} ms", self.as_millis_f64())
    }
}

/// Default and minimum scheduling periods reported by one engine query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePeriod {
    /// Period the engine uses for shared-mode streams
    pub default: ReferenceTime,
    /// Smallest period an exclusive-mode stream may request
    pub minimum: ReferenceTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_and_duration() {
        let t = ReferenceTime::from_millis(10);
        assert_eq!(t.ticks(), 100_000);
        assert_eq!(t.as_duration(), Duration::from_millis(10));
        assert_eq!(ReferenceTime::from(Duration::from_millis(3)), ReferenceTime(30_000));
    }

    #[test]
    fn test_frame_conversion() {
        // 10 ms at 48 kHz
        assert_eq!(ReferenceTime(100_000).to_frames(48000), 480);
        // 10 ms at 44.1 kHz rounds up from 441.0
        assert_eq!(ReferenceTime(100_000).to_frames(44100), 441);
        // 1 tick still needs a whole frame
        assert_eq!(ReferenceTime(1).to_frames(48000), 1);
        assert_eq!(ReferenceTime::from_frames(480, 48000), ReferenceTime(100_000));
        assert_eq!(ReferenceTime::ZERO.to_frames(48000), 0);
    }

    #[test]
    fn test_out_of_range_clamps() {
        assert_eq!(ReferenceTime(-5).as_duration(), Duration::ZERO);
        assert_eq!(ReferenceTime(-5).to_frames(48000), 0);
        assert_eq!(
            ReferenceTime(i64::MAX).as_duration(),
            Duration::from_nanos(u64::MAX)
        );
    }
}
