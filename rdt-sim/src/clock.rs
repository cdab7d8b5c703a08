//! Virtual time for the simulator
//!
//! All simulated events are stamped with a [`SimTime`], the offset from the
//! start of the run with microsecond resolution. Nothing here reads the
//! wall clock, so runs are reproducible.

use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

/// Virtual timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

impl SimTime {
    /// Start of the simulation
    pub const ZERO: SimTime = SimTime(0);

    /// Create a timestamp from microseconds since the start
    #[inline]
    pub fn from_micros(micros: u64) -> Self {
        SimTime(micros)
    }

    /// Microseconds since the start
    #[inline]
    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Time elapsed since the start
    #[inline]
    pub fn since_start(&self) -> Duration {
        Duration::from_micros(self.0)
    }

    /// Duration since an earlier timestamp, zero if `earlier` is later
    #[inline]
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, duration: Duration) -> SimTime {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        SimTime(self.0.saturating_add(micros))
    }
}

impl Sub<Duration> for SimTime {
    type Output = SimTime;

    fn sub(self, duration: Duration) -> SimTime {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        SimTime(self.0.saturating_sub(micros))
    }
}

impl Sub for SimTime {
    type Output = Duration;

    fn sub(self, other: SimTime) -> Duration {
        self.duration_since(other)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0 as f64 / 1_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let t0 = SimTime::ZERO;
        let t1 = t0 + Duration::from_millis(300);
        assert_eq!(t1.as_micros(), 300_000);
        assert_eq!(t1 - t0, Duration::from_millis(300));
        assert_eq!(t0 - t1, Duration::ZERO);
        assert_eq!(t1.since_start(), Duration::from_millis(300));
        assert_eq!(t1 - Duration::from_millis(100), SimTime::from_micros(200_000));
        assert_eq!(t0 - Duration::from_millis(1), SimTime::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(SimTime::from_micros(1_250_000).to_string(), "1.250s");
    }
}
