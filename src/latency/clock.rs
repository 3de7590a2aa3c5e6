//! Wall-clock access for the latency sampler.

use chrono::{DateTime, Timelike, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Minute of the hour, `0..=59`.
    fn minute(&self) -> u32 {
        self.now().minute()
    }
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// A clock frozen at the given minute of an arbitrary hour.
    /// Minutes past 59 wrap.
    pub fn at_minute(minute: u32) -> Self {
        let secs = i64::from(minute % 60) * 60;
        Self(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_minute() {
        assert_eq!(FixedClock::at_minute(0).minute(), 0);
        assert_eq!(FixedClock::at_minute(47).minute(), 47);
        assert_eq!(FixedClock::at_minute(61).minute(), 1);
    }

    #[test]
    fn test_system_clock_minute_in_range() {
        assert!(SystemClock.minute() < 60);
    }
}
