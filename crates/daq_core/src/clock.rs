//! Monotonic tick clock and timestamp rendering.
//!
//! The counter is advanced by an external tick driver (a periodic software
//! timer on the host, a timer interrupt on hardware) and can be read from any
//! context. Elapsed-time arithmetic tolerates one rollover of the counter.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use daq_common::timing::TICKS_PER_SECOND;

/// Monotonic counter of ticks since the clock was created.
pub struct Clock {
    ticks: AtomicU64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a clock whose counter already reads `ticks`.
    pub const fn starting_at(ticks: u64) -> Self {
        Self {
            ticks: AtomicU64::new(ticks),
        }
    }

    /// Advances the counter by one tick and returns the new reading.
    ///
    /// Called only by the tick driver. Wraps to zero after `u64::MAX`.
    #[inline(always)]
    pub fn tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    #[inline(always)]
    pub fn now(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Ticks passed since `since`, tolerating a counter rollover.
    pub fn elapsed(&self, since: u64) -> u64 {
        ticks_between(self.now(), since)
    }

    pub fn timestamp(&self) -> Timestamp {
        Timestamp::from_ticks(self.now())
    }
}

/// Ticks from `since` to `now`.
///
/// If `now` is behind `since` the counter rolled over in between and the
/// result is `now + (u64::MAX - since)`.
pub fn ticks_between(now: u64, since: u64) -> u64 {
    if now >= since {
        now - since
    } else {
        now + (u64::MAX - since)
    }
}

/// Wall-clock style rendering of a tick count, `HH:MM:SS.d`.
///
/// Hours wrap at 24 so every field stays two digits wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub tenths: u8,
}

impl Timestamp {
    pub fn from_ticks(ticks: u64) -> Self {
        let total_seconds = ticks / TICKS_PER_SECOND;
        let tenths = (ticks % TICKS_PER_SECOND) * 10 / TICKS_PER_SECOND;
        Self {
            hours: ((total_seconds / 3600) % 24) as u8,
            minutes: ((total_seconds / 60) % 60) as u8,
            seconds: (total_seconds % 60) as u8,
            tenths: tenths as u8,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{}",
            self.hours, self.minutes, self.seconds, self.tenths
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_advances_now() {
        let clock = Clock::new();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.now(), 2);
        assert_eq!(clock.elapsed(0), 2);
    }

    #[test]
    fn elapsed_without_rollover() {
        let clock = Clock::starting_at(500);
        assert_eq!(clock.elapsed(120), 380);
        assert_eq!(clock.elapsed(500), 0);
    }

    #[test]
    fn elapsed_across_rollover() {
        let since = u64::MAX - 3;
        let clock = Clock::starting_at(since);
        for _ in 0..6 {
            clock.tick();
        }
        let now = clock.now();
        assert_eq!(now, 2);
        assert_eq!(clock.elapsed(since), (u64::MAX - since) + now);
        assert_eq!(clock.elapsed(since), 5);
    }

    #[test]
    fn rollover_boundary_stays_monotonic() {
        assert_eq!(ticks_between(u64::MAX, u64::MAX - 1), 1);
        // MAX -> 0 is absorbed by the formula rather than counted.
        assert_eq!(ticks_between(0, u64::MAX - 1), 1);
        assert_eq!(ticks_between(1, u64::MAX - 1), 2);
    }

    #[test]
    fn timestamp_renders_fixed_width() {
        assert_eq!(Timestamp::from_ticks(0).to_string(), "00:00:00.0");
        assert_eq!(Timestamp::from_ticks(7).to_string(), "00:00:00.7");
        assert_eq!(Timestamp::from_ticks(615).to_string(), "00:01:01.5");

        let ticks = (3 * 3600 + 25 * 60 + 9) * TICKS_PER_SECOND + 4;
        assert_eq!(Timestamp::from_ticks(ticks).to_string(), "03:25:09.4");
    }

    #[test]
    fn timestamp_hours_wrap_daily() {
        let ticks = 25 * 3600 * TICKS_PER_SECOND;
        let ts = Timestamp::from_ticks(ticks);
        assert_eq!(ts.hours, 1);
        assert_eq!(ts.to_string(), "01:00:00.0");
    }
}
