//! Host loop clock.
use std::{
    thread,
    time::{Duration, Instant},
};

use crate::constants::*;

/// Clock frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Timer to synchronize the host thread with the cadence of the interpreter loop.
///
/// The interpreter itself has no notion of time. A host calls [`Clock::wait`]
/// before each step to run the machine at a fixed rate. When time elapses
/// between waits, for example because the host was paused, it is taken into
/// account when determining the next cycle.
pub struct Clock {
    interval: Duration,
    last: Instant,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    ///
    /// A frequency of zero disables throttling.
    pub fn new(freq: Hz) -> Self {
        Self {
            interval: freq.into(),
            last: Instant::now(),
        }
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.last = Instant::now()
    }

    /// Checks whether a full cycle has elapsed, starting the next one if so.
    pub fn tick(&mut self) -> bool {
        if self.last.elapsed() >= self.interval {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Block the current thread until the next clock cycle.
    pub fn wait(&mut self) {
        // Sleep does not have enough resolution, and causes
        // the clock to run at 30 FPS.
        //
        // Spinning a loop causes high CPU usage and fan madness.
        //
        // Yielding in a loop is the best alternative.
        //
        // Once the cycle is reached the clock resets back to zero, rather
        // than trying to catch up. If the host was paused for a long time
        // it should simply continue at its usual speed.
        while !self.tick() {
            thread::yield_now();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clock_hz() {
        let interval: Duration = Hz(60).into();
        assert_eq!(interval.as_millis(), 16);

        let interval: Duration = Hz(0).into();
        assert_eq!(interval, Duration::ZERO);
    }

    #[test]
    fn test_unthrottled_clock_always_ticks() {
        let mut clock = Clock::new(Hz(0));
        assert!(clock.tick());
        assert!(clock.tick());
        clock.wait();
    }
}
