// crates/vireo-core/src/clock.rs
//
// Per-entity playback clock with a settable origin.
//
// Every video sprite carries its own clock inside its VideoData, so two
// sprites playing in the same scene never share pause state or drift
// together. The clock starts unarmed; the playback controller arms it on
// the first draw that needs wall time.

use std::time::Instant;

/// Largest time, in seconds, that `set_time` accepts. Matches the range a
/// u64 nanosecond counter can represent.
const MAX_SETTABLE_SECS: f64 = 18_446_744_073.0;

/// Monotonic clock with a movable zero point.
///
/// `now()` returns fractional seconds since the current origin. `set_time(t)`
/// moves the origin so that `now()` reads `t` at the moment of the call.
#[derive(Clone, Copy, Debug)]
pub struct PlaybackClock {
    origin: Option<Instant>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self { origin: None }
    }

    /// True once `arm` or `set_time` has been called.
    pub fn is_armed(&self) -> bool {
        self.origin.is_some()
    }

    /// Start the clock at zero. No-op if already armed.
    pub fn arm(&mut self) {
        if self.origin.is_none() {
            self.origin = Some(Instant::now());
        }
    }

    /// Move the origin so that `now()` reads `time` at this instant.
    ///
    /// NaN, negative, and out-of-range values are rejected with a log line
    /// rather than corrupting the origin.
    pub fn set_time(&mut self, time: f64) {
        if time.is_nan() || !(0.0..=MAX_SETTABLE_SECS).contains(&time) {
            log::warn!("[clock] rejected invalid time {time}");
            return;
        }
        self.origin = Some(Instant::now() - std::time::Duration::from_secs_f64(time));
    }

    /// Seconds since the current origin. Zero while unarmed.
    pub fn now(&self) -> f64 {
        match self.origin {
            Some(origin) => origin.elapsed().as_secs_f64(),
            None => 0.0,
        }
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn unarmed_clock_reads_zero() {
        let clock = PlaybackClock::new();
        assert!(!clock.is_armed());
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn armed_clock_advances() {
        let mut clock = PlaybackClock::new();
        clock.arm();
        sleep(Duration::from_millis(20));
        assert!(clock.now() >= 0.02);
    }

    #[test]
    fn set_time_moves_origin() {
        let mut clock = PlaybackClock::new();
        clock.set_time(5.0);
        let t = clock.now();
        assert!(t >= 5.0 && t < 5.5, "expected ~5.0, got {t}");
    }

    #[test]
    fn set_time_zero_rewinds() {
        let mut clock = PlaybackClock::new();
        clock.set_time(100.0);
        clock.set_time(0.0);
        assert!(clock.now() < 0.5);
    }

    #[test]
    fn invalid_times_are_rejected() {
        let mut clock = PlaybackClock::new();
        clock.set_time(3.0);
        clock.set_time(f64::NAN);
        clock.set_time(-1.0);
        clock.set_time(1e18);
        let t = clock.now();
        assert!(t >= 3.0 && t < 3.5, "origin must survive bad inputs, got {t}");
    }
}
