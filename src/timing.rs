//! Session clock for capture timestamps
//!
//! A single monotonic timebase shared by the video callback and the audio
//! thread, reporting microseconds since session start.

use std::sync::Arc;
use std::time::Instant;

/// Monotonic clock for capture timestamps
///
/// All timestamps handed to the encoding sink derive from this single
/// source so the merged video/audio interleaving stays ordered.
#[derive(Debug, Clone)]
pub struct PtsClock {
    start: Arc<Instant>,
}

impl PtsClock {
    /// Create a new clock with the current instant as time zero
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Create a clock from an existing start instant
    ///
    /// Use this to share the same timebase between components.
    pub fn from_instant(start: Instant) -> Self {
        Self {
            start: Arc::new(start),
        }
    }

    /// Elapsed time since session start, in microseconds
    #[inline]
    pub fn micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Microseconds since session start for a given instant
    ///
    /// Instants before the clock's start saturate to zero.
    #[inline]
    pub fn micros_at(&self, instant: Instant) -> u64 {
        instant
            .saturating_duration_since(*self.start)
            .as_micros() as u64
    }

    /// Get the start instant for sharing with other components
    pub fn start_instant(&self) -> Instant {
        *self.start
    }
}

impl Default for PtsClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_micros_monotonic() {
        let clock = PtsClock::new();
        let t1 = clock.micros();
        thread::sleep(Duration::from_millis(10));
        let t2 = clock.micros();
        assert!(t2 > t1, "timestamps must be monotonically increasing");
    }

    #[test]
    fn test_shared_clock() {
        let clock1 = PtsClock::new();
        let clock2 = PtsClock::from_instant(clock1.start_instant());

        thread::sleep(Duration::from_millis(5));

        let t1 = clock1.micros();
        let t2 = clock2.micros();

        // Should be within 1ms of each other
        assert!(t1.abs_diff(t2) < 1_000);
    }

    #[test]
    fn test_micros_at_before_start_saturates() {
        let early = Instant::now();
        thread::sleep(Duration::from_millis(2));
        let clock = PtsClock::new();
        assert_eq!(clock.micros_at(early), 0);
    }

    #[test]
    fn test_micros_at() {
        let clock = PtsClock::new();
        thread::sleep(Duration::from_millis(10));
        let t = clock.micros_at(Instant::now());
        assert!(t >= 10_000, "should be at least 10ms, got {}", t);
    }
}
