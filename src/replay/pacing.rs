//! Inter-record pacing for replay
//!
//! Reconstructs the original spacing between captured records: the delay
//! before emitting a record is the nanosecond gap to the previously
//! emitted one, divided by the speed factor. The very first record after
//! start (or after a loop restart) goes out immediately.

use std::time::Duration;

/// Computes the pause to perform before each emission
#[derive(Debug)]
pub struct Pacer {
    speed: f64,
    last: Option<i64>,
}

impl Pacer {
    /// Create a pacer with the given speed factor.
    ///
    /// The factor is validated at configuration time; 1.0 reproduces the
    /// captured pacing, larger values accelerate, smaller decelerate.
    pub fn new(speed: f64) -> Self {
        Self { speed, last: None }
    }

    /// Forget the previous timestamp so the next record emits immediately
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Delay to perform before emitting a record captured at `timestamp`
    /// (nanoseconds), advancing the pacing clock to it.
    ///
    /// A negative gap (possible when a single file's own timestamps are
    /// not monotonic) clamps to zero rather than erroring.
    pub fn delay_for(&mut self, timestamp: i64) -> Duration {
        let delay = match self.last {
            None => Duration::ZERO,
            Some(last) => {
                let gap = (timestamp - last).max(0) as f64 / self.speed;
                Duration::from_nanos(gap as u64)
            }
        };
        self.last = Some(timestamp);
        delay
    }
}
