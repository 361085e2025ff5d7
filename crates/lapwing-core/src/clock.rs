use std::time::Instant;

/// Settable monotonic time source for race timing.
///
/// Gives "now" as an epoch value in milliseconds. The epoch can be moved
/// forward at any time (accelerated test runs jump the clock ahead of real
/// time); a backward set is refused so recorded offsets stay ordered.
#[derive(Debug, Clone)]
pub struct RaceClock {
    base_ms: u64,
    anchor: Instant,
}

impl RaceClock {
    pub fn new(epoch_ms: u64) -> Self {
        Self {
            base_ms: epoch_ms,
            anchor: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.base_ms + self.anchor.elapsed().as_millis() as u64
    }

    /// Move the clock to `epoch_ms`. Returns false (and leaves the clock
    /// untouched) if the target is in the past.
    pub fn set_ms(&mut self, epoch_ms: u64) -> bool {
        if epoch_ms < self.now_ms() {
            return false;
        }
        self.base_ms = epoch_ms;
        self.anchor = Instant::now();
        true
    }

    /// Jump forward by `delta_ms`.
    pub fn advance_ms(&mut self, delta_ms: u64) {
        self.base_ms += delta_ms;
    }
}

impl Default for RaceClock {
    fn default() -> Self {
        Self::new(0)
    }
}
