use serde::{Deserialize, Serialize};

/// Maximum laps recorded per participant. Slots beyond this fold into the
/// last lap instead of growing the ledger.
pub const MAX_LAPS: usize = 1000;

/// Debounce and refinement thresholds, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingParams {
    /// Minimum plausible time between two lap boundaries.
    pub min_lap_time_ms: u64,
    /// Window after a boundary during which a stronger detection may move it.
    pub grace_period_ms: u64,
}

/// One lap record. Offsets are relative to race start and to lap start
/// respectively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lap {
    pub start_offset_ms: u64,
    pub last_seen_offset_ms: u64,
}

/// What a detection event did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// A new lap boundary was registered at the given lap index.
    NewLap(usize),
    /// A stronger detection inside the grace window moved the current
    /// boundary toward the true crossing instant.
    Refined,
    /// Liveness update only; the boundary did not move.
    Seen,
    /// Capacity exhausted; the event extended the last lap instead.
    LedgerFull,
}

/// Bounded lap history for one participant.
///
/// Indices `0..=lap_count` are meaningful; index `lap_count` is the current,
/// in-progress lap. `lap_count` only changes through [`record_detection`],
/// [`increment_manual`] or [`decrement_manual`].
///
/// [`record_detection`]: LapLedger::record_detection
/// [`increment_manual`]: LapLedger::increment_manual
/// [`decrement_manual`]: LapLedger::decrement_manual
#[derive(Debug, Clone)]
pub struct LapLedger {
    laps: Vec<Lap>,
    lap_count: usize,
    best_signal: i16,
}

impl LapLedger {
    pub fn new() -> Self {
        Self {
            laps: vec![Lap::default()],
            lap_count: 0,
            best_signal: i16::MIN,
        }
    }

    /// Rebuild a ledger from persisted records. `laps` must cover indices
    /// `0..=lap_count`.
    pub fn from_records(laps: Vec<Lap>, lap_count: usize) -> Option<Self> {
        if laps.len() <= lap_count || lap_count >= MAX_LAPS {
            return None;
        }
        Some(Self {
            laps,
            lap_count,
            best_signal: i16::MIN,
        })
    }

    pub fn lap_count(&self) -> usize {
        self.lap_count
    }

    /// Records for indices `0..=lap_count`.
    pub fn laps(&self) -> &[Lap] {
        &self.laps[..=self.lap_count]
    }

    pub fn current(&self) -> &Lap {
        &self.laps[self.lap_count]
    }

    pub fn best_signal(&self) -> i16 {
        self.best_signal
    }

    /// Epoch at which the current lap began.
    pub fn lap_start_epoch(&self, race_start_ms: u64) -> u64 {
        race_start_ms + self.current().start_offset_ms
    }

    /// Epoch of the most recent detection within the current lap.
    pub fn last_seen_epoch(&self, race_start_ms: u64) -> u64 {
        self.lap_start_epoch(race_start_ms) + self.current().last_seen_offset_ms
    }

    /// Feed one detection event through the debounce/refinement algorithm.
    ///
    /// A detection more than `min_lap_time_ms` after the current boundary is
    /// a new lap. A detection inside the grace window with a strictly
    /// stronger signal retroactively moves the boundary (early-detection
    /// jitter correction). Anything else only refreshes the last-seen
    /// offset.
    pub fn record_detection(
        &mut self,
        race_start_ms: u64,
        epoch_ms: u64,
        rssi: i16,
        timing: &TimingParams,
    ) -> DetectionOutcome {
        let lap_start = self.lap_start_epoch(race_start_ms);
        let since_boundary = epoch_ms.saturating_sub(lap_start);

        if since_boundary > timing.min_lap_time_ms {
            self.best_signal = rssi;
            if self.lap_count + 1 < MAX_LAPS {
                let lap = Lap {
                    start_offset_ms: epoch_ms.saturating_sub(race_start_ms),
                    last_seen_offset_ms: 0,
                };
                self.lap_count += 1;
                self.put(self.lap_count, lap);
                DetectionOutcome::NewLap(self.lap_count)
            } else {
                // Out of slots: keep the event as liveness on the last lap.
                self.laps[self.lap_count].last_seen_offset_ms = since_boundary;
                DetectionOutcome::LedgerFull
            }
        } else if since_boundary <= timing.grace_period_ms && rssi > self.best_signal {
            let cur = &mut self.laps[self.lap_count];
            cur.start_offset_ms = epoch_ms.saturating_sub(race_start_ms);
            cur.last_seen_offset_ms = 0;
            self.best_signal = rssi;
            DetectionOutcome::Refined
        } else {
            self.laps[self.lap_count].last_seen_offset_ms = since_boundary;
            DetectionOutcome::Seen
        }
    }

    /// Operator +1. Synthesizes a boundary at `now - min_lap_time_ms` so the
    /// next genuine detection is not swallowed as too soon. Bypasses the
    /// signal-strength logic.
    pub fn increment_manual(&mut self, race_start_ms: u64, now_ms: u64, timing: &TimingParams) -> bool {
        if self.lap_count + 1 >= MAX_LAPS {
            return false;
        }
        let boundary = now_ms
            .saturating_sub(timing.min_lap_time_ms)
            .saturating_sub(race_start_ms)
            // start offsets must stay non-decreasing
            .max(self.current().start_offset_ms);
        self.lap_count += 1;
        self.put(
            self.lap_count,
            Lap {
                start_offset_ms: boundary,
                last_seen_offset_ms: 0,
            },
        );
        self.best_signal = i16::MIN;
        true
    }

    /// Operator -1, floored at zero. The decremented record stays in place
    /// and becomes the current lap; the next detection overwrites it.
    pub fn decrement_manual(&mut self) -> bool {
        if self.lap_count == 0 {
            return false;
        }
        self.lap_count -= 1;
        self.best_signal = i16::MIN;
        true
    }

    /// Reset to a fresh ledger (race clear).
    pub fn reset(&mut self) {
        self.laps.clear();
        self.laps.push(Lap::default());
        self.lap_count = 0;
        self.best_signal = i16::MIN;
    }

    fn put(&mut self, idx: usize, lap: Lap) {
        if idx < self.laps.len() {
            self.laps[idx] = lap;
        } else {
            self.laps.push(lap);
        }
    }
}

impl Default for LapLedger {
    fn default() -> Self {
        Self::new()
    }
}
