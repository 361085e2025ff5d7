use serde::{Deserialize, Serialize};

use crate::ledger::LapLedger;
use crate::registry::TagId;

/// Activation lifecycle of a tracked tag.
///
/// Detection events drive `Unregistered -> Detected`; a successfully sent
/// configuration request drives `Detected -> ConfigPending`; the eventual
/// configuration result drives `ConfigPending -> Active`. There is no
/// failure transition back — a lost handshake leaves the tag pending until
/// the beacon subsystem retries internally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    #[default]
    Unregistered,
    Detected,
    ConfigPending,
    Active,
}

/// One record per tracked entity. Owned exclusively by [`TagRegistry`];
/// created at startup, mutated only by the coordinator, never destroyed —
/// race-clear resets it in place.
///
/// [`TagRegistry`]: crate::registry::TagRegistry
#[derive(Debug, Clone)]
pub struct ParticipantState {
    pub id: TagId,
    pub address: String,
    /// Reference into the display subsystem's own indexing; absent until
    /// the display acknowledges registration.
    pub display_handle: Option<u32>,
    pub color0: u32,
    pub color1: u32,
    pub name: String,
    pub in_race: bool,
    /// 0-100, or None when unknown.
    pub battery: Option<u8>,
    /// Last observed signal strength; more-positive is stronger.
    pub rssi: i16,
    pub connected: bool,
    pub activation: ActivationState,
    /// Derived on liveness ticks, never persisted.
    pub time_since_last_seen_ms: u64,
    /// Set by handlers that changed something the display should refresh.
    pub dirty: bool,
    pub ledger: LapLedger,
}

impl ParticipantState {
    pub fn new(id: TagId, address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            display_handle: None,
            color0: 0,
            color1: 0,
            name: name.into(),
            in_race: true,
            battery: None,
            rssi: i16::MIN,
            connected: false,
            activation: ActivationState::Unregistered,
            time_since_last_seen_ms: 0,
            dirty: false,
            ledger: LapLedger::new(),
        }
    }

    /// Race-clear: laps and activation go, identity and configuration stay.
    pub fn reset_race(&mut self) {
        self.ledger.reset();
        self.activation = ActivationState::Unregistered;
        self.connected = false;
        self.time_since_last_seen_ms = 0;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TimingParams;

    #[test]
    fn test_new_participant_defaults() {
        let p = ParticipantState::new(3, "aa:bb:cc:dd:ee:ff", "runner");
        assert_eq!(p.id, 3);
        assert_eq!(p.activation, ActivationState::Unregistered);
        assert!(p.display_handle.is_none());
        assert!(p.battery.is_none());
        assert!(!p.connected);
        assert_eq!(p.ledger.lap_count(), 0);
    }

    #[test]
    fn test_reset_race_keeps_identity() {
        let timing = TimingParams {
            min_lap_time_ms: 170,
            grace_period_ms: 30,
        };
        let mut p = ParticipantState::new(1, "addr", "runner");
        p.activation = ActivationState::Active;
        p.connected = true;
        p.ledger.record_detection(0, 250, -70, &timing);

        p.reset_race();

        assert_eq!(p.id, 1);
        assert_eq!(p.address, "addr");
        assert_eq!(p.name, "runner");
        assert_eq!(p.activation, ActivationState::Unregistered);
        assert!(!p.connected);
        assert_eq!(p.ledger.lap_count(), 0);
        assert!(p.dirty);
    }
}
