use serde::{Deserialize, Serialize};

use crate::registry::TagId;

/// One raw sighting of a tag by the beacon subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub address: String,
    pub epoch_ms: u64,
    pub rssi: i16,
    /// 0-100, or None when the beacon did not report it.
    pub battery: Option<u8>,
}

/// Result of the one-time activation handshake for a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResult {
    pub address: String,
    pub epoch_ms: u64,
    pub rssi: i16,
    pub battery: u8,
}

/// Configuration attributes the display can edit for a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantConfig {
    pub tag: TagId,
    pub color0: u32,
    pub color1: u32,
    pub name: String,
    pub in_race: bool,
}

/// Everything the coordinator consumes, from all other contexts. Dispatch
/// over this enum is exhaustive; there is no silent fall-through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CoordinatorMessage {
    Detection(DetectionEvent),
    ConfigResult(ConfigResult),
    RegisterAck {
        tag: TagId,
        display_handle: u32,
        ok: bool,
    },
    UpdateConfig(ParticipantConfig),
    SetRaceStatus {
        tag: TagId,
        in_race: bool,
    },
    AdjustLaps {
        tag: TagId,
        delta: i32,
    },
    RaceStart {
        epoch_ms: u64,
    },
    RaceClear,
    LivenessTick,
    SaveRace,
    LoadRace,
}

/// Commands from the coordinator to the beacon-connection subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BeaconCommand {
    /// Run the activation handshake for a freshly detected tag. Carries the
    /// detection that triggered it so the radio side can aim its connection
    /// attempt.
    Configure {
        address: String,
        last_detection: DetectionEvent,
    },
}

/// Updates from the coordinator to the display subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DisplayUpdate {
    /// One-time registration of a roster entry; the display answers with
    /// RegisterAck carrying its own handle.
    Register {
        tag: TagId,
        color0: u32,
        color1: u32,
        name: String,
        in_race: bool,
    },
    /// Lap/progress refresh for a registered participant.
    Stats {
        display_handle: u32,
        distance_m: f64,
        lap_count: usize,
        last_lap_epoch_ms: u64,
        last_seen_epoch_ms: u64,
        connected: bool,
    },
    /// Connection/battery/in-race refresh.
    Status {
        display_handle: u32,
        connected: bool,
        battery: Option<u8>,
        in_race: bool,
    },
}
