//! Versioned race snapshots.
//!
//! Snapshots are JSON documents tagged with a `formatVersion`. Two
//! generations exist in the field: `"0.1"` keeps participant data flat
//! under each tag record, `"0.2"` nests it under `participant`. Documents
//! parse into a version-tagged intermediate before anything touches the
//! in-memory model; an unrecognized version or an address missing from the
//! roster aborts the load with no partial overwrite. Saves always write
//! `"0.2"`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use lapwing_core::error::Result;
use lapwing_core::{ActivationState, Lap, LapLedger, LapwingError, TagRegistry};

use crate::config::CourseConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "formatVersion")]
pub enum SnapshotDoc {
    #[serde(rename = "0.1")]
    V1(SnapshotV1),
    #[serde(rename = "0.2")]
    V2(SnapshotV2),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotV1 {
    pub race_start: u64,
    pub distance_total: f64,
    pub laps_planned: u32,
    pub lap_distance: f64,
    pub tag_count: usize,
    pub tags: Vec<TagRecordV1>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecordV1 {
    pub address: String,
    pub color0: u32,
    pub color1: u32,
    pub active: bool,
    pub name: String,
    pub lap_count: usize,
    pub time_since_last_seen: u64,
    pub in_race: bool,
    pub laps: Vec<LapRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotV2 {
    pub race_start: u64,
    pub distance_total: f64,
    pub laps_planned: u32,
    pub lap_distance: f64,
    pub tag_count: usize,
    pub tags: Vec<TagRecordV2>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecordV2 {
    pub address: String,
    pub color0: u32,
    pub color1: u32,
    pub active: bool,
    pub participant: ParticipantRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub name: String,
    pub lap_count: usize,
    pub time_since_last_seen: u64,
    pub in_race: bool,
    pub laps: Vec<LapRecord>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LapRecord {
    pub start_offset: u64,
    pub last_seen_offset: u64,
}

impl From<Lap> for LapRecord {
    fn from(lap: Lap) -> Self {
        Self {
            start_offset: lap.start_offset_ms,
            last_seen_offset: lap.last_seen_offset_ms,
        }
    }
}

impl From<LapRecord> for Lap {
    fn from(rec: LapRecord) -> Self {
        Self {
            start_offset_ms: rec.start_offset,
            last_seen_offset_ms: rec.last_seen_offset,
        }
    }
}

/// Capture the current race into a current-generation document.
pub fn capture(
    registry: &TagRegistry,
    race_start_ms: u64,
    now_ms: u64,
    course: &CourseConfig,
) -> SnapshotDoc {
    let tags = registry
        .iter()
        .map(|p| TagRecordV2 {
            address: p.address.clone(),
            color0: p.color0,
            color1: p.color1,
            active: p.activation == ActivationState::Active,
            participant: ParticipantRecord {
                name: p.name.clone(),
                lap_count: p.ledger.lap_count(),
                time_since_last_seen: now_ms.saturating_sub(p.ledger.last_seen_epoch(race_start_ms)),
                in_race: p.in_race,
                laps: p.ledger.laps().iter().copied().map(LapRecord::from).collect(),
            },
        })
        .collect::<Vec<_>>();

    SnapshotDoc::V2(SnapshotV2 {
        race_start: race_start_ms,
        distance_total: course.distance_total_m(),
        laps_planned: course.laps_planned,
        lap_distance: course.lap_distance_m,
        tag_count: tags.len(),
        tags,
    })
}

struct RestoredTag {
    id: usize,
    color0: u32,
    color1: u32,
    active: bool,
    name: String,
    in_race: bool,
    ledger: LapLedger,
}

/// Apply a parsed document to the registry. All-or-nothing: every tag is
/// resolved and every ledger rebuilt before the first field is written, so
/// a bad document leaves the in-memory state untouched.
///
/// Returns the restored race-start epoch.
pub fn restore(doc: SnapshotDoc, registry: &mut TagRegistry) -> Result<u64> {
    let (race_start, records) = normalize(doc);

    let mut restored = Vec::with_capacity(records.len());
    for rec in records {
        let id = registry.lookup(&rec.address).ok_or_else(|| {
            LapwingError::snapshot(format!("snapshot tag '{}' is not in the roster", rec.address))
        })?;
        let laps: Vec<Lap> = rec.laps.into_iter().map(Lap::from).collect();
        let ledger = LapLedger::from_records(laps, rec.lap_count).ok_or_else(|| {
            LapwingError::snapshot(format!(
                "snapshot tag '{}' has an inconsistent lap array",
                rec.address
            ))
        })?;
        restored.push(RestoredTag {
            id,
            color0: rec.color0,
            color1: rec.color1,
            active: rec.active,
            name: rec.name,
            in_race: rec.in_race,
            ledger,
        });
    }

    for tag in restored {
        let p = registry.get_mut(tag.id);
        p.color0 = tag.color0;
        p.color1 = tag.color1;
        p.name = tag.name;
        p.in_race = tag.in_race;
        p.activation = if tag.active {
            ActivationState::Active
        } else {
            ActivationState::Unregistered
        };
        p.ledger = tag.ledger;
        // derived: the next liveness sweep recomputes it
        p.time_since_last_seen_ms = 0;
        p.connected = false;
        p.dirty = true;
    }

    Ok(race_start)
}

struct NormalizedTag {
    address: String,
    color0: u32,
    color1: u32,
    active: bool,
    name: String,
    lap_count: usize,
    in_race: bool,
    laps: Vec<LapRecord>,
}

fn normalize(doc: SnapshotDoc) -> (u64, Vec<NormalizedTag>) {
    match doc {
        SnapshotDoc::V1(v1) => (
            v1.race_start,
            v1.tags
                .into_iter()
                .map(|t| NormalizedTag {
                    address: t.address,
                    color0: t.color0,
                    color1: t.color1,
                    active: t.active,
                    name: t.name,
                    lap_count: t.lap_count,
                    in_race: t.in_race,
                    laps: t.laps,
                })
                .collect(),
        ),
        SnapshotDoc::V2(v2) => (
            v2.race_start,
            v2.tags
                .into_iter()
                .map(|t| NormalizedTag {
                    address: t.address,
                    color0: t.color0,
                    color1: t.color1,
                    active: t.active,
                    name: t.participant.name,
                    lap_count: t.participant.lap_count,
                    in_race: t.participant.in_race,
                    laps: t.participant.laps,
                })
                .collect(),
        ),
    }
}

/// Storage seam for snapshot documents. The raw file-system mechanism is an
/// external collaborator; tests substitute their own store.
pub trait SnapshotStore: Send {
    fn save(&self, doc: &SnapshotDoc) -> Result<()>;
    fn load(&self) -> Result<SnapshotDoc>;
}

/// JSON file on local disk.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, doc: &SnapshotDoc) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn load(&self) -> Result<SnapshotDoc> {
        let content = std::fs::read_to_string(&self.path)?;
        let doc: SnapshotDoc = serde_json::from_str(&content)?;
        Ok(doc)
    }
}
