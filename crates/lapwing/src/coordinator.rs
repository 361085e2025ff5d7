//! The race-database coordinator.
//!
//! A single cooperative task owns all race truth: the tag registry, the
//! race clock and the race-level flags. It consumes the coordinator mailbox
//! message by message, mutates the registry, and emits commands to the
//! beacon subsystem and updates to the display. No other context ever holds
//! a reference into the registry; they only see copies carried in messages.

use tokio::sync::mpsc;

use lapwing_core::{
    ActivationState, BeaconCommand, CoordinatorMessage, DisplayUpdate, RaceClock, TagId,
    TagRegistry, TimingParams,
};
use lapwing_core::ledger::DetectionOutcome;
use lapwing_core::message::{ConfigResult, DetectionEvent, ParticipantConfig};

use crate::config::{CourseConfig, LapwingConfig};
use crate::mailbox::Mailbox;
use crate::persist::{self, SnapshotStore};
use crate::util::logging::CrossingLogger;

/// Race-level state shared by every participant through clock arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct RaceState {
    pub start_epoch_ms: u64,
    pub active: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// The one-time display registration handshake could not be delivered.
    /// An un-rendered participant before a race starts is an operator-visible
    /// failure; the process is expected to be restarted by its supervisor.
    #[error("display registration for tag {tag} could not be delivered")]
    RegistrationFailed { tag: TagId },
}

pub struct Coordinator {
    registry: TagRegistry,
    clock: RaceClock,
    race: RaceState,
    timing: TimingParams,
    course: CourseConfig,
    catch_all: bool,
    beacon: Mailbox<BeaconCommand>,
    display: Mailbox<DisplayUpdate>,
    store: Box<dyn SnapshotStore>,
    crossings: Option<CrossingLogger>,
}

impl Coordinator {
    pub fn new(
        config: &LapwingConfig,
        beacon: Mailbox<BeaconCommand>,
        display: Mailbox<DisplayUpdate>,
        store: Box<dyn SnapshotStore>,
        crossings: Option<CrossingLogger>,
    ) -> Self {
        let mut registry = TagRegistry::from_roster(
            config
                .roster
                .iter()
                .map(|e| (e.address.clone(), e.name.clone())),
        );
        for (p, entry) in registry.iter_mut().zip(&config.roster) {
            p.color0 = entry.color0;
            p.color1 = entry.color1;
            p.in_race = entry.in_race;
        }

        Self {
            registry,
            clock: RaceClock::default(),
            race: RaceState::default(),
            timing: config.timing.params(),
            course: config.course.clone(),
            catch_all: config.catch_all,
            beacon,
            display,
            store,
            crossings,
        }
    }

    /// Register the roster with the display, then consume the mailbox until
    /// it closes. Only the startup handshake can fail; everything after it
    /// is handled locally and logged.
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<CoordinatorMessage>,
    ) -> Result<(), CoordinatorError> {
        self.register_roster().await?;
        tracing::info!(tags = self.registry.len(), "coordinator started");

        while let Some(msg) = inbox.recv().await {
            self.handle(msg).await;
            self.flush_dirty().await;
        }

        tracing::info!("coordinator mailbox closed, shutting down");
        if let Some(crossings) = &self.crossings {
            crossings.shutdown();
        }
        Ok(())
    }

    async fn register_roster(&mut self) -> Result<(), CoordinatorError> {
        for p in self.registry.iter() {
            let msg = DisplayUpdate::Register {
                tag: p.id,
                color0: p.color0,
                color1: p.color1,
                name: p.name.clone(),
                in_race: p.in_race,
            };
            if !self.display.post(msg).await.is_delivered() {
                tracing::error!(tag = p.id, "startup display registration failed");
                return Err(CoordinatorError::RegistrationFailed { tag: p.id });
            }
        }
        Ok(())
    }

    async fn handle(&mut self, msg: CoordinatorMessage) {
        match msg {
            CoordinatorMessage::Detection(ev) => self.on_detection(ev).await,
            CoordinatorMessage::ConfigResult(res) => self.on_config_result(res).await,
            CoordinatorMessage::RegisterAck {
                tag,
                display_handle,
                ok,
            } => self.on_register_ack(tag, display_handle, ok),
            CoordinatorMessage::UpdateConfig(cfg) => self.on_update_config(cfg).await,
            CoordinatorMessage::SetRaceStatus { tag, in_race } => {
                self.on_set_race_status(tag, in_race).await
            }
            CoordinatorMessage::AdjustLaps { tag, delta } => self.on_adjust_laps(tag, delta),
            CoordinatorMessage::RaceStart { epoch_ms } => self.on_race_start(epoch_ms),
            CoordinatorMessage::RaceClear => self.on_race_clear(),
            CoordinatorMessage::LivenessTick => self.on_liveness_tick().await,
            CoordinatorMessage::SaveRace => self.on_save_race(),
            CoordinatorMessage::LoadRace => self.on_load_race(),
        }
    }

    async fn on_detection(&mut self, ev: DetectionEvent) {
        let tag = match self.registry.lookup(&ev.address) {
            Some(tag) => tag,
            None if self.catch_all && !self.registry.is_empty() => 0,
            None => {
                tracing::warn!(address = %ev.address, "detection from unknown beacon, discarded");
                return;
            }
        };

        {
            let p = self.registry.get_mut(tag);
            p.rssi = ev.rssi;
            if let Some(battery) = ev.battery {
                p.battery = Some(battery);
            }
            p.connected = true;
            p.dirty = true;
            if p.activation == ActivationState::Unregistered {
                p.activation = ActivationState::Detected;
            }
        }

        if self.race.active && self.registry.get(tag).in_race {
            let race_start = self.race.start_epoch_ms;
            let timing = self.timing;
            let p = self.registry.get_mut(tag);
            match p.ledger.record_detection(race_start, ev.epoch_ms, ev.rssi, &timing) {
                DetectionOutcome::NewLap(lap) => {
                    let start_offset = p.ledger.current().start_offset_ms;
                    tracing::info!(
                        tag,
                        address = %p.address,
                        lap,
                        start_offset_ms = start_offset,
                        rssi = ev.rssi,
                        "lap registered"
                    );
                    if let Some(crossings) = &self.crossings {
                        crossings.log(tag, &p.address, lap, start_offset, ev.rssi);
                    }
                }
                DetectionOutcome::Refined => {
                    tracing::debug!(
                        tag,
                        lap = p.ledger.lap_count(),
                        rssi = ev.rssi,
                        "lap boundary refined toward stronger detection"
                    );
                }
                DetectionOutcome::Seen => {}
                DetectionOutcome::LedgerFull => {
                    tracing::error!(
                        tag,
                        address = %p.address,
                        "lap ledger full, folding detection into last lap"
                    );
                }
            }
        }

        // Activation handshake: at most one outstanding request per tag.
        // A failed send leaves the tag Detected; the next detection retries.
        if self.registry.get(tag).activation == ActivationState::Detected {
            let address = self.registry.get(tag).address.clone();
            let cmd = BeaconCommand::Configure {
                address,
                last_detection: ev,
            };
            if self.beacon.post(cmd).await.is_delivered() {
                self.registry.get_mut(tag).activation = ActivationState::ConfigPending;
            }
        }
    }

    async fn on_config_result(&mut self, res: ConfigResult) {
        let Some(tag) = self.registry.lookup(&res.address) else {
            tracing::warn!(address = %res.address, "config result for unknown beacon, discarded");
            return;
        };

        {
            let p = self.registry.get_mut(tag);
            p.battery = Some(res.battery);
            p.rssi = res.rssi;
            p.connected = true;
            p.dirty = true;
            if p.activation == ActivationState::ConfigPending {
                p.activation = ActivationState::Active;
                tracing::info!(tag, address = %p.address, battery = res.battery, "tag activated");
            } else {
                tracing::debug!(tag, state = ?p.activation, "config result outside handshake");
            }
        }

        self.push_status(tag).await;
    }

    fn on_register_ack(&mut self, tag: TagId, display_handle: u32, ok: bool) {
        if tag >= self.registry.len() {
            tracing::error!(tag, "register ack for unknown tag, discarded");
            return;
        }
        if !ok {
            tracing::error!(tag, "display refused participant registration");
            return;
        }
        let p = self.registry.get_mut(tag);
        p.display_handle = Some(display_handle);
        p.dirty = true;
        tracing::debug!(tag, display_handle, "display registration acknowledged");
    }

    async fn on_update_config(&mut self, cfg: ParticipantConfig) {
        if cfg.tag >= self.registry.len() {
            tracing::error!(tag = cfg.tag, "config update for unknown tag, discarded");
            return;
        }
        {
            let p = self.registry.get_mut(cfg.tag);
            p.color0 = cfg.color0;
            p.color1 = cfg.color1;
            p.name = cfg.name;
            p.in_race = cfg.in_race;
            p.dirty = true;
        }
        self.push_status(cfg.tag).await;
    }

    async fn on_set_race_status(&mut self, tag: TagId, in_race: bool) {
        if tag >= self.registry.len() {
            tracing::error!(tag, "race status for unknown tag, discarded");
            return;
        }
        self.registry.get_mut(tag).in_race = in_race;
        self.registry.get_mut(tag).dirty = true;
        tracing::info!(tag, in_race, "race participation toggled");
        self.push_status(tag).await;
    }

    fn on_adjust_laps(&mut self, tag: TagId, delta: i32) {
        if tag >= self.registry.len() {
            tracing::error!(tag, "lap adjustment for unknown tag, discarded");
            return;
        }
        let now = self.clock.now_ms();
        let race_start = self.race.start_epoch_ms;
        let timing = self.timing;
        let p = self.registry.get_mut(tag);
        if delta >= 0 {
            for _ in 0..delta {
                if !p.ledger.increment_manual(race_start, now, &timing) {
                    tracing::error!(tag, "lap ledger full, manual increment ignored");
                    break;
                }
            }
        } else {
            for _ in 0..delta.unsigned_abs() {
                if !p.ledger.decrement_manual() {
                    break;
                }
            }
        }
        p.dirty = true;
        tracing::info!(tag, delta, laps = p.ledger.lap_count(), "manual lap adjustment");
    }

    fn on_race_start(&mut self, epoch_ms: u64) {
        if !self.clock.set_ms(epoch_ms) {
            tracing::warn!(epoch_ms, "race start epoch behind the clock, keeping clock");
        }
        self.race.start_epoch_ms = epoch_ms;
        self.race.active = true;
        for p in self.registry.iter_mut() {
            p.dirty = true;
        }
        tracing::info!(epoch_ms, "race started");
    }

    fn on_race_clear(&mut self) {
        self.race.active = false;
        self.race.start_epoch_ms = 0;
        self.registry.reset_race();
        tracing::info!("race cleared");
    }

    /// Sweep runs only while a race is active: last-seen is derived from
    /// ledger offsets, which are meaningless before RaceStart. A tag marked
    /// connected by a pre-race detection keeps that flag until the race
    /// starts.
    async fn on_liveness_tick(&mut self) {
        if !self.race.active {
            return;
        }
        let now = self.clock.now_ms();
        let race_start = self.race.start_epoch_ms;
        let min_lap_time = self.timing.min_lap_time_ms;

        let mut disconnected = Vec::new();
        for p in self.registry.iter_mut() {
            if p.activation != ActivationState::Active {
                continue;
            }
            p.time_since_last_seen_ms = now.saturating_sub(p.ledger.last_seen_epoch(race_start));
            if p.time_since_last_seen_ms > min_lap_time && p.connected {
                p.connected = false;
                p.dirty = true;
                disconnected.push(p.id);
            }
        }

        for tag in disconnected {
            tracing::debug!(tag, "tag out of range, marked disconnected");
            self.push_status(tag).await;
        }
    }

    fn on_save_race(&mut self) {
        let doc = persist::capture(
            &self.registry,
            self.race.start_epoch_ms,
            self.clock.now_ms(),
            &self.course,
        );
        match self.store.save(&doc) {
            Ok(()) => tracing::info!(tags = self.registry.len(), "race snapshot saved"),
            Err(e) => tracing::error!(error = %e, "failed to save race snapshot"),
        }
    }

    fn on_load_race(&mut self) {
        let doc = match self.store.load() {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!(error = %e, "failed to read race snapshot");
                return;
            }
        };
        match persist::restore(doc, &mut self.registry) {
            Ok(race_start) => {
                self.race.start_epoch_ms = race_start;
                self.race.active = true;
                tracing::info!(race_start, "race snapshot restored");
            }
            Err(e) => {
                // in-memory state is untouched on any restore failure
                tracing::error!(error = %e, "incompatible race snapshot, load aborted");
            }
        }
    }

    /// Connection/battery refresh for one participant, if the display knows
    /// it yet.
    async fn push_status(&mut self, tag: TagId) {
        let p = self.registry.get(tag);
        let Some(display_handle) = p.display_handle else {
            return;
        };
        let msg = DisplayUpdate::Status {
            display_handle,
            connected: p.connected,
            battery: p.battery,
            in_race: p.in_race,
        };
        self.display.post(msg).await;
    }

    /// Emit a stats refresh for every dirty participant the display has
    /// acknowledged. Participants without a display handle stay dirty until
    /// the ack arrives.
    async fn flush_dirty(&mut self) {
        let race_start = self.race.start_epoch_ms;
        let lap_distance = self.course.lap_distance_m;

        let mut updates = Vec::new();
        for p in self.registry.iter_mut() {
            if !p.dirty {
                continue;
            }
            let Some(display_handle) = p.display_handle else {
                continue;
            };
            updates.push(DisplayUpdate::Stats {
                display_handle,
                distance_m: p.ledger.lap_count() as f64 * lap_distance,
                lap_count: p.ledger.lap_count(),
                last_lap_epoch_ms: p.ledger.lap_start_epoch(race_start),
                last_seen_epoch_ms: p.ledger.last_seen_epoch(race_start),
                connected: p.connected,
            });
            p.dirty = false;
        }

        for msg in updates {
            self.display.post(msg).await;
        }
    }
}
