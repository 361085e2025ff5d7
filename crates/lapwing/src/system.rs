//! Assembly of the running system.
//!
//! [`RaceSystem::start`] builds the mailboxes from configuration, spawns the
//! coordinator task and the liveness ticker, and hands the caller the ports
//! it needs to feed detections in and drain beacon commands and display
//! updates out. The transports behind those ports (BLE scanner, LED wall,
//! operator UI) live outside this crate.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use lapwing_core::{BeaconCommand, CoordinatorMessage, DisplayUpdate};

use crate::config::LapwingConfig;
use crate::coordinator::{Coordinator, CoordinatorError};
use crate::mailbox::{Mailbox, SendOutcome};
use crate::persist::FileSnapshotStore;
use crate::util::logging::CrossingLogger;

/// Endpoints the embedding transports attach to.
pub struct SystemPorts {
    /// Inbound port: detections, operator commands, race control.
    pub coordinator: Mailbox<CoordinatorMessage>,
    /// Outbound: configuration requests for newly detected beacons.
    pub beacon_rx: mpsc::Receiver<BeaconCommand>,
    /// Outbound: registration, stats and status updates for the display.
    pub display_rx: mpsc::Receiver<DisplayUpdate>,
}

pub struct RaceSystem {
    coordinator_handle: JoinHandle<Result<(), CoordinatorError>>,
    ticker_handle: JoinHandle<()>,
}

impl RaceSystem {
    /// Spawn the coordinator and its liveness ticker. Must be called from
    /// within a tokio runtime.
    pub fn start(config: &LapwingConfig) -> (Self, SystemPorts) {
        let capacity = config.mailboxes.capacity;
        let retry = Duration::from_millis(config.mailboxes.retry_ms);

        let (coordinator_tx, coordinator_rx) =
            Mailbox::channel("coordinator", capacity, retry);
        let (beacon_tx, beacon_rx) = Mailbox::channel("beacon", capacity, retry);
        let (display_tx, display_rx) = Mailbox::channel("display", capacity, retry);

        let crossings = CrossingLogger::new(&config.crossing_log);
        let store = Box::new(FileSnapshotStore::new(config.snapshot.path.clone()));

        let coordinator = Coordinator::new(config, beacon_tx, display_tx, store, crossings);
        let coordinator_handle = tokio::spawn(coordinator.run(coordinator_rx));

        let ticker_handle =
            spawn_liveness_ticker(coordinator_tx.clone(), config.timing.liveness_tick_ms);

        tracing::info!(
            mailbox_capacity = capacity,
            liveness_tick_ms = config.timing.liveness_tick_ms,
            "race system started"
        );

        (
            Self {
                coordinator_handle,
                ticker_handle,
            },
            SystemPorts {
                coordinator: coordinator_tx,
                beacon_rx,
                display_rx,
            },
        )
    }

    /// Stop the ticker and wait for the coordinator to drain its mailbox.
    /// The caller must have dropped its [`SystemPorts::coordinator`] clone,
    /// otherwise the mailbox never closes.
    pub async fn shutdown(self) -> Result<(), CoordinatorError> {
        self.ticker_handle.abort();
        match self.coordinator_handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "coordinator task panicked or was cancelled");
                Ok(())
            }
        }
    }

    /// Abort both tasks without draining. Used on fatal startup errors.
    pub fn abort(self) {
        self.ticker_handle.abort();
        self.coordinator_handle.abort();
        tracing::info!("race system aborted");
    }
}

/// The ticker only enqueues; all sweep logic runs on the coordinator so the
/// registry has exactly one owner. Missed ticks are skipped rather than
/// bursted.
fn spawn_liveness_ticker(
    mailbox: Mailbox<CoordinatorMessage>,
    tick_ms: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if mailbox.post(CoordinatorMessage::LivenessTick).await == SendOutcome::Closed {
                tracing::debug!("coordinator gone, liveness ticker exiting");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::assert_ok;

    fn test_config(dir: &std::path::Path) -> LapwingConfig {
        let mut config = LapwingConfig::minimal();
        config.snapshot.path = dir.join("race.json");
        config
    }

    #[tokio::test]
    async fn test_start_registers_roster_with_display() {
        let dir = tempdir().unwrap();
        let (system, mut ports) = RaceSystem::start(&test_config(dir.path()));

        match ports.display_rx.recv().await.unwrap() {
            DisplayUpdate::Register { tag, name, .. } => {
                assert_eq!(tag, 0);
                assert_eq!(name, "tag-1");
            }
            other => panic!("expected Register, got {other:?}"),
        }

        drop(ports);
        assert_ok!(system.shutdown().await);
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_messages() {
        let dir = tempdir().unwrap();
        let (system, ports) = RaceSystem::start(&test_config(dir.path()));
        let SystemPorts {
            coordinator,
            beacon_rx: _beacon_rx,
            display_rx: _display_rx,
        } = ports;

        coordinator
            .post(CoordinatorMessage::RaceStart { epoch_ms: 1_000 })
            .await;
        coordinator.post(CoordinatorMessage::SaveRace).await;

        drop(coordinator);
        system.shutdown().await.unwrap();

        assert!(dir.path().join("race.json").exists());
    }
}
