//! `lapwing run` subcommand implementation.
//!
//! Runs the coordinator with loopback bench transports: a simulated scanner
//! that emits detections for every roster tag at a configurable lap pace,
//! and a display stub that acknowledges registrations and prints updates.
//! Real deployments embed [`crate::system::RaceSystem`] behind their own
//! transports instead.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use rand::Rng;
use tokio::signal;
use tokio::task::JoinHandle;

use lapwing_core::message::{ConfigResult, DetectionEvent};
use lapwing_core::{BeaconCommand, CoordinatorMessage, DisplayUpdate};

use crate::config::LapwingConfig;
use crate::mailbox::Mailbox;
use crate::system::{RaceSystem, SystemPorts};

use super::logging;

#[derive(Parser, Debug)]
pub struct Args {
    #[arg(short, long, default_value = "lapwing.toml")]
    pub config: PathBuf,

    /// Restore the race snapshot before starting.
    #[arg(long)]
    pub resume: bool,

    /// Simulated lap pace per tag, in milliseconds.
    #[arg(long, default_value = "30000")]
    pub sim_lap_ms: u64,

    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    #[arg(long, default_value = "100")]
    pub log_max_size_mb: u64,

    #[arg(long, default_value = "10")]
    pub log_max_files: usize,
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

fn default_log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "lapwing")
        .map(|dirs| dirs.data_local_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

pub async fn execute(args: Args) -> anyhow::Result<()> {
    let config = if args.config.exists() {
        LapwingConfig::from_file(&args.config)?
    } else {
        tracing::warn!(
            path = %args.config.display(),
            "Config file not found, using defaults"
        );
        LapwingConfig::minimal()
    };
    config.validate()?;

    let log_config = logging::LoggingConfig {
        log_dir: args.log_dir.unwrap_or_else(default_log_dir),
        max_size_mb: args.log_max_size_mb,
        max_files: args.log_max_files,
    };
    logging::init_logging(log_config)?;

    tracing::info!(
        tags = config.roster.len(),
        min_lap_time_ms = config.timing.min_lap_time_ms,
        sim_lap_ms = args.sim_lap_ms,
        "Starting lapwing race system"
    );

    let (system, ports) = RaceSystem::start(&config);
    let SystemPorts {
        coordinator,
        beacon_rx,
        display_rx,
    } = ports;

    let mut helpers: Vec<JoinHandle<()>> = Vec::new();
    helpers.push(spawn_display_stub(display_rx, coordinator.clone()));
    helpers.push(spawn_beacon_stub(beacon_rx, coordinator.clone()));

    if args.resume {
        coordinator.post(CoordinatorMessage::LoadRace).await;
    } else {
        coordinator
            .post(CoordinatorMessage::RaceStart {
                epoch_ms: epoch_ms(),
            })
            .await;
    }

    for entry in &config.roster {
        helpers.push(spawn_simulated_tag(
            entry.address.clone(),
            args.sim_lap_ms,
            coordinator.clone(),
        ));
    }

    tracing::info!("Race system running, waiting for shutdown signal");
    signal::ctrl_c().await?;

    tracing::info!("Shutdown signal received, saving race");
    coordinator.post(CoordinatorMessage::SaveRace).await;

    for handle in helpers {
        handle.abort();
    }
    drop(coordinator);
    system.shutdown().await?;

    Ok(())
}

/// Acknowledges registrations so the coordinator starts streaming stats,
/// then prints whatever the coordinator pushes.
fn spawn_display_stub(
    mut display_rx: tokio::sync::mpsc::Receiver<DisplayUpdate>,
    coordinator: Mailbox<CoordinatorMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = display_rx.recv().await {
            match update {
                DisplayUpdate::Register { tag, name, .. } => {
                    tracing::info!(tag, name = %name, "display: participant registered");
                    coordinator
                        .post(CoordinatorMessage::RegisterAck {
                            tag,
                            display_handle: tag as u32 + 1,
                            ok: true,
                        })
                        .await;
                }
                DisplayUpdate::Stats {
                    display_handle,
                    lap_count,
                    distance_m,
                    ..
                } => {
                    tracing::info!(display_handle, lap_count, distance_m, "display: stats");
                }
                DisplayUpdate::Status {
                    display_handle,
                    connected,
                    battery,
                    ..
                } => {
                    tracing::info!(display_handle, connected, battery, "display: status");
                }
            }
        }
    })
}

/// Answers every configuration request with a successful result, as a real
/// beacon would after its config write completes.
fn spawn_beacon_stub(
    mut beacon_rx: tokio::sync::mpsc::Receiver<BeaconCommand>,
    coordinator: Mailbox<CoordinatorMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(cmd) = beacon_rx.recv().await {
            let BeaconCommand::Configure {
                address,
                last_detection,
            } = cmd;
            let battery = {
                let mut rng = rand::thread_rng();
                rng.gen_range(20..=100)
            };
            coordinator
                .post(CoordinatorMessage::ConfigResult(ConfigResult {
                    address,
                    epoch_ms: epoch_ms(),
                    rssi: last_detection.rssi,
                    battery,
                }))
                .await;
        }
    })
}

/// One simulated tag crossing the line roughly every `lap_ms`, with jittered
/// pace and signal strength.
fn spawn_simulated_tag(
    address: String,
    lap_ms: u64,
    coordinator: Mailbox<CoordinatorMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let (pace_ms, rssi) = {
                let mut rng = rand::thread_rng();
                let jitter = lap_ms / 10;
                (
                    rng.gen_range(lap_ms.saturating_sub(jitter)..=lap_ms + jitter),
                    rng.gen_range(-90..=-40),
                )
            };
            tokio::time::sleep(Duration::from_millis(pace_ms)).await;
            coordinator
                .post(CoordinatorMessage::Detection(DetectionEvent {
                    address: address.clone(),
                    epoch_ms: epoch_ms(),
                    rssi,
                    battery: None,
                }))
                .await;
        }
    })
}
