//! # Lapwing
//!
//! Race-timing coordinator for BLE-tag lap counting.
//!
//! Lapwing keeps the authoritative state of a race: which tags exist, which
//! laps they have completed, and whether they are still in range. Detections
//! from a radio frontend and commands from an operator UI arrive on one
//! mailbox; beacon configuration requests and display updates leave on two
//! others. A single coordinator task owns all of it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lapwing::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LapwingConfig::from_file("lapwing.toml")?;
//!     let (system, mut ports) = RaceSystem::start(&config);
//!
//!     // feed detections in, drain beacon commands and display updates out
//!     ports.coordinator.post(CoordinatorMessage::RaceStart { epoch_ms: 0 }).await;
//!
//!     drop(ports);
//!     system.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli`: Enable the `lapwing` binary with logging setup and a beacon
//!   simulator for bench testing

pub mod config;
pub mod coordinator;
pub mod mailbox;
pub mod persist;
pub mod system;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use lapwing_core::{
    ActivationState, BeaconCommand, CoordinatorMessage, DisplayUpdate, LapwingError,
    ParticipantState, RaceClock, TagId, TagRegistry,
};

pub mod prelude {
    pub use lapwing_core::{BeaconCommand, CoordinatorMessage, DisplayUpdate};

    pub use crate::config::LapwingConfig;
    pub use crate::system::{RaceSystem, SystemPorts};
}
