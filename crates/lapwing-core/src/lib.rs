//! # lapwing-core
//!
//! Core race state and lap detection for the lapwing timing system.
//!
//! This crate provides:
//! - [`RaceClock`] settable monotonic time source
//! - [`LapLedger`] bounded lap history with debounce and refinement
//! - [`TagRegistry`] fixed-roster arena of participant records
//! - The closed message enums exchanged between execution contexts

pub mod clock;
pub mod error;
pub mod ledger;
pub mod message;
pub mod participant;
pub mod registry;

pub use clock::RaceClock;
pub use error::LapwingError;
pub use ledger::{DetectionOutcome, Lap, LapLedger, TimingParams, MAX_LAPS};
pub use message::{BeaconCommand, CoordinatorMessage, DisplayUpdate};
pub use participant::{ActivationState, ParticipantState};
pub use registry::{TagId, TagRegistry};
