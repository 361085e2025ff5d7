//! CLI subcommand implementations, enabled by the `cli` feature.

pub mod config;
pub mod logging;
pub mod run;
