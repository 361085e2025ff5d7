use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use lapwing_core::TimingParams;

pub use crate::util::logging::CrossingLogConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LapwingConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub course: CourseConfig,
    #[serde(default)]
    pub mailboxes: MailboxConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub crossing_log: CrossingLogConfig,
    #[serde(default)]
    pub roster: Vec<RosterEntry>,
    /// Test-bench mode: attribute detections from unknown addresses to the
    /// first roster entry instead of discarding them.
    #[serde(default)]
    pub catch_all: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_min_lap_time_ms")]
    pub min_lap_time_ms: u64,
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    #[serde(default = "default_liveness_tick_ms")]
    pub liveness_tick_ms: u64,
}

fn default_min_lap_time_ms() -> u64 {
    20_000
}

fn default_grace_period_ms() -> u64 {
    3_000
}

fn default_liveness_tick_ms() -> u64 {
    2_000
}

impl TimingConfig {
    pub fn params(&self) -> TimingParams {
        TimingParams {
            min_lap_time_ms: self.min_lap_time_ms,
            grace_period_ms: self.grace_period_ms,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_lap_time_ms: default_min_lap_time_ms(),
            grace_period_ms: default_grace_period_ms(),
            liveness_tick_ms: default_liveness_tick_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseConfig {
    #[serde(default = "default_lap_distance_m")]
    pub lap_distance_m: f64,
    #[serde(default = "default_laps_planned")]
    pub laps_planned: u32,
}

fn default_lap_distance_m() -> f64 {
    400.0
}

fn default_laps_planned() -> u32 {
    50
}

impl CourseConfig {
    pub fn distance_total_m(&self) -> f64 {
        self.lap_distance_m * f64::from(self.laps_planned)
    }
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            lap_distance_m: default_lap_distance_m(),
            laps_planned: default_laps_planned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,
}

fn default_capacity() -> usize {
    32
}

fn default_retry_ms() -> u64 {
    1_000
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            retry_ms: default_retry_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("race.json")
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub address: String,
    pub name: String,
    #[serde(default)]
    pub color0: u32,
    #[serde(default)]
    pub color1: u32,
    #[serde(default = "default_in_race")]
    pub in_race: bool,
}

fn default_in_race() -> bool {
    true
}

impl LapwingConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.min_lap_time_ms == 0 {
            return Err(ConfigError::Validation(
                "timing.min_lap_time_ms must be > 0".into(),
            ));
        }
        if self.timing.grace_period_ms > self.timing.min_lap_time_ms {
            return Err(ConfigError::Validation(
                "timing.grace_period_ms must not exceed timing.min_lap_time_ms".into(),
            ));
        }
        if self.timing.liveness_tick_ms == 0 {
            return Err(ConfigError::Validation(
                "timing.liveness_tick_ms must be > 0".into(),
            ));
        }
        if self.course.lap_distance_m <= 0.0 {
            return Err(ConfigError::Validation(
                "course.lap_distance_m must be > 0".into(),
            ));
        }
        if self.mailboxes.capacity == 0 {
            return Err(ConfigError::Validation(
                "mailboxes.capacity must be > 0".into(),
            ));
        }
        if self.roster.is_empty() {
            return Err(ConfigError::Validation("roster must not be empty".into()));
        }
        for (i, entry) in self.roster.iter().enumerate() {
            if entry.address.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "roster[{i}] has an empty address"
                )));
            }
            if self.roster[..i].iter().any(|e| e.address == entry.address) {
                return Err(ConfigError::Validation(format!(
                    "duplicate roster address '{}'",
                    entry.address
                )));
            }
        }
        Ok(())
    }

    /// Smallest valid configuration, used by tests and as the CLI fallback.
    pub fn minimal() -> Self {
        Self {
            timing: TimingConfig::default(),
            course: CourseConfig::default(),
            mailboxes: MailboxConfig::default(),
            snapshot: SnapshotConfig::default(),
            crossing_log: CrossingLogConfig::default(),
            roster: vec![RosterEntry {
                address: "00:00:00:00:00:01".into(),
                name: "tag-1".into(),
                color0: 0xff0000,
                color1: 0x0000ff,
                in_race: true,
            }],
            catch_all: false,
        }
    }
}

impl Default for LapwingConfig {
    fn default() -> Self {
        Self::minimal()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = LapwingConfig::minimal();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [timing]
            min_lap_time_ms = 15000
            grace_period_ms = 2000

            [course]
            lap_distance_m = 250.0
            laps_planned = 40

            [mailboxes]
            capacity = 16
            retry_ms = 500

            [[roster]]
            address = "aa:bb:cc:dd:ee:01"
            name = "alpha"
            color0 = 0xff0000

            [[roster]]
            address = "aa:bb:cc:dd:ee:02"
            name = "bravo"
        "#;

        let config = LapwingConfig::from_toml(toml).unwrap();
        assert_eq!(config.timing.min_lap_time_ms, 15_000);
        assert_eq!(config.roster.len(), 2);
        assert!(config.roster[1].in_race);
        assert_eq!(config.course.distance_total_m(), 10_000.0);
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let mut config = LapwingConfig::minimal();
        config.roster.push(config.roster[0].clone());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_grace_period_bounded_by_min_lap_time() {
        let mut config = LapwingConfig::minimal();
        config.timing.grace_period_ms = config.timing.min_lap_time_ms + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_roster_rejected() {
        let mut config = LapwingConfig::minimal();
        config.roster.clear();
        assert!(config.validate().is_err());
    }
}
