//! Host driver configuration.
//!
//! Read from a JSON file; every field is optional:
//! ```json
//! { "instances": 500, "tick_rate_hz": 100, "max_ticks": 1000, "threads": 4,
//!   "fault_policy": "halt", "origin": 0 }
//! ```

use serde::{Serialize, Deserialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// What the host does when an instance faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Park the faulting instance; the rest keep running.
    #[default]
    Halt,
    /// Stop the whole run.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Number of independent CPU instances.
    pub instances: usize,
    /// Ticks per second. Each tick steps every live instance once. 0 runs unpaced.
    pub tick_rate_hz: u32,
    /// Stop after this many ticks. `None` runs until every instance halts.
    pub max_ticks: Option<u64>,
    /// Worker threads used to step instances within a tick.
    pub threads: usize,
    pub fault_policy: FaultPolicy,
    /// Load address for the program image.
    pub origin: u16,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            instances: 1,
            tick_rate_hz: 100,
            max_ticks: None,
            threads: 1,
            fault_policy: FaultPolicy::Halt,
            origin: 0,
        }
    }
}

impl HostConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: HostConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instances == 0 {
            return Err(ConfigError::Invalid("instances must be at least 1".into()));
        }
        if self.threads == 0 {
            return Err(ConfigError::Invalid("threads must be at least 1".into()));
        }
        Ok(())
    }

    /// Wall-clock budget for one tick, if paced.
    pub fn tick_period(&self) -> Option<Duration> {
        match self.tick_rate_hz {
            0 => None,
            hz => Some(Duration::from_nanos(1_000_000_000 / u64::from(hz))),
        }
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid config file: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::from_json("{}").unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.tick_period(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_partial_override() {
        let config =
            HostConfig::from_json(r#"{"instances": 500, "fault_policy": "abort", "tick_rate_hz": 0}"#)
                .unwrap();
        assert_eq!(config.instances, 500);
        assert_eq!(config.fault_policy, FaultPolicy::Abort);
        assert_eq!(config.tick_period(), None);
        assert_eq!(config.threads, 1);
    }

    #[test]
    fn test_rejects_zero_instances() {
        let err = HostConfig::from_json(r#"{"instances": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let err = HostConfig::from_json(r#"{"fault_policy": "retry"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
