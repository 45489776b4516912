//! # Host Configuration
//!
//! Configuration for the motion controller, the oscillation policy, the render
//! loop, and the simulated device link. Every section and field is optional;
//! missing values fall back to the defaults below.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [controller]
//! endpoint = "ws://localhost:12345/buttplug"
//! speed_scale = 5.2
//! completion_epsilon = 0.01
//! retry_delay_ms = 1000
//!
//! [oscillation]
//! min_rate = 0.1
//! max_rate = 0.5
//! mutation_probability = 0.05
//!
//! [host]
//! frame_rate = 60
//!
//! [simulator]
//! connect_failures = 2
//! ```

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::motion::controller::{COMPLETION_EPSILON, RETRY_DELAY, SPEED_SCALE};
use crate::motion::oscillation::OscillationConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub oscillation: OscillationConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.validate()?;
        self.oscillation.validate()?;
        self.host.validate()?;
        Ok(())
    }
}

/// Motion controller tuning and link settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_speed_scale")]
    pub speed_scale: f64,
    #[serde(default = "default_completion_epsilon")]
    pub completion_epsilon: f64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Assumed resting position before the first move.
    #[serde(default = "default_initial_position")]
    pub initial_position: f64,
}

impl ControllerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.speed_scale.is_finite() && self.speed_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "controller.speed_scale must be positive, got {}",
                self.speed_scale
            )));
        }
        if !(self.completion_epsilon.is_finite() && self.completion_epsilon > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "controller.completion_epsilon must be positive, got {}",
                self.completion_epsilon
            )));
        }
        if !(0.0..=1.0).contains(&self.initial_position) {
            return Err(ConfigError::Invalid(format!(
                "controller.initial_position must lie in [0, 1], got {}",
                self.initial_position
            )));
        }
        if self.endpoint.is_empty() {
            return Err(ConfigError::Invalid("controller.endpoint is empty".to_string()));
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            speed_scale: default_speed_scale(),
            completion_epsilon: default_completion_epsilon(),
            retry_delay_ms: default_retry_delay_ms(),
            initial_position: default_initial_position(),
        }
    }
}

/// Render loop settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Frames between position log lines; 0 disables them.
    #[serde(default = "default_report_every")]
    pub report_every: u64,
}

impl HostConfig {
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid("host.frame_rate must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            report_every: default_report_every(),
        }
    }
}

/// In-process device link used when no real transport is wired in.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimulatorConfig {
    /// Connect attempts that fail before the link comes up.
    #[serde(default)]
    pub connect_failures: u32,
    /// Delay before each connect attempt resolves.
    #[serde(default)]
    pub connect_latency_ms: u64,
    /// Log every position command at debug level.
    #[serde(default)]
    pub log_commands: bool,
}

impl SimulatorConfig {
    pub fn connect_latency(&self) -> Duration {
        Duration::from_millis(self.connect_latency_ms)
    }
}

fn default_endpoint() -> String { "ws://localhost:12345/buttplug".to_string() }
fn default_speed_scale() -> f64 { SPEED_SCALE }
fn default_completion_epsilon() -> f64 { COMPLETION_EPSILON }
fn default_retry_delay_ms() -> u64 { RETRY_DELAY.as_millis() as u64 }
fn default_initial_position() -> f64 { 1.0 }
fn default_frame_rate() -> u32 { 60 }
fn default_report_every() -> u64 { 60 }

/// Load configuration from a TOML file and validate it.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let config: Config = match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                return Err(ConfigError::Toml(e));
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.controller.speed_scale, 5.2);
        assert_eq!(config.controller.completion_epsilon, 0.01);
        assert_eq!(config.controller.retry_delay(), Duration::from_millis(1000));
        assert_eq!(config.controller.initial_position, 1.0);
        assert_eq!(config.host.frame_rate, 60);
        assert_eq!(config.simulator.connect_failures, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("actuator.toml");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "[controller]\nretry_delay_ms = 250\n\n[simulator]\nconnect_failures = 3").unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.controller.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.controller.speed_scale, 5.2);
        assert_eq!(config.simulator.connect_failures, 3);
        assert_eq!(config.oscillation.max_rate, 0.5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[controller]\ninitial_position = 1.5\n").unwrap();

        let err = load_config(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config("/nonexistent/actuator.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[controller\nspeed_scale = ").unwrap();
        assert!(matches!(load_config(path.to_str().unwrap()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_frame_period() {
        let host = HostConfig { frame_rate: 50, report_every: 0 };
        assert_eq!(host.frame_period(), Duration::from_millis(20));
    }
}
