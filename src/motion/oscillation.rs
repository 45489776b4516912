//! Back-and-forth stroke policy.
//!
//! Each completed half-stroke toggles between the home position (0) and the
//! current stroke distance. Rate and distance occasionally mutate so the
//! motion does not settle into a fixed rhythm.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::motion::controller::MotionController;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OscillationConfig {
    #[serde(default = "default_min_rate")]
    pub min_rate: f64,
    #[serde(default = "default_max_rate")]
    pub max_rate: f64,
    #[serde(default = "default_min_distance")]
    pub min_distance: f64,
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    /// Chance per half-stroke that rate (and, independently, distance) is redrawn.
    #[serde(default = "default_mutation_probability")]
    pub mutation_probability: f64,
    #[serde(default = "default_initial_rate")]
    pub initial_rate: f64,
    #[serde(default = "default_initial_distance")]
    pub initial_distance: f64,
}

fn default_min_rate() -> f64 { 0.1 }
fn default_max_rate() -> f64 { 0.5 }
fn default_min_distance() -> f64 { 0.0 }
fn default_max_distance() -> f64 { 1.0 }
fn default_mutation_probability() -> f64 { 0.05 }
fn default_initial_rate() -> f64 { 0.1 }
fn default_initial_distance() -> f64 { 0.5 }

impl Default for OscillationConfig {
    fn default() -> Self {
        Self {
            min_rate: default_min_rate(),
            max_rate: default_max_rate(),
            min_distance: default_min_distance(),
            max_distance: default_max_distance(),
            mutation_probability: default_mutation_probability(),
            initial_rate: default_initial_rate(),
            initial_distance: default_initial_distance(),
        }
    }
}

impl OscillationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if !(self.min_rate > 0.0 && self.min_rate <= self.max_rate && self.max_rate.is_finite()) {
            return invalid(format!(
                "oscillation rates must satisfy 0 < min_rate <= max_rate, got {}..{}",
                self.min_rate, self.max_rate
            ));
        }
        if !(0.0 <= self.min_distance && self.min_distance <= self.max_distance && self.max_distance <= 1.0) {
            return invalid(format!(
                "oscillation distances must satisfy 0 <= min <= max <= 1, got {}..{}",
                self.min_distance, self.max_distance
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_probability) {
            return invalid(format!(
                "oscillation.mutation_probability must lie in [0, 1], got {}",
                self.mutation_probability
            ));
        }
        if !(self.initial_rate.is_finite() && self.initial_rate > 0.0) {
            return invalid(format!("oscillation.initial_rate must be positive, got {}", self.initial_rate));
        }
        if !(0.0..=1.0).contains(&self.initial_distance) {
            return invalid(format!(
                "oscillation.initial_distance must lie in [0, 1], got {}",
                self.initial_distance
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OscillationPolicy {
    config: OscillationConfig,
    rate: f64,
    distance: f64,
    inward: bool,
}

impl OscillationPolicy {
    pub fn new(config: OscillationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            rate: config.initial_rate,
            distance: config.initial_distance,
            inward: true,
            config,
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// True when the last issued move headed home.
    pub fn is_inward(&self) -> bool {
        self.inward
    }

    /// Target and rate of the next half-stroke.
    pub fn next_move<R: Rng>(&mut self, rng: &mut R) -> (f64, f64) {
        let p = self.config.mutation_probability;
        if rng.random_bool(p) {
            self.rate = rng.random_range(self.config.min_rate..=self.config.max_rate);
            tracing::debug!("Stroke rate changed to {:.3}", self.rate);
        }
        if rng.random_bool(p) {
            self.distance = rng.random_range(self.config.min_distance..=self.config.max_distance);
            tracing::debug!("Stroke distance changed to {:.3}", self.distance);
        }
        self.inward = !self.inward;
        let target = if self.inward { 0.0 } else { self.distance };
        (target, self.rate)
    }

    /// Drive `controller` with this policy: every finished move issues the next one.
    pub fn attach<R>(mut self, controller: &mut MotionController, mut rng: R)
    where
        R: Rng + Send + 'static,
    {
        controller.on_finished_move(move |c| {
            let (target, rate) = self.next_move(&mut rng);
            c.move_to(target, rate);
        });
    }
}
