// src/motion/mod.rs - Actuator motion control and stroke policy
pub mod controller;
pub mod oscillation;

pub use controller::{ConnectionState, Direction, MotionController};
pub use oscillation::{OscillationConfig, OscillationPolicy};
