// src/lib.rs - Library surface for the actuator host
pub mod communication;
pub mod config;
pub mod hardware;
pub mod host;
pub mod motion;
pub mod scheduler;

pub use communication::event_slot::EventSlot;
pub use config::{Config, ConfigError, ControllerConfig, HostConfig, SimulatorConfig};
pub use hardware::{DeviceLink, LinkError, simulated::{PositionCommand, SimulatedLink, SimulatedLinkProbe}};
pub use motion::controller::{ConnectionState, Direction, MotionController};
pub use motion::oscillation::{OscillationConfig, OscillationPolicy};
pub use scheduler::frame_clock::FrameClock;
pub use scheduler::time_interface::{TimeInterface, TokioTime};
