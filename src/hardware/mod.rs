// src/hardware/mod.rs - Device link abstraction
pub mod simulated;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("device unavailable at {endpoint}: {reason}")]
    Unavailable { endpoint: String, reason: String },
    #[error("link is not connected")]
    NotConnected,
    #[error("link closed")]
    Closed,
}

/// Transport capability used by the motion controller to reach the actuator.
///
/// `connect` may take arbitrarily long and may fail; the controller runs it
/// off the frame loop and retries on error. `send_position` is called from
/// inside the frame loop and must not block: implementations should hand the
/// command to their own I/O task and return.
#[async_trait]
pub trait DeviceLink: Send + 'static {
    async fn connect(&mut self, endpoint: &str) -> Result<(), LinkError>;

    /// Fire-and-forget position command. `position` and `rate` are both in [0, 1].
    fn send_position(&mut self, position: f64, rate: f64) -> Result<(), LinkError>;
}

