// src/hardware/simulated.rs - In-process device link for the host and tests
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{DeviceLink, LinkError};

/// A position command as received by the simulated device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionCommand {
    pub position: f64,
    pub rate: f64,
}

#[derive(Debug, Default)]
struct LinkShared {
    attempts: AtomicU32,
    connected: AtomicBool,
    commands: Mutex<Vec<PositionCommand>>,
}

/// Device link that refuses the first `failures` connect attempts and then
/// accepts, recording every position command it receives.
#[derive(Debug)]
pub struct SimulatedLink {
    failures: u32,
    latency: Duration,
    log_commands: bool,
    shared: Arc<LinkShared>,
}

/// Read-only view of a [`SimulatedLink`] that stays valid after the link has
/// been handed to a controller.
#[derive(Debug, Clone)]
pub struct SimulatedLinkProbe {
    shared: Arc<LinkShared>,
}

impl SimulatedLink {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            latency: Duration::ZERO,
            log_commands: false,
            shared: Arc::new(LinkShared::default()),
        }
    }

    /// Delay applied to every connect attempt.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_command_logging(mut self, enabled: bool) -> Self {
        self.log_commands = enabled;
        self
    }

    pub fn probe(&self) -> SimulatedLinkProbe {
        SimulatedLinkProbe { shared: Arc::clone(&self.shared) }
    }
}

impl SimulatedLinkProbe {
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<PositionCommand> {
        self.shared
            .commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    pub fn last_command(&self) -> Option<PositionCommand> {
        self.commands().last().copied()
    }
}

#[async_trait]
impl DeviceLink for SimulatedLink {
    async fn connect(&mut self, endpoint: &str) -> Result<(), LinkError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let attempt = self.shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            tracing::trace!("Simulated link refusing attempt {} to {}", attempt, endpoint);
            return Err(LinkError::Unavailable {
                endpoint: endpoint.to_string(),
                reason: format!("simulated refusal {}/{}", attempt, self.failures),
            });
        }
        self.shared.connected.store(true, Ordering::SeqCst);
        tracing::debug!("Simulated link up at {} after {} attempt(s)", endpoint, attempt);
        Ok(())
    }

    fn send_position(&mut self, position: f64, rate: f64) -> Result<(), LinkError> {
        if !self.shared.connected.load(Ordering::SeqCst) {
            return Err(LinkError::NotConnected);
        }
        if self.log_commands {
            tracing::debug!("Device command: position={:.3} rate={:.3}", position, rate);
        }
        let mut commands = self.shared.commands.lock().map_err(|_| LinkError::Closed)?;
        commands.push(PositionCommand { position, rate });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_fails_then_connects() {
        let mut link = SimulatedLink::new(2);
        let probe = link.probe();
        assert_err!(link.connect("ws://test").await);
        assert_err!(link.connect("ws://test").await);
        assert_ok!(link.connect("ws://test").await);
        assert_eq!(probe.attempts(), 3);
        assert!(probe.is_connected());
    }

    #[tokio::test]
    async fn test_commands_require_connection() {
        let mut link = SimulatedLink::new(0);
        let probe = link.probe();
        assert!(matches!(link.send_position(0.5, 0.5), Err(LinkError::NotConnected)));
        assert_ok!(link.connect("ws://test").await);
        assert_ok!(link.send_position(0.25, 0.1));
        assert_eq!(probe.last_command(), Some(PositionCommand { position: 0.25, rate: 0.1 }));
    }

    #[tokio::test]
    async fn test_latency_delays_attempt() {
        let mut link = SimulatedLink::new(0).with_latency(Duration::from_millis(20));
        let started = std::time::Instant::now();
        assert_ok!(link.connect("ws://test").await);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
