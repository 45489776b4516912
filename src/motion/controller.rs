// src/motion/controller.rs - Frame-driven controller for a single linear actuator
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;

use crate::communication::event_slot::EventSlot;
use crate::config::ControllerConfig;
use crate::hardware::DeviceLink;
use crate::scheduler::time_interface::{TimeInterface, TokioTime};

/// Normalized position units per second at rate 1.0.
pub const SPEED_SCALE: f64 = 5.2;
/// Distance from the target at which a move counts as complete.
pub const COMPLETION_EPSILON: f64 = 0.01;
/// Fixed pause between failed connect attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);
/// Substituted for rates that are zero, negative, or not finite.
pub const MIN_RATE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

/// Connection lifecycle as seen by callers.
///
/// `Connected` requires both a live link and a completed first move. The
/// inferred signal exposed by `is_connected` can be set earlier, while the
/// link is still down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingFirstMove,
    Connected,
}

enum ConnectOutcome {
    Established(Box<dyn DeviceLink>),
    Cancelled(Box<dyn DeviceLink>),
}

struct PendingConnect {
    cancel: Option<oneshot::Sender<()>>,
    outcome: oneshot::Receiver<ConnectOutcome>,
    task: JoinHandle<()>,
}

enum LinkSlot {
    Idle(Box<dyn DeviceLink>),
    Connecting(PendingConnect),
    Live(Box<dyn DeviceLink>),
    /// The connect task went away without handing the link back.
    Lost,
}

pub struct MotionController {
    current_position: f64,
    target_position: f64,
    rate: f64,
    direction: Direction,
    moving: bool,
    first_move_pending: bool,
    connected: bool,
    speed_scale: f64,
    epsilon: f64,
    endpoint: String,
    retry_delay: Duration,
    link: LinkSlot,
    time: Arc<dyn TimeInterface>,
    attempts: Arc<AtomicU32>,
    on_finished_move: EventSlot<MotionController>,
    on_connected: EventSlot<MotionController>,
}

impl MotionController {
    pub fn new(link: impl DeviceLink, config: &ControllerConfig) -> Self {
        Self::with_time(link, config, Arc::new(TokioTime))
    }

    /// Build a controller whose connect retries wait on `time` instead of the
    /// tokio clock.
    pub fn with_time(
        link: impl DeviceLink,
        config: &ControllerConfig,
        time: Arc<dyn TimeInterface>,
    ) -> Self {
        let initial = config.initial_position.clamp(0.0, 1.0);
        Self {
            current_position: initial,
            target_position: initial,
            rate: 1.0,
            direction: Direction::Forward,
            moving: false,
            first_move_pending: true,
            connected: false,
            speed_scale: config.speed_scale,
            epsilon: config.completion_epsilon,
            endpoint: config.endpoint.clone(),
            retry_delay: config.retry_delay(),
            link: LinkSlot::Idle(Box::new(link)),
            time,
            attempts: Arc::new(AtomicU32::new(0)),
            on_finished_move: EventSlot::new(),
            on_connected: EventSlot::new(),
        }
    }

    /// Request a move to `position` at `rate`. Replaces any move in progress;
    /// the device is driven from [`update`](Self::update).
    pub fn move_to(&mut self, position: f64, rate: f64) {
        if !position.is_finite() {
            tracing::warn!("Ignoring move to non-finite position {}", position);
            return;
        }
        let target = position.clamp(0.0, 1.0);
        if target != position {
            tracing::warn!("Move target {} out of range, clamped to {}", position, target);
        }
        let rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            tracing::warn!("Invalid move rate {}, using {}", rate, MIN_RATE);
            MIN_RATE
        };

        self.direction = if target >= self.current_position {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        self.rate = rate;
        self.target_position = target;
        self.moving = true;
        tracing::debug!(
            "Move queued: {:.3} -> {:.3} at rate {:.3} ({:?})",
            self.current_position,
            target,
            rate,
            self.direction
        );
    }

    /// Advance the interpolation by `delta` seconds. Never blocks.
    ///
    /// Completion events fire synchronously from inside this call:
    /// `on_connected` first (only for the first completed move), then
    /// `on_finished_move`.
    pub fn update(&mut self, delta: f64) {
        self.poll_connect();

        if !self.moving || !delta.is_finite() || delta <= 0.0 {
            return;
        }

        let sign = self.direction.sign();
        self.current_position += self.rate * self.speed_scale * delta * sign;

        let remaining = (self.target_position - self.current_position) * sign;
        let finished = remaining.abs() < self.epsilon
            || remaining <= 0.0
            || self.current_position <= 0.0
            || self.current_position >= 1.0;

        if finished {
            self.current_position = self.target_position;
        }
        self.send_to_device();
        if finished {
            self.finish_move();
        }
    }

    /// Start establishing the device link in the background.
    ///
    /// Queues a move to 0 so the first completed move doubles as the
    /// readiness signal. Failed attempts are retried after the configured
    /// delay for as long as the controller lives. Does nothing while an
    /// attempt is in flight or once the link is up.
    pub fn connect(&mut self) {
        match &self.link {
            LinkSlot::Connecting(_) => {
                tracing::debug!("Connect already in progress");
                return;
            }
            LinkSlot::Live(_) => {
                tracing::debug!("Device link already established");
                return;
            }
            LinkSlot::Lost => {
                tracing::error!("No device link available to connect");
                return;
            }
            LinkSlot::Idle(_) => {}
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Cannot connect without a tokio runtime: {}", e);
                return;
            }
        };

        let link = match std::mem::replace(&mut self.link, LinkSlot::Lost) {
            LinkSlot::Idle(link) => link,
            other => {
                self.link = other;
                return;
            }
        };

        self.move_to(0.0, 1.0);

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        tracing::info!("Connecting to device at {}", self.endpoint);
        let task = runtime.spawn(establish_link(
            link,
            self.endpoint.clone(),
            self.retry_delay,
            Arc::clone(&self.time),
            Arc::clone(&self.attempts),
            cancel_rx,
            outcome_tx,
        ));
        self.link = LinkSlot::Connecting(PendingConnect {
            cancel: Some(cancel_tx),
            outcome: outcome_rx,
            task,
        });
    }

    /// Stop retrying. The link returns to the idle slot on the next
    /// [`update`](Self::update).
    pub fn cancel_connect(&mut self) {
        if let LinkSlot::Connecting(pending) = &mut self.link {
            if let Some(cancel) = pending.cancel.take() {
                tracing::info!("Cancelling connect to {}", self.endpoint);
                let _ = cancel.send(());
            }
        }
    }

    pub fn on_finished_move<F>(&mut self, handler: F)
    where
        F: FnMut(&mut MotionController) + Send + 'static,
    {
        self.on_finished_move.set(handler);
    }

    pub fn on_connected<F>(&mut self, handler: F)
    where
        F: FnMut(&mut MotionController) + Send + 'static,
    {
        self.on_connected.set(handler);
    }

    pub fn clear_handlers(&mut self) {
        self.on_finished_move.clear();
        self.on_connected.clear();
    }

    pub fn current_position(&self) -> f64 {
        self.current_position
    }

    pub fn target_position(&self) -> f64 {
        self.target_position
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Connect attempts started so far, successful or not.
    pub fn connect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn connection_state(&self) -> ConnectionState {
        match self.link {
            LinkSlot::Idle(_) | LinkSlot::Lost => ConnectionState::Disconnected,
            LinkSlot::Connecting(_) => ConnectionState::Connecting,
            LinkSlot::Live(_) if self.connected => ConnectionState::Connected,
            LinkSlot::Live(_) => ConnectionState::AwaitingFirstMove,
        }
    }

    fn poll_connect(&mut self) {
        let LinkSlot::Connecting(pending) = &mut self.link else {
            return;
        };
        let outcome = match pending.outcome.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Closed) => None,
        };
        self.link = match outcome {
            Some(ConnectOutcome::Established(link)) => {
                if self.connected {
                    tracing::info!("Device link established at {}", self.endpoint);
                } else {
                    tracing::info!("Device link established at {}, awaiting first move", self.endpoint);
                }
                LinkSlot::Live(link)
            }
            Some(ConnectOutcome::Cancelled(link)) => {
                tracing::info!("Connect to {} cancelled", self.endpoint);
                LinkSlot::Idle(link)
            }
            None => {
                tracing::error!("Connect task ended without returning the device link");
                LinkSlot::Lost
            }
        };
    }

    fn send_to_device(&mut self) {
        if let LinkSlot::Live(link) = &mut self.link {
            if let Err(e) = link.send_position(self.current_position, self.rate.clamp(0.0, 1.0)) {
                tracing::debug!("Position command dropped: {}", e);
            }
        }
    }

    fn finish_move(&mut self) {
        self.moving = false;
        if self.first_move_pending {
            self.first_move_pending = false;
            self.connected = true;
            tracing::info!("First move complete, actuator connected");
            if let Some(mut handler) = self.on_connected.take() {
                handler.call(self);
                self.on_connected.restore(handler);
            }
        }
        tracing::debug!("Move finished at {:.3}", self.current_position);
        if let Some(mut handler) = self.on_finished_move.take() {
            handler.call(self);
            self.on_finished_move.restore(handler);
        }
    }
}

impl Drop for MotionController {
    fn drop(&mut self) {
        if let LinkSlot::Connecting(pending) = &self.link {
            pending.task.abort();
        }
    }
}

impl fmt::Debug for MotionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionController")
            .field("current_position", &self.current_position)
            .field("target_position", &self.target_position)
            .field("rate", &self.rate)
            .field("direction", &self.direction)
            .field("moving", &self.moving)
            .field("state", &self.connection_state())
            .finish()
    }
}

async fn establish_link(
    mut link: Box<dyn DeviceLink>,
    endpoint: String,
    retry_delay: Duration,
    time: Arc<dyn TimeInterface>,
    attempts: Arc<AtomicU32>,
    mut cancel: oneshot::Receiver<()>,
    outcome_tx: oneshot::Sender<ConnectOutcome>,
) {
    let outcome = loop {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let result = tokio::select! {
            _ = &mut cancel => None,
            result = link.connect(&endpoint) => Some(result),
        };
        match result {
            None => break ConnectOutcome::Cancelled(link),
            Some(Ok(())) => {
                tracing::debug!("Connect attempt {} to {} succeeded", attempt, endpoint);
                break ConnectOutcome::Established(link);
            }
            Some(Err(e)) => {
                tracing::warn!(
                    "Connect attempt {} failed: {}. Retrying in {:?}",
                    attempt,
                    e,
                    retry_delay
                );
            }
        }

        let cancelled = tokio::select! {
            _ = &mut cancel => true,
            _ = time.sleep(retry_delay) => false,
        };
        if cancelled {
            break ConnectOutcome::Cancelled(link);
        }
    };
    let _ = outcome_tx.send(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::simulated::SimulatedLink;
    use std::sync::Mutex;

    fn controller() -> MotionController {
        MotionController::new(SimulatedLink::new(0), &ControllerConfig::default())
    }

    #[test]
    fn test_initial_state() {
        let c = controller();
        assert_eq!(c.current_position(), 1.0);
        assert_eq!(c.target_position(), 1.0);
        assert!(!c.is_moving());
        assert!(!c.is_connected());
        assert_eq!(c.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_direction_from_move() {
        let mut c = controller();
        c.move_to(0.3, 0.5);
        assert_eq!(c.direction(), Direction::Reverse);
        c.move_to(1.0, 0.5);
        assert_eq!(c.direction(), Direction::Forward);
    }

    #[test]
    fn test_out_of_range_target_clamped() {
        let mut c = controller();
        c.move_to(-0.5, 1.0);
        assert_eq!(c.target_position(), 0.0);
        c.move_to(7.0, 1.0);
        assert_eq!(c.target_position(), 1.0);
    }

    #[test]
    fn test_non_finite_target_ignored() {
        let mut c = controller();
        c.move_to(0.4, 0.2);
        c.move_to(f64::NAN, 0.9);
        assert_eq!(c.target_position(), 0.4);
        assert_eq!(c.rate(), 0.2);
    }

    #[test]
    fn test_invalid_rate_replaced() {
        let mut c = controller();
        c.move_to(0.5, 0.0);
        assert_eq!(c.rate(), MIN_RATE);
        c.move_to(0.5, f64::INFINITY);
        assert_eq!(c.rate(), MIN_RATE);
    }

    #[test]
    fn test_step_size() {
        let mut c = controller();
        c.move_to(0.0, 0.1);
        c.update(0.1);
        assert!((c.current_position() - (1.0 - 0.1 * SPEED_SCALE * 0.1)).abs() < 1e-12);
        assert!(c.is_moving());
    }

    #[test]
    fn test_crossing_target_completes() {
        let mut c = controller();
        c.move_to(0.5, 1.0);
        // One frame would carry the position from 1.0 to 0.48.
        c.update(0.1);
        assert_eq!(c.current_position(), 0.5);
        assert!(!c.is_moving());
    }

    #[test]
    fn test_zero_length_move_completes_once() {
        let mut c = controller();
        let count = Arc::new(Mutex::new(0));
        let seen = Arc::clone(&count);
        c.on_finished_move(move |_| *seen.lock().unwrap() += 1);
        c.move_to(1.0, 0.5);
        c.update(0.016);
        c.update(0.016);
        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(c.current_position(), 1.0);
    }

    #[test]
    fn test_connect_without_runtime_stays_disconnected() {
        let mut c = controller();
        c.connect();
        assert_eq!(c.connection_state(), ConnectionState::Disconnected);
        assert_eq!(c.connect_attempts(), 0);
        assert!(!c.is_moving());
    }

    #[test]
    fn test_first_move_without_link_is_not_connected_state() {
        let mut c = controller();
        c.move_to(0.0, 1.0);
        while c.is_moving() {
            c.update(0.1);
        }
        assert!(c.is_connected());
        assert_eq!(c.connection_state(), ConnectionState::Disconnected);
    }
}
