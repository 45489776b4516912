// src/host.rs - Render loop that drives the motion controller
use std::future::Future;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;

use crate::config::HostConfig;
use crate::motion::controller::{ConnectionState, MotionController};
use crate::scheduler::frame_clock::FrameClock;
use crate::scheduler::time_interface::TimeInterface;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub final_position: f64,
    pub state: ConnectionState,
    pub connect_attempts: u32,
}

/// Tick `controller` at the configured frame rate until `max_frames` frames
/// have run or `shutdown` resolves.
pub async fn run_render_loop<S>(
    controller: &mut MotionController,
    host: &HostConfig,
    time: Arc<dyn TimeInterface>,
    max_frames: Option<u64>,
    shutdown: S,
) -> RunSummary
where
    S: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(host.frame_period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut clock = FrameClock::new(time);
    let mut frames = 0u64;
    tokio::pin!(shutdown);

    tracing::info!("Render loop running at {} Hz", host.frame_rate);
    while max_frames.is_none_or(|max| frames < max) {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested after {} frames", frames);
                break;
            }
            _ = interval.tick() => {}
        }

        controller.update(clock.delta());
        frames += 1;

        if host.report_every > 0 && frames % host.report_every == 0 {
            tracing::debug!(
                "frame {}: position={:.3} target={:.3} state={:?}",
                frames,
                controller.current_position(),
                controller.target_position(),
                controller.connection_state()
            );
        }
    }

    RunSummary {
        frames,
        final_position: controller.current_position(),
        state: controller.connection_state(),
        connect_attempts: controller.connect_attempts(),
    }
}
