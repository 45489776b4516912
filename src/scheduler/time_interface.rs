use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Clock and timer source. Injected wherever the code waits, so tests can
/// substitute a timer that records delays instead of sleeping.
#[async_trait]
pub trait TimeInterface: Send + Sync {
    fn now_monotonic(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTime;

#[async_trait]
impl TimeInterface for TokioTime {
    fn now_monotonic(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
