use std::sync::Arc;
use std::time::Instant;

use super::time_interface::TimeInterface;

/// Per-frame delta source for the render loop.
pub struct FrameClock {
    time: Arc<dyn TimeInterface>,
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new(time: Arc<dyn TimeInterface>) -> Self {
        Self { time, last: None }
    }

    /// Seconds elapsed since the previous call. The first call returns 0.
    pub fn delta(&mut self) -> f64 {
        let now = self.time.now_monotonic();
        let delta = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last = Some(now);
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ManualTime {
        now: Mutex<Instant>,
    }

    impl ManualTime {
        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    #[async_trait]
    impl TimeInterface for ManualTime {
        fn now_monotonic(&self) -> Instant {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }

    #[test]
    fn test_delta_between_frames() {
        let time = Arc::new(ManualTime { now: Mutex::new(Instant::now()) });
        let mut clock = FrameClock::new(time.clone());
        assert_eq!(clock.delta(), 0.0);

        time.advance(Duration::from_millis(16));
        assert!((clock.delta() - 0.016).abs() < 1e-9);

        assert_eq!(clock.delta(), 0.0);
    }
}
