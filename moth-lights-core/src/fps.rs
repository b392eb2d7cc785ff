use std::time::{Duration, Instant};

use crate::logging::info;

/// Counts ticks and logs the rate about once a second.
pub struct FpsTracker {
    label: &'static str,
    last: Instant,
    count: u64,
    fps: Option<f32>,
}

impl FpsTracker {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            last: Instant::now(),
            count: 0,
            fps: None,
        }
    }

    /// the rate measured over the last full second
    pub fn fps(&self) -> Option<f32> {
        self.fps
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.count += 1;

        let elapsed = now.saturating_duration_since(self.last);

        if elapsed >= Duration::from_secs(1) {
            let fps = self.count as f32 / elapsed.as_secs_f32();

            self.count = 0;
            self.last = now;
            self.fps = Some(fps);

            info!("{} FPS: {:.1}", self.label, fps);
        }
    }
}
