//! Frame statistics shown in the window title.

use instant::Duration;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameStats {
    frames: u32,
    elapsed: Duration,
    fps: f32,
    frame_ms: f32,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, dt: Duration) {
        self.frames += 1;
        self.elapsed += dt;
    }

    /// Folds the frames recorded since the last sample into the averages.
    pub fn sample(&mut self) {
        if self.frames == 0 || self.elapsed.is_zero() {
            return;
        }
        let secs = self.elapsed.as_secs_f32();
        self.fps = self.frames as f32 / secs;
        self.frame_ms = 1000.0 * secs / self.frames as f32;
        self.frames = 0;
        self.elapsed = Duration::ZERO;
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn frame_ms(&self) -> f32 {
        self.frame_ms
    }

    pub fn summary(&self) -> String {
        format!("{:.0} fps ({:.1} ms)", self.fps, self.frame_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_over_the_sampling_window() {
        let mut stats = FrameStats::new();
        for _ in 0..30 {
            stats.record(Duration::from_millis(20));
        }
        stats.sample();
        assert!((stats.fps() - 50.0).abs() < 1e-3);
        assert!((stats.frame_ms() - 20.0).abs() < 1e-3);
        assert_eq!(stats.summary(), "50 fps (20.0 ms)");

        stats.sample();
        assert!((stats.fps() - 50.0).abs() < 1e-3);
    }
}
