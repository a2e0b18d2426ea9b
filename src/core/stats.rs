use std::time::Duration;

/// Per-frame counters fed by every `RenderState::render`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStatistics {
    pub draw_calls: u64,
    pub vertices: u64,
    pub frames: u64,
    pub frame_time: Duration,
}

impl RenderStatistics {
    /// Starts a new frame. Counters restart at zero.
    pub fn reset(&mut self) {
        self.draw_calls = 0;
        self.vertices = 0;
    }

    #[inline]
    pub fn record_draw(&mut self, vertices: usize) {
        self.draw_calls += 1;
        self.vertices += vertices as u64;
    }

    pub fn finish_frame(&mut self, elapsed: Duration) {
        self.frames += 1;
        self.frame_time = elapsed;
    }

    pub fn summary(&self) -> String {
        format!(
            "draw calls: {}\nvertices: {}\nframe: {:.2} ms",
            self.draw_calls,
            self.vertices,
            self.frame_time.as_secs_f64() * 1000.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_zeroes_frame_counters() {
        let mut stats = RenderStatistics::default();
        stats.record_draw(36);
        stats.record_draw(6);
        assert_eq!((stats.draw_calls, stats.vertices), (2, 42));
        stats.reset();
        assert_eq!((stats.draw_calls, stats.vertices), (0, 0));
    }
}
