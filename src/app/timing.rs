use std::time::{Duration, Instant};

const TITLE_REFRESH: Duration = Duration::from_millis(500);
/// Longest step fed to animations, so a stalled frame does not jump.
const MAX_FRAME_DT: f32 = 0.1;

pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    render_ms: f32,
    triangles: usize,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: String, now: Instant) -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: now,
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            render_ms: 0.0,
            triangles: 0,
            base_title,
        }
    }

    pub fn record_render(&mut self, render_ms: f32, triangles: usize) {
        self.render_ms = render_ms;
        self.triangles = triangles;
    }

    /// Advances to the frame starting at `now`. Returns a new window title
    /// every half second.
    pub fn update(&mut self, now: Instant) -> Option<String> {
        let dt_duration = if let Some(last) = self.last_frame_time {
            now.saturating_duration_since(last)
        } else {
            Duration::from_millis(16)
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().clamp(0.0, MAX_FRAME_DT);

        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed < TITLE_REFRESH {
            return None;
        }
        let fps = self.frame_count as f32 / elapsed.as_secs_f32();
        self.frame_count = 0;
        self.last_fps_time = now;
        Some(format!(
            "{} - {:.1} fps ({} tris, render {:.2} ms)",
            self.base_title, fps, self.triangles, self.render_ms
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_refreshes_twice_a_second() {
        let t0 = Instant::now();
        let mut timing = FrameTiming::new("modelview".to_string(), t0);
        assert!(timing.update(t0 + Duration::from_millis(16)).is_none());
        let title = timing
            .update(t0 + Duration::from_millis(500))
            .expect("title after half a second");
        assert!(title.starts_with("modelview - "));
        assert!(timing.update(t0 + Duration::from_millis(516)).is_none());
    }

    #[test]
    fn frame_delta_is_clamped() {
        let t0 = Instant::now();
        let mut timing = FrameTiming::new(String::new(), t0);
        timing.update(t0);
        timing.update(t0 + Duration::from_secs(3));
        assert_eq!(timing.frame_dt, MAX_FRAME_DT);
    }
}
