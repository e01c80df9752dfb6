//! Frame clock and fade easing curves.

use std::time::{Duration, Instant};

use tracing::debug;

/// Per-frame timing sample handed to every stage and pass.
#[derive(Clone, Copy, Debug)]
pub struct FrameTiming {
    /// Seconds since the first frame.
    pub elapsed_secs: f32,
    /// Seconds since the previous frame (zero on the first frame).
    pub delta_secs: f32,
    /// Monotonic frame counter, starting at zero.
    pub frame_index: u32,
}

/// Easing shape applied to the fade-in pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FadeCurve {
    #[default]
    Linear,
    Smoothstep,
    EaseInOut,
}

impl FadeCurve {
    pub fn sample(self, t: f32) -> f32 {
        let clamped = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => clamped,
            FadeCurve::Smoothstep => clamped * clamped * (3.0 - 2.0 * clamped),
            FadeCurve::EaseInOut => {
                if clamped < 0.5 {
                    2.0 * clamped * clamped
                } else {
                    -1.0 + (4.0 - 2.0 * clamped) * clamped
                }
            }
        }
    }
}

/// Wall-clock frame timer owned by the orchestrator.
///
/// The first `tick` pins the start time so a long gap between construction
/// and the first frame does not register as elapsed playback time.
pub(crate) struct FrameClock {
    start: Option<Instant>,
    last_frame: Instant,
    frame_index: u32,
    last_rate_log: Instant,
    frames_since_log: u32,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: None,
            last_frame: now,
            frame_index: 0,
            last_rate_log: now,
            frames_since_log: 0,
        }
    }

    pub fn tick(&mut self) -> FrameTiming {
        let now = Instant::now();
        let start = *self.start.get_or_insert(now);
        let delta = if self.frame_index == 0 {
            Duration::ZERO
        } else {
            now.saturating_duration_since(self.last_frame)
        };
        self.last_frame = now;

        let timing = FrameTiming {
            elapsed_secs: now.saturating_duration_since(start).as_secs_f32(),
            delta_secs: delta.as_secs_f32(),
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.saturating_add(1);

        self.frames_since_log += 1;
        let since_log = now.saturating_duration_since(self.last_rate_log);
        if since_log >= Duration::from_secs(1) {
            debug!(
                fps = (self.frames_since_log as f32 / since_log.as_secs_f32()).round(),
                frame_index = timing.frame_index,
                elapsed = timing.elapsed_secs,
                "render stats"
            );
            self.frames_since_log = 0;
            self.last_rate_log = now;
        }

        timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_curve_increases_monotonically() {
        let curve = FadeCurve::Linear;
        let mut last = 0.0;
        for step in 0..=10 {
            let sample = curve.sample(step as f32 / 10.0);
            assert!(sample >= last - f32::EPSILON);
            last = sample;
        }
    }

    #[test]
    fn smoothstep_matches_expected_values() {
        let curve = FadeCurve::Smoothstep;
        assert!((curve.sample(0.0) - 0.0).abs() < 1e-6);
        assert!((curve.sample(0.5) - 0.5).abs() < 1e-6);
        assert!((curve.sample(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ease_in_out_accelerates_then_decelerates() {
        let curve = FadeCurve::EaseInOut;
        assert!(curve.sample(0.25) < curve.sample(0.5));
        assert!(curve.sample(0.75) > curve.sample(0.5));
        assert!((curve.sample(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn curves_clamp_out_of_range_input() {
        for curve in [FadeCurve::Linear, FadeCurve::Smoothstep, FadeCurve::EaseInOut] {
            assert_eq!(curve.sample(-1.0), 0.0);
            assert!((curve.sample(2.0) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn clock_counts_frames_from_zero() {
        let mut clock = FrameClock::new();
        let first = clock.tick();
        let second = clock.tick();
        assert_eq!(first.frame_index, 0);
        assert_eq!(first.delta_secs, 0.0);
        assert_eq!(second.frame_index, 1);
        assert!(second.elapsed_secs >= first.elapsed_secs);
    }
}
