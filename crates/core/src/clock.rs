//! Frame timing: delta time, elapsed time and a rolling frame rate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of frame times kept for the rolling average.
pub const FPS_HISTORY_LEN: usize = 120;

/// Frame clock driven once per rendered frame.
///
/// The only state carried between calls is the last tick instant and a
/// fixed-size window of recent frame durations.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_tick: Instant,
    last_delta: Duration,
    history: VecDeque<Duration>,
    history_total: Duration,
    frame_count: u64,
}

impl FrameClock {
    /// Create a new clock, starting from now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(now: Instant) -> Self {
        Self {
            start: now,
            last_tick: now,
            last_delta: Duration::ZERO,
            history: VecDeque::with_capacity(FPS_HISTORY_LEN),
            history_total: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Total time since the clock was created or last reset.
    pub fn elapsed(&self) -> Duration {
        self.last_tick.duration_since(self.start)
    }

    /// [`elapsed`](Self::elapsed) in seconds.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Marks the end of a frame and returns its duration.
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Duration {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.last_delta = delta;
        self.frame_count += 1;

        if self.history.len() == FPS_HISTORY_LEN
            && let Some(oldest) = self.history.pop_front()
        {
            self.history_total -= oldest;
        }
        self.history.push_back(delta);
        self.history_total += delta;

        delta
    }

    /// Duration of the most recent frame in seconds.
    pub fn delta_secs(&self) -> f32 {
        self.last_delta.as_secs_f32()
    }

    /// Average frames per second over the history window.
    ///
    /// Returns 0.0 until at least one non-zero frame time was recorded.
    pub fn average_fps(&self) -> f32 {
        if self.history.is_empty() || self.history_total.is_zero() {
            return 0.0;
        }
        self.history.len() as f32 / self.history_total.as_secs_f32()
    }

    /// Number of ticks since creation or last reset.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Time left in the current frame's budget for `target_fps`.
    ///
    /// `None` when the budget is already spent or `target_fps` is zero.
    pub fn pacing_delay(&self, target_fps: u32) -> Option<Duration> {
        self.pacing_delay_at(Instant::now(), target_fps)
    }

    fn pacing_delay_at(&self, now: Instant, target_fps: u32) -> Option<Duration> {
        if target_fps == 0 {
            return None;
        }
        let budget = Duration::from_secs_f64(1.0 / f64::from(target_fps));
        let spent = now.saturating_duration_since(self.last_tick);
        budget.checked_sub(spent).filter(|left| !left.is_zero())
    }

    /// Reset the clock to the current time and clear the history.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-3;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_tick_reports_delta() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0);

        let delta = clock.tick_at(t0 + Duration::from_millis(16));
        assert_eq!(delta, Duration::from_millis(16));
        assert!(approx_eq(clock.delta_secs(), 0.016));
        assert_eq!(clock.frame_count(), 1);
    }

    #[test]
    fn test_elapsed_follows_ticks() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0);
        clock.tick_at(t0 + Duration::from_millis(10));
        clock.tick_at(t0 + Duration::from_millis(30));
        assert_eq!(clock.elapsed(), Duration::from_millis(30));
    }

    #[test]
    fn test_average_fps_steady_rate() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0);
        for i in 1..=10 {
            clock.tick_at(t0 + Duration::from_millis(20 * i));
        }
        assert!(approx_eq(clock.average_fps(), 50.0));
    }

    #[test]
    fn test_average_fps_window_drops_old_frames() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0);
        let mut now = t0;

        // Slow frames first, then a full window of fast ones.
        for _ in 0..10 {
            now += Duration::from_millis(100);
            clock.tick_at(now);
        }
        for _ in 0..FPS_HISTORY_LEN {
            now += Duration::from_millis(10);
            clock.tick_at(now);
        }

        assert!(approx_eq(clock.average_fps(), 100.0));
    }

    #[test]
    fn test_average_fps_empty() {
        let clock = FrameClock::new();
        assert_eq!(clock.average_fps(), 0.0);
    }

    #[test]
    fn test_pacing_delay() {
        let t0 = Instant::now();
        let clock = FrameClock::starting_at(t0);

        let left = clock
            .pacing_delay_at(t0 + Duration::from_millis(5), 50)
            .unwrap();
        assert_eq!(left, Duration::from_millis(15));

        assert!(clock.pacing_delay_at(t0 + Duration::from_millis(25), 50).is_none());
        assert!(clock.pacing_delay_at(t0, 0).is_none());
    }

    #[test]
    fn test_reset_clears_history() {
        let t0 = Instant::now();
        let mut clock = FrameClock::starting_at(t0);
        clock.tick_at(t0 + Duration::from_millis(16));
        clock.reset();
        assert_eq!(clock.frame_count(), 0);
        assert_eq!(clock.average_fps(), 0.0);
    }
}
