//! Keyboard and scroll state sampled once per frame.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Input accumulated between two calls to [`InputState::begin_frame`].
#[derive(Debug, Default)]
pub struct InputState {
    held: HashSet<KeyCode>,
    pressed_this_frame: HashSet<KeyCode>,
    scroll: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears edge-triggered state. Call once per frame after handling input.
    pub fn begin_frame(&mut self) {
        self.pressed_this_frame.clear();
        self.scroll = 0.0;
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        // OS key repeat must not re-trigger.
        if self.held.insert(key) {
            self.pressed_this_frame.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.held.remove(&key);
    }

    /// Vertical scroll in lines; pixel deltas are converted by the caller.
    pub fn on_scroll(&mut self, lines: f32) {
        self.scroll += lines;
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    /// True only in the frame the key went down.
    pub fn was_pressed(&self, key: KeyCode) -> bool {
        self.pressed_this_frame.contains(&key)
    }

    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    /// -1, 0 or 1 from a pair of opposing keys.
    pub fn axis(&self, negative: KeyCode, positive: KeyCode) -> f32 {
        let mut value = 0.0;
        if self.is_key_held(negative) {
            value -= 1.0;
        }
        if self.is_key_held(positive) {
            value += 1.0;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_is_edge_triggered() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyR);
        assert!(input.was_pressed(KeyCode::KeyR));
        assert!(input.is_key_held(KeyCode::KeyR));

        input.begin_frame();
        input.on_key_pressed(KeyCode::KeyR); // repeat
        assert!(!input.was_pressed(KeyCode::KeyR));
        assert!(input.is_key_held(KeyCode::KeyR));

        input.on_key_released(KeyCode::KeyR);
        assert!(!input.is_key_held(KeyCode::KeyR));
    }

    #[test]
    fn test_scroll_accumulates_per_frame() {
        let mut input = InputState::new();
        input.on_scroll(1.0);
        input.on_scroll(0.5);
        assert_eq!(input.scroll(), 1.5);
        input.begin_frame();
        assert_eq!(input.scroll(), 0.0);
    }

    #[test]
    fn test_axis() {
        let mut input = InputState::new();
        assert_eq!(input.axis(KeyCode::KeyA, KeyCode::KeyD), 0.0);
        input.on_key_pressed(KeyCode::KeyD);
        assert_eq!(input.axis(KeyCode::KeyA, KeyCode::KeyD), 1.0);
        input.on_key_pressed(KeyCode::KeyA);
        assert_eq!(input.axis(KeyCode::KeyA, KeyCode::KeyD), 0.0);
    }
}
