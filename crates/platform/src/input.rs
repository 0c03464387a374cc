//! Keyboard input tracking.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Tracks which keys are held and which changed this frame.
#[derive(Debug, Default)]
pub struct InputState {
    /// Currently pressed keys.
    pressed_keys: HashSet<KeyCode>,
    /// Keys that went down this frame.
    just_pressed_keys: HashSet<KeyCode>,
    /// Keys that went up this frame.
    just_released_keys: HashSet<KeyCode>,
}

impl InputState {
    /// Creates an empty input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the per-frame sets; call at the start of each frame.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
    }

    /// Records a key press. Repeat events do not re-enter the
    /// just-pressed set.
    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    /// Records a key release.
    pub fn on_key_released(&mut self, key: KeyCode) {
        if self.pressed_keys.remove(&key) {
            self.just_released_keys.insert(key);
        }
    }

    /// Returns true while the key is held.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Returns true only on the frame the key went down.
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    /// Returns true only on the frame the key went up.
    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.just_released_keys.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release_cycle() {
        let mut input = InputState::new();

        input.on_key_pressed(KeyCode::ArrowLeft);
        assert!(input.is_key_pressed(KeyCode::ArrowLeft));
        assert!(input.is_key_just_pressed(KeyCode::ArrowLeft));

        input.begin_frame();
        assert!(input.is_key_pressed(KeyCode::ArrowLeft));
        assert!(!input.is_key_just_pressed(KeyCode::ArrowLeft));

        input.on_key_released(KeyCode::ArrowLeft);
        assert!(!input.is_key_pressed(KeyCode::ArrowLeft));
        assert!(input.is_key_just_released(KeyCode::ArrowLeft));
    }

    #[test]
    fn repeat_press_does_not_rearm_just_pressed() {
        let mut input = InputState::new();

        input.on_key_pressed(KeyCode::KeyW);
        input.begin_frame();
        input.on_key_pressed(KeyCode::KeyW);
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(!input.is_key_just_pressed(KeyCode::KeyW));
    }
}
