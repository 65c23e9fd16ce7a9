//! Keyboard and mouse state, and the viewer's control mapping.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Input collected between two loop iterations.
///
/// Mouse motion accumulates raw device deltas, so look speed does not depend
/// on the cursor being inside the window.
#[derive(Debug, Default)]
pub struct InputState {
    /// Keys currently held down.
    pressed_keys: HashSet<KeyCode>,
    /// Motion since the last `begin_frame` (x right, y down).
    mouse_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears per-iteration state. Call after the frame has consumed the input.
    pub fn begin_frame(&mut self) {
        self.mouse_delta = (0.0, 0.0);
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        self.pressed_keys.insert(key);
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    /// Adds a raw motion delta (x right, y down).
    pub fn on_mouse_motion(&mut self, dx: f64, dy: f64) {
        self.mouse_delta.0 += dx as f32;
        self.mouse_delta.1 += dy as f32;
    }

    /// Releases held keys when focus is lost; their release events go elsewhere.
    pub fn on_focus_changed(&mut self, focused: bool) {
        if !focused {
            self.clear();
        }
    }

    /// Drops all held keys and pending motion.
    pub fn clear(&mut self) {
        self.pressed_keys.clear();
        self.mouse_delta = (0.0, 0.0);
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }
}

/// Viewer controls derived from one iteration's input.
///
/// | key          | action                         |
/// |--------------|--------------------------------|
/// | W / S        | forward / back                 |
/// | A / D        | left / right                   |
/// | Space / LShift | up / down                    |
/// | Escape       | quit                           |
/// | C            | move light to camera position  |
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewerActions {
    /// -1, 0 or 1 along the view direction.
    pub forward: f32,
    /// -1, 0 or 1 along the camera right vector.
    pub strafe: f32,
    /// -1, 0 or 1 along world up.
    pub vertical: f32,
    /// Mouse delta (x right, y down).
    pub look: (f32, f32),
    pub quit: bool,
    pub update_light: bool,
}

impl ViewerActions {
    pub fn from_input(input: &InputState) -> Self {
        let axis = |positive: KeyCode, negative: KeyCode| -> f32 {
            let mut value = 0.0;
            if input.is_key_pressed(positive) {
                value += 1.0;
            }
            if input.is_key_pressed(negative) {
                value -= 1.0;
            }
            value
        };

        Self {
            forward: axis(KeyCode::KeyW, KeyCode::KeyS),
            strafe: axis(KeyCode::KeyD, KeyCode::KeyA),
            vertical: axis(KeyCode::Space, KeyCode::ShiftLeft),
            look: input.mouse_delta(),
            quit: input.is_key_pressed(KeyCode::Escape),
            update_light: input.is_key_pressed(KeyCode::KeyC),
        }
    }

    pub fn is_moving(&self) -> bool {
        self.forward != 0.0 || self.strafe != 0.0 || self.vertical != 0.0
    }
}
