//! Input events delivered to the scene

use glam::Vec3;

/// Distance the camera moves per key press
pub const CAMERA_SPEED: f32 = 0.2;

/// Discrete input the scene reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
}

impl InputEvent {
    /// Camera translation for one occurrence of the event
    pub fn camera_delta(self) -> Vec3 {
        let direction = match self {
            InputEvent::MoveForward => Vec3::NEG_Z,
            InputEvent::MoveBackward => Vec3::Z,
            InputEvent::MoveLeft => Vec3::NEG_X,
            InputEvent::MoveRight => Vec3::X,
        };
        direction * CAMERA_SPEED
    }
}
