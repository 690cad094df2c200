//! Per-tick control intent carried from the owning participant to the authority.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Read access to the current look angles, in degrees.
///
/// `pitch` is the orbit camera's elevation above its target: positive values
/// put the camera above the entity looking down. `yaw` is the heading around
/// world up.
pub trait CameraAngles {
    fn pitch(&self) -> f32;
    fn yaw(&self) -> f32;
}

/// Discrete button bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Buttons(pub u32);

impl Buttons {
    pub fn is_set(&self, bit: u8) -> bool {
        bit < 32 && self.0 & (1 << bit) != 0
    }

    pub fn set(&mut self, bit: u8, pressed: bool) {
        if bit >= 32 {
            return;
        }
        if pressed {
            self.0 |= 1 << bit;
        } else {
            self.0 &= !(1 << bit);
        }
    }
}

/// One tick worth of control input for a single entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputIntent {
    /// x = right, y = forward; magnitude <= 1 once flushed.
    pub move_axes: Vec2,
    /// -1 down, 0 hold altitude, 1 up.
    pub vertical_axis: f32,
    pub camera_pitch: f32,
    pub camera_yaw: f32,
    pub buttons: Buttons,
}

impl CameraAngles for InputIntent {
    fn pitch(&self) -> f32 {
        self.camera_pitch
    }

    fn yaw(&self) -> f32 {
        self.camera_yaw
    }
}

/// Intent plus the sequencing the authority needs to drop stale deliveries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputState {
    pub sequence: u32,
    pub timestamp: u64,
    pub intent: InputIntent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buttons_set_and_clear() {
        let mut buttons = Buttons::default();
        buttons.set(3, true);
        assert!(buttons.is_set(3));
        assert!(!buttons.is_set(2));

        buttons.set(3, false);
        assert_eq!(buttons, Buttons(0));
    }

    #[test]
    fn test_buttons_ignore_out_of_range_bits() {
        let mut buttons = Buttons::default();
        buttons.set(40, true);
        assert_eq!(buttons, Buttons(0));
        assert!(!buttons.is_set(40));
    }

    #[test]
    fn test_intent_exposes_camera_angles() {
        let intent = InputIntent {
            camera_pitch: 12.5,
            camera_yaw: 270.0,
            ..Default::default()
        };
        assert_eq!(intent.pitch(), 12.5);
        assert_eq!(intent.yaw(), 270.0);
    }
}
