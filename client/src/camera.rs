//! Orbit camera look angles
//!
//! The client never renders a real camera, but the look angles still matter:
//! they are sampled into every intent so the authority knows which way
//! "forward" is. Pitch is the camera's elevation above its target in degrees
//! (positive looks down), yaw is the heading around world up in `[0, 360)`.

use glam::{Quat, Vec2, Vec3};
use shared::config::CameraConfig;
use shared::{CameraAngles, EntityHandle};

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    config: CameraConfig,
    pitch: f32,
    yaw: f32,
    target: Option<EntityHandle>,
}

impl OrbitCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            pitch: 0.0,
            yaw: 0.0,
            target: None,
        }
    }

    /// `delta.x` drives pitch, `delta.y` drives yaw.
    pub fn add_look_rotation(&mut self, delta: Vec2, multiplier: f32) {
        let scale = self.config.rotation_speed * multiplier;
        self.yaw = wrap_degrees(self.yaw + delta.y * scale);
        self.pitch = (self.pitch - delta.x * scale)
            .clamp(self.config.min_pitch_deg, self.config.max_pitch_deg);
    }

    /// Follows `entity`, looking along its current heading.
    pub fn set_target(&mut self, entity: EntityHandle, rotation: Quat) {
        self.target = Some(entity);
        self.yaw = heading_degrees(rotation);
        self.pitch = 0.0;
    }

    pub fn target(&self) -> Option<EntityHandle> {
        self.target
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}

impl CameraAngles for OrbitCamera {
    fn pitch(&self) -> f32 {
        self.pitch
    }

    fn yaw(&self) -> f32 {
        self.yaw
    }
}

/// Heading of an entity facing local -Z, in `[0, 360)` degrees.
pub fn heading_degrees(rotation: Quat) -> f32 {
    let forward = rotation * Vec3::NEG_Z;
    if forward.x.abs() < 1e-6 && forward.z.abs() < 1e-6 {
        return 0.0;
    }
    wrap_degrees((-forward.x).atan2(-forward.z).to_degrees())
}

/// Maps any angle into `[0, 360)`.
///
/// `rem_euclid` rounds tiny negative angles up to exactly 360.
fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
