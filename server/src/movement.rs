//! Flying movement model
//!
//! Runs on the authority once per tick for every entity that has an intent.
//! The intent's move axes are resolved against the sender's camera basis so
//! "forward" always means "where the camera looks", then velocity eases toward
//! the desired velocity and the entity turns to face its travel direction.
//!
//! Sign convention: `camera_pitch` is the camera's elevation above the entity,
//! so a positive pitch looks down. The basis negates it exactly once here:
//!
//! ```text
//! basis   = rot_y(yaw) * rot_x(-pitch)
//! forward = basis * -Z
//! right   = basis * +X
//! ```
//!
//! Entities face local -Z.

use glam::{Mat3, Quat, Vec3};
use shared::config::{MovementConfig, FACE_EPSILON_SQ, MOVE_EPSILON_SQ};
use shared::{CameraAngles, InputIntent, Pose};

/// Orientation of the camera that produced an intent.
pub fn camera_basis<A: CameraAngles + ?Sized>(angles: &A) -> Quat {
    Quat::from_rotation_y(angles.yaw().to_radians())
        * Quat::from_rotation_x(-angles.pitch().to_radians())
}

/// Rotation whose local -Z points along `direction`.
///
/// Falls back to `current`'s right axis when `direction` is (anti)parallel to
/// world up, which keeps vertical-only flight from spinning the entity.
pub fn look_rotation(direction: Vec3, current: Quat) -> Quat {
    let forward = direction.normalize_or_zero();
    if forward == Vec3::ZERO {
        return current;
    }

    let mut right = forward.cross(Vec3::Y);
    if right.length_squared() < 1e-6 {
        let fallback = current * Vec3::X;
        right = fallback - forward * fallback.dot(forward);
        if right.length_squared() < 1e-6 {
            right = Vec3::X;
        }
    }
    let right = right.normalize();
    let up = right.cross(forward);

    Quat::from_mat3(&Mat3::from_cols(right, up, -forward)).normalize()
}

#[derive(Debug, Clone, Default)]
pub struct MovementEngine {
    config: MovementConfig,
}

impl MovementEngine {
    pub fn new(config: MovementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// World-space steering direction, length at most 1.
    pub fn desired_direction(&self, intent: &InputIntent) -> Vec3 {
        let basis = camera_basis(intent);
        let forward = basis * Vec3::NEG_Z;
        let right = basis * Vec3::X;

        (forward * intent.move_axes.y + right * intent.move_axes.x + Vec3::Y * intent.vertical_axis)
            .clamp_length_max(1.0)
    }

    /// Steers velocity and rotation toward the intent. Position is left to
    /// the integration step.
    pub fn advance(&self, pose: &mut Pose, intent: &InputIntent, dt: f32) {
        let desired = self.desired_direction(intent);
        let magnitude_sq = desired.length_squared();

        let rate = if magnitude_sq > MOVE_EPSILON_SQ {
            self.config.acceleration
        } else {
            self.config.deceleration
        };
        let blend = (dt * rate).clamp(0.0, 1.0);
        pose.velocity = pose
            .velocity
            .lerp(desired * self.config.fly_speed, blend);

        if magnitude_sq > FACE_EPSILON_SQ {
            let target = look_rotation(desired, pose.rotation);
            let turn = (dt * self.config.turn_speed).clamp(0.0, 1.0);
            pose.rotation = pose.rotation.slerp(target, turn).normalize();
        }
    }
}
