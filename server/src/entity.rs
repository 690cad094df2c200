use glam::Vec3;
use shared::{EntityHandle, EntityState, ParticipantId, Pose};

/// An authoritative entity in the world.
#[derive(Debug, Clone)]
pub struct Entity {
    pub handle: EntityHandle,
    /// Participant whose intents steer this entity.
    pub owner: ParticipantId,
    pub pose: Pose,
}

impl Entity {
    pub fn new(handle: EntityHandle, owner: ParticipantId, position: Vec3) -> Self {
        Entity {
            handle,
            owner,
            pose: Pose::at(position),
        }
    }

    // Plain Euler step, no drag and no collision.
    pub fn integrate(&mut self, dt: f32) {
        self.pose.position += self.pose.velocity * dt;
    }

    pub fn to_state(&self) -> EntityState {
        EntityState {
            entity: self.handle,
            owner: self.owner,
            pose: self.pose,
        }
    }
}
