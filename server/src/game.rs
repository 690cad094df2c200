use crate::entity::Entity;
use crate::entity_table::EntitySpawner;
use crate::movement::MovementEngine;
use glam::Vec3;
use log::{info, warn};
use shared::config::{MovementConfig, SPAWN_POSITION};
use shared::{EntityHandle, EntityState, InputIntent, ParticipantId};
use std::collections::HashMap;

/// Authoritative simulation state of the gameplay scene.
#[derive(Debug, Clone)]
pub struct World {
    pub tick: u32,
    pub entities: HashMap<EntityHandle, Entity>,
    next_handle: EntityHandle,
    engine: MovementEngine,
}

impl World {
    pub fn new(config: MovementConfig) -> Self {
        Self {
            tick: 0,
            entities: HashMap::new(),
            next_handle: 1,
            engine: MovementEngine::new(config),
        }
    }

    pub fn get(&self, entity: EntityHandle) -> Option<&Entity> {
        self.entities.get(&entity)
    }

    /// Steers `entity` with an intent sent by `participant`.
    ///
    /// Intents from anyone but the entity's owner are dropped.
    pub fn apply_input(
        &mut self,
        participant: ParticipantId,
        entity: EntityHandle,
        intent: &InputIntent,
        dt: f32,
    ) -> bool {
        let Some(target) = self.entities.get_mut(&entity) else {
            return false;
        };
        if target.owner != participant {
            warn!(
                "Participant {} sent input for entity {} owned by {}",
                participant, entity, target.owner
            );
            return false;
        }

        self.engine.advance(&mut target.pose, intent, dt);
        true
    }

    pub fn integrate(&mut self, dt: f32) {
        for entity in self.entities.values_mut() {
            entity.integrate(dt);
        }
        self.tick = self.tick.wrapping_add(1);
    }

    /// Every entity, ordered by handle.
    pub fn snapshot(&self) -> Vec<EntityState> {
        let mut states: Vec<EntityState> = self.entities.values().map(Entity::to_state).collect();
        states.sort_by_key(|state| state.entity);
        states
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(MovementConfig::default())
    }
}

impl EntitySpawner for World {
    fn spawn(&mut self, owner: ParticipantId) -> EntityHandle {
        let handle = self.next_handle;
        self.next_handle += 1;

        let entity = Entity::new(handle, owner, Vec3::from_array(SPAWN_POSITION));
        info!(
            "Spawned entity {} for participant {} at {:?}",
            handle, owner, entity.pose.position
        );
        self.entities.insert(handle, entity);
        handle
    }

    fn despawn(&mut self, entity: EntityHandle) -> bool {
        let removed = self.entities.remove(&entity).is_some();
        if removed {
            info!("Despawned entity {}", entity);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use glam::Vec2;

    const DT: f32 = 1.0 / 60.0;

    fn forward() -> InputIntent {
        InputIntent {
            move_axes: Vec2::new(0.0, 1.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_spawn_assigns_unique_handles_at_spawn_point() {
        let mut world = World::default();
        let a = world.spawn(1);
        let b = world.spawn(2);

        assert_ne!(a, b);
        assert_eq!(world.len(), 2);
        assert_eq!(world.get(a).unwrap().pose.position, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(world.get(b).unwrap().owner, 2);
    }

    #[test]
    fn test_despawn_removes_entity() {
        let mut world = World::default();
        let handle = world.spawn(1);
        assert!(world.despawn(handle));
        assert!(!world.despawn(handle));
        assert!(world.is_empty());
    }

    #[test]
    fn test_non_owner_input_is_ignored() {
        let mut world = World::default();
        let handle = world.spawn(1);

        assert!(!world.apply_input(2, handle, &forward(), DT));
        assert_eq!(world.get(handle).unwrap().pose.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_owner_input_moves_entity_after_integration() {
        let mut world = World::default();
        let handle = world.spawn(1);

        for _ in 0..60 {
            assert!(world.apply_input(1, handle, &forward(), DT));
            world.integrate(DT);
        }

        let entity = world.get(handle).unwrap();
        assert!(entity.pose.position.z < 0.0);
        assert_approx_eq!(entity.pose.position.y, 1.0, 1e-5);
        assert_eq!(world.tick, 60);
    }

    #[test]
    fn test_velocity_persists_without_new_intent() {
        let mut world = World::default();
        let handle = world.spawn(1);
        world.apply_input(1, handle, &forward(), DT);
        let velocity = world.get(handle).unwrap().pose.velocity;

        world.integrate(DT);
        assert_eq!(world.get(handle).unwrap().pose.velocity, velocity);
    }

    #[test]
    fn test_snapshot_is_sorted_by_handle() {
        let mut world = World::default();
        for owner in [5, 3, 9] {
            world.spawn(owner);
        }
        let handles: Vec<EntityHandle> = world.snapshot().iter().map(|s| s.entity).collect();
        assert_eq!(handles, vec![1, 2, 3]);
    }
}
