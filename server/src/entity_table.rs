//! Entity Authority Table
//!
//! Maps every connected participant to exactly one spawned entity. Only the
//! session authority mutates the table; observers learn about entities through
//! replicated [`shared::EntityState`]s.
//!
//! Joins arrive two ways: individually through [`EntityAuthorityTable::on_join`],
//! and in bulk through [`EntityAuthorityTable::on_bulk_sync`] when the gameplay
//! scene activates with participants that joined before it existed. Both paths
//! share one spawn guard, so a participant delivered by both is spawned once.

use crate::registry::Presence;
use log::{error, info};
use shared::{EntityHandle, ParticipantId, Role, SessionError};
use std::collections::HashMap;

/// Whatever owns entity storage; the table only decides who gets one.
pub trait EntitySpawner {
    /// Spawns an entity whose input authority is `owner`.
    fn spawn(&mut self, owner: ParticipantId) -> EntityHandle;
    fn despawn(&mut self, entity: EntityHandle) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRecord {
    pub participant: ParticipantId,
    pub entity: EntityHandle,
    /// Always the session authority; there is no per-entity authority.
    pub authority_owner: Role,
}

pub struct EntityAuthorityTable {
    role: Role,
    capacity: usize,
    records: HashMap<ParticipantId, EntityRecord>,
}

impl EntityAuthorityTable {
    pub fn new(role: Role, capacity: usize) -> Self {
        Self {
            role,
            capacity,
            records: HashMap::new(),
        }
    }

    /// Spawns for every connected participant without a record yet.
    /// Returns the newly spawned entities.
    pub fn on_bulk_sync<P: Presence + ?Sized>(
        &mut self,
        connected: &P,
        spawner: &mut dyn EntitySpawner,
    ) -> Result<Vec<EntityHandle>, SessionError> {
        self.role.require_authority("on_bulk_sync")?;

        let mut spawned = Vec::new();
        for participant in connected.connected_participants() {
            if let Some(entity) = self.spawn_for(participant, spawner)? {
                spawned.push(entity);
            }
        }
        info!(
            "Bulk sync spawned {} entities ({} total)",
            spawned.len(),
            self.records.len()
        );
        Ok(spawned)
    }

    /// Returns `Ok(None)` if the participant already has an entity.
    pub fn on_join(
        &mut self,
        participant: ParticipantId,
        spawner: &mut dyn EntitySpawner,
    ) -> Result<Option<EntityHandle>, SessionError> {
        self.role.require_authority("on_join")?;
        self.spawn_for(participant, spawner)
    }

    /// Despawns and forgets the participant's entity, if any.
    pub fn on_leave(
        &mut self,
        participant: ParticipantId,
        spawner: &mut dyn EntitySpawner,
    ) -> Result<Option<EntityHandle>, SessionError> {
        self.role.require_authority("on_leave")?;

        let Some(record) = self.records.remove(&participant) else {
            return Ok(None);
        };
        spawner.despawn(record.entity);
        info!(
            "Despawned entity {} of participant {}",
            record.entity, participant
        );
        Ok(Some(record.entity))
    }

    fn spawn_for(
        &mut self,
        participant: ParticipantId,
        spawner: &mut dyn EntitySpawner,
    ) -> Result<Option<EntityHandle>, SessionError> {
        if self.records.contains_key(&participant) {
            return Ok(None);
        }
        if self.records.len() >= self.capacity {
            error!(
                "Cannot spawn entity for participant {}: capacity {} reached",
                participant, self.capacity
            );
            return Err(SessionError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let entity = spawner.spawn(participant);
        self.records.insert(
            participant,
            EntityRecord {
                participant,
                entity,
                authority_owner: self.role,
            },
        );
        info!("Spawned entity {} for participant {}", entity, participant);
        Ok(Some(entity))
    }

    pub fn get(&self, participant: ParticipantId) -> Option<&EntityRecord> {
        self.records.get(&participant)
    }

    pub fn entity_of(&self, participant: ParticipantId) -> Option<EntityHandle> {
        self.records.get(&participant).map(|record| record.entity)
    }

    /// Participants with an entity, ascending.
    pub fn participants(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
