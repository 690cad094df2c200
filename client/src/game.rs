use log::{debug, info};
use shared::{EntityHandle, EntityState, ParticipantId};
use std::collections::HashMap;

/// How far behind the newest snapshot remote entities are shown.
pub const INTERPOLATION_DELAY_MS: u64 = 100;
/// Snapshots older than this (relative to the newest) are dropped.
const BUFFER_WINDOW_MS: u64 = 500;

/// Replicated lobby state, as last broadcast by the authority.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LobbyView {
    pub ready: Vec<(ParticipantId, bool)>,
    pub countdown_active: bool,
}

impl LobbyView {
    pub fn is_ready(&self, participant: ParticipantId) -> bool {
        self.ready
            .iter()
            .any(|(id, ready)| *id == participant && *ready)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientScene {
    Lobby,
    Gameplay(String),
}

/// Observer-side replica. Never simulates; it only buffers and blends what
/// the authority sends.
pub struct ClientGameState {
    participant_id: Option<ParticipantId>,
    scene: ClientScene,
    lobby: LobbyView,
    last_tick: u32,
    last_acked_input: u32,
    local_entity: Option<EntityHandle>,
    interpolation_buffer: Vec<(u64, Vec<EntityState>)>,
    render_time_ms: Option<f64>,
    presented: Vec<EntityState>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            participant_id: None,
            scene: ClientScene::Lobby,
            lobby: LobbyView::default(),
            last_tick: 0,
            last_acked_input: 0,
            local_entity: None,
            interpolation_buffer: Vec::new(),
            render_time_ms: None,
            presented: Vec::new(),
        }
    }

    pub fn set_participant(&mut self, participant_id: Option<ParticipantId>) {
        self.participant_id = participant_id;
        self.local_entity = None;
    }

    pub fn participant_id(&self) -> Option<ParticipantId> {
        self.participant_id
    }

    pub fn scene(&self) -> &ClientScene {
        &self.scene
    }

    pub fn in_gameplay(&self) -> bool {
        matches!(self.scene, ClientScene::Gameplay(_))
    }

    pub fn lobby(&self) -> &LobbyView {
        &self.lobby
    }

    pub fn last_tick(&self) -> u32 {
        self.last_tick
    }

    /// Highest input sequence the authority reported as applied for us.
    pub fn last_acked_input(&self) -> u32 {
        self.last_acked_input
    }

    pub fn local_entity(&self) -> Option<EntityHandle> {
        self.local_entity
    }

    pub fn presented(&self) -> &[EntityState] {
        &self.presented
    }

    pub fn apply_lobby_state(&mut self, ready: Vec<(ParticipantId, bool)>, countdown_active: bool) {
        if countdown_active && !self.lobby.countdown_active {
            info!("Everyone is ready, countdown started");
        }
        self.lobby = LobbyView {
            ready,
            countdown_active,
        };
    }

    /// Returns false when the scene is already loaded. The authority repeats
    /// LoadScene until it sees our inputs.
    pub fn load_scene(&mut self, scene: String) -> bool {
        if self.scene == ClientScene::Gameplay(scene.clone()) {
            return false;
        }
        info!("Loading scene '{}'", scene);
        self.scene = ClientScene::Gameplay(scene);
        self.lobby = LobbyView::default();
        self.interpolation_buffer.clear();
        self.render_time_ms = None;
        self.presented.clear();
        self.local_entity = None;
        true
    }

    /// Buffers a snapshot. Returns our own entity the first time it shows up
    /// so the caller can point the camera at it.
    pub fn apply_server_state(
        &mut self,
        tick: u32,
        timestamp: u64,
        last_processed_input: &HashMap<ParticipantId, u32>,
        entities: Vec<EntityState>,
    ) -> Option<EntityState> {
        if let Some((newest, _)) = self.interpolation_buffer.last() {
            if timestamp < *newest {
                debug!("Dropping out-of-order snapshot for tick {}", tick);
                return None;
            }
        }
        self.last_tick = tick;

        let mut appeared = None;
        if let Some(participant_id) = self.participant_id {
            if let Some(&sequence) = last_processed_input.get(&participant_id) {
                self.last_acked_input = self.last_acked_input.max(sequence);
            }

            let mine = entities.iter().find(|state| state.owner == participant_id);
            match (mine, self.local_entity) {
                (Some(state), None) => {
                    info!("Controlling entity {}", state.entity);
                    self.local_entity = Some(state.entity);
                    appeared = Some(*state);
                }
                (None, Some(_)) => self.local_entity = None,
                _ => {}
            }
        }

        self.interpolation_buffer.push((timestamp, entities));
        let cutoff = timestamp.saturating_sub(BUFFER_WINDOW_MS);
        self.interpolation_buffer.retain(|(ts, _)| *ts >= cutoff);

        appeared
    }

    /// Moves the presentation clock forward and recomputes presented poses.
    ///
    /// Our own entity is shown at its newest replicated pose; every other
    /// entity is blended between the two snapshots around the render time.
    pub fn advance_presentation_frame(&mut self, dt: f32) -> &[EntityState] {
        let Some((newest, latest)) = self.interpolation_buffer.last() else {
            self.presented.clear();
            return &self.presented;
        };
        let newest = *newest;
        let oldest = self.interpolation_buffer[0].0;

        let oldest = oldest as f64;
        let target = (newest.saturating_sub(INTERPOLATION_DELAY_MS) as f64).max(oldest);
        let render_time = match self.render_time_ms {
            Some(time) => (time + dt as f64 * 1000.0).clamp(oldest, target),
            None => target,
        };
        self.render_time_ms = Some(render_time);

        let mut presented: Vec<EntityState> = Vec::with_capacity(latest.len());
        for state in latest {
            if Some(state.entity) == self.local_entity {
                presented.push(*state);
            } else {
                presented.push(self.interpolate_entity(state, render_time));
            }
        }
        self.presented = presented;
        &self.presented
    }

    fn interpolate_entity(&self, latest: &EntityState, render_time: f64) -> EntityState {
        let mut before: Option<(u64, &EntityState)> = None;
        let mut after: Option<(u64, &EntityState)> = None;

        for (timestamp, entities) in &self.interpolation_buffer {
            let Some(state) = entities.iter().find(|s| s.entity == latest.entity) else {
                continue;
            };
            if (*timestamp as f64) <= render_time {
                before = Some((*timestamp, state));
            } else {
                after = Some((*timestamp, state));
                break;
            }
        }

        match (before, after) {
            (Some((t1, s1)), Some((t2, s2))) => {
                let alpha = if t2 > t1 {
                    ((render_time - t1 as f64) / (t2 - t1) as f64) as f32
                } else {
                    0.0
                };
                EntityState {
                    pose: s1.pose.interpolate(&s2.pose, alpha),
                    ..*s2
                }
            }
            (Some((_, state)), None) | (None, Some((_, state))) => *state,
            (None, None) => *latest,
        }
    }

    /// Forgets everything tied to the current connection.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use glam::Vec3;
    use shared::Pose;

    fn state(entity: EntityHandle, owner: ParticipantId, x: f32) -> EntityState {
        EntityState {
            entity,
            owner,
            pose: Pose::at(Vec3::new(x, 1.0, 0.0)),
        }
    }

    fn acks(participant: ParticipantId, sequence: u32) -> HashMap<ParticipantId, u32> {
        HashMap::from([(participant, sequence)])
    }

    #[test]
    fn test_lobby_state_replicates() {
        let mut game = ClientGameState::new();
        game.apply_lobby_state(vec![(1, true), (2, false)], false);
        assert!(game.lobby().is_ready(1));
        assert!(!game.lobby().is_ready(2));
        assert!(!game.lobby().is_ready(3));
    }

    #[test]
    fn test_load_scene_switches_and_clears_lobby() {
        let mut game = ClientGameState::new();
        game.apply_lobby_state(vec![(1, true)], true);
        game.load_scene("game".to_string());

        assert!(game.in_gameplay());
        assert_eq!(game.lobby(), &LobbyView::default());
    }

    #[test]
    fn test_repeated_load_scene_keeps_replica() {
        let mut game = ClientGameState::new();
        game.set_participant(Some(1));
        assert!(game.load_scene("game".to_string()));
        game.apply_server_state(1, 1000, &HashMap::new(), vec![state(1, 1, 0.0)]);

        assert!(!game.load_scene("game".to_string()));
        assert_eq!(game.local_entity(), Some(1));
        assert_eq!(game.advance_presentation_frame(0.0).len(), 1);
    }

    #[test]
    fn test_local_entity_detected_once() {
        let mut game = ClientGameState::new();
        game.set_participant(Some(2));

        let entities = vec![state(1, 1, 0.0), state(2, 2, 0.0)];
        let first = game.apply_server_state(1, 1000, &acks(2, 5), entities);
        assert_eq!(first.map(|s| s.entity), Some(2));
        assert_eq!(game.local_entity(), Some(2));
        assert_eq!(game.last_acked_input(), 5);

        let second = game.apply_server_state(2, 1016, &acks(2, 6), vec![state(2, 2, 1.0)]);
        assert!(second.is_none());
        assert_eq!(game.last_acked_input(), 6);
    }

    #[test]
    fn test_out_of_order_snapshot_is_dropped() {
        let mut game = ClientGameState::new();
        game.apply_server_state(2, 2000, &HashMap::new(), vec![state(1, 1, 5.0)]);
        game.apply_server_state(1, 1000, &HashMap::new(), vec![state(1, 1, 0.0)]);
        assert_eq!(game.last_tick(), 2);
    }

    #[test]
    fn test_remote_entities_are_interpolated() {
        let mut game = ClientGameState::new();
        game.set_participant(Some(9));
        game.apply_server_state(1, 1000, &HashMap::new(), vec![state(1, 1, 0.0)]);
        game.apply_server_state(2, 1100, &HashMap::new(), vec![state(1, 1, 10.0)]);
        game.apply_server_state(3, 1200, &HashMap::new(), vec![state(1, 1, 20.0)]);

        // Render time starts 100 ms behind the newest snapshot.
        let presented = game.advance_presentation_frame(0.0).to_vec();
        assert_approx_eq!(presented[0].pose.position.x, 10.0, 1e-4);

        // Clamped at the newest - delay until more snapshots arrive.
        let presented = game.advance_presentation_frame(0.05).to_vec();
        assert_approx_eq!(presented[0].pose.position.x, 10.0, 1e-4);

        game.apply_server_state(4, 1300, &HashMap::new(), vec![state(1, 1, 30.0)]);
        let presented = game.advance_presentation_frame(0.05).to_vec();
        assert_approx_eq!(presented[0].pose.position.x, 15.0, 1e-3);
    }

    #[test]
    fn test_local_entity_uses_newest_pose() {
        let mut game = ClientGameState::new();
        game.set_participant(Some(1));
        game.apply_server_state(1, 1000, &HashMap::new(), vec![state(1, 1, 0.0)]);
        game.apply_server_state(2, 1100, &HashMap::new(), vec![state(1, 1, 10.0)]);

        let presented = game.advance_presentation_frame(0.0);
        assert_eq!(presented[0].pose.position.x, 10.0);
    }

    #[test]
    fn test_despawned_entities_disappear() {
        let mut game = ClientGameState::new();
        game.apply_server_state(1, 1000, &HashMap::new(), vec![state(1, 1, 0.0), state(2, 2, 0.0)]);
        game.apply_server_state(2, 1100, &HashMap::new(), vec![state(1, 1, 1.0)]);

        let presented = game.advance_presentation_frame(0.016);
        assert_eq!(presented.len(), 1);
        assert_eq!(presented[0].entity, 1);
    }

    #[test]
    fn test_old_snapshots_are_pruned() {
        let mut game = ClientGameState::new();
        for i in 0..20u64 {
            game.apply_server_state(i as u32, 1000 + i * 100, &HashMap::new(), vec![]);
        }
        assert!(game.interpolation_buffer.len() <= 6);
    }
}
