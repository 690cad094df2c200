//! Session core
//!
//! Owns everything the authority simulates: the lobby readiness state, the
//! entity authority table and the world. The transport adapter feeds it
//! join/leave/ready events and calls [`Session::advance_tick`] once per tick.
//!
//! A session starts in the lobby scene. When the readiness countdown expires
//! the lobby is dropped, the gameplay scene is activated and every participant
//! connected at that moment is handed to the entity table in one bulk sync.

use crate::entity_table::EntityAuthorityTable;
use crate::game::World;
use crate::lobby::{LobbyPhase, ReadinessCoordinator, SceneLoader};
use crate::registry::Presence;
use log::{debug, info};
use shared::config::SessionConfig;
use shared::{EntityState, InputIntent, ParticipantId, Role, SessionError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scene {
    Lobby,
    Gameplay(String),
}

/// Captures the scene requested by the lobby during one tick.
#[derive(Default)]
struct PendingScene(Option<String>);

impl SceneLoader for PendingScene {
    fn load_scene(&mut self, scene: &str) {
        self.0 = Some(scene.to_string());
    }
}

pub struct Session {
    role: Role,
    config: SessionConfig,
    lobby: Option<ReadinessCoordinator>,
    players: Option<EntityAuthorityTable>,
    world: World,
    scene: Scene,
}

impl Session {
    pub fn new(role: Role, config: SessionConfig) -> Self {
        let lobby = ReadinessCoordinator::new(role, config.lobby.clone());
        let world = World::new(config.movement);
        Self {
            role,
            config,
            lobby: Some(lobby),
            players: None,
            world,
            scene: Scene::Lobby,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn lobby(&self) -> Option<&ReadinessCoordinator> {
        self.lobby.as_ref()
    }

    pub fn players(&self) -> Option<&EntityAuthorityTable> {
        self.players.as_ref()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Seeds lobby flags for participants that connected before activation.
    pub fn activate<P: Presence + ?Sized>(&mut self, presence: &P) -> Result<(), SessionError> {
        self.role.require_authority("activate")?;
        match self.lobby.as_mut() {
            Some(lobby) => lobby.on_activate(presence),
            None => Ok(()),
        }
    }

    /// Call after the participant has been added to the registry.
    pub fn on_join(&mut self, participant: ParticipantId) -> Result<(), SessionError> {
        self.role.require_authority("on_join")?;
        if let Some(players) = self.players.as_mut() {
            players.on_join(participant, &mut self.world)?;
        } else if let Some(lobby) = self.lobby.as_mut() {
            lobby.on_join(participant)?;
        }
        Ok(())
    }

    /// `presence` must no longer contain `participant`.
    pub fn on_leave<P: Presence + ?Sized>(
        &mut self,
        participant: ParticipantId,
        presence: &P,
    ) -> Result<(), SessionError> {
        self.role.require_authority("on_leave")?;
        if let Some(players) = self.players.as_mut() {
            players.on_leave(participant, &mut self.world)?;
        } else if let Some(lobby) = self.lobby.as_mut() {
            lobby.on_leave(participant, presence)?;
        }
        Ok(())
    }

    /// Ready requests after the lobby has closed are ignored.
    pub fn set_ready<P: Presence + ?Sized>(
        &mut self,
        participant: ParticipantId,
        ready: bool,
        presence: &P,
    ) -> Result<(), SessionError> {
        match self.lobby.as_mut() {
            Some(lobby) => lobby.set_ready(participant, ready, presence),
            None => {
                self.role.require_authority("set_ready")?;
                debug!(
                    "Ignoring ready request from {} outside the lobby",
                    participant
                );
                Ok(())
            }
        }
    }

    /// Runs one authority tick.
    ///
    /// `inputs` holds at most one intent per participant. Returns the scene id
    /// on the tick the gameplay scene was entered.
    pub fn advance_tick<P: Presence + ?Sized>(
        &mut self,
        dt: Duration,
        presence: &P,
        inputs: &[(ParticipantId, InputIntent)],
    ) -> Result<Option<String>, SessionError> {
        self.role.require_authority("advance_tick")?;

        if let Some(lobby) = self.lobby.as_mut() {
            let mut pending = PendingScene::default();
            lobby.advance(dt, presence, &mut pending);
            return match pending.0 {
                Some(scene) => {
                    self.enter_gameplay(&scene, presence)?;
                    Ok(Some(scene))
                }
                None => Ok(None),
            };
        }

        let dt = dt.as_secs_f32();
        if let Some(players) = self.players.as_ref() {
            for (participant, intent) in inputs {
                if let Some(entity) = players.entity_of(*participant) {
                    self.world.apply_input(*participant, entity, intent, dt);
                }
            }
        }
        self.world.integrate(dt);
        Ok(None)
    }

    fn enter_gameplay<P: Presence + ?Sized>(
        &mut self,
        scene: &str,
        presence: &P,
    ) -> Result<(), SessionError> {
        info!("Entering gameplay scene '{}'", scene);
        self.lobby = None;
        self.scene = Scene::Gameplay(scene.to_string());

        let mut players = EntityAuthorityTable::new(self.role, self.config.capacity);
        let result = players.on_bulk_sync(presence, &mut self.world);
        self.players = Some(players);
        result.map(|_| ())
    }

    /// Lobby replica: sorted ready flags and whether a countdown is live.
    pub fn lobby_state(&self) -> Option<(Vec<(ParticipantId, bool)>, bool)> {
        self.lobby.as_ref().map(|lobby| {
            (
                lobby.ready_flags(),
                lobby.phase() == LobbyPhase::CountingDown,
            )
        })
    }

    pub fn snapshot(&self) -> Vec<EntityState> {
        self.world.snapshot()
    }

    pub fn tick(&self) -> u32 {
        self.world.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use shared::config::{GAMEPLAY_SCENE, START_DELAY};

    const TICK: Duration = Duration::from_millis(100);

    fn run_until_started(session: &mut Session, connected: &Vec<ParticipantId>) -> Option<String> {
        for _ in 0..100 {
            if let Some(scene) = session.advance_tick(TICK, connected, &[]).unwrap() {
                return Some(scene);
            }
        }
        None
    }

    #[test]
    fn test_new_session_is_in_lobby() {
        let session = Session::new(Role::Authority, SessionConfig::default());
        assert_eq!(session.scene(), &Scene::Lobby);
        assert!(session.players().is_none());
        assert_eq!(session.lobby_state(), Some((vec![], false)));
    }

    #[test]
    fn test_all_ready_enters_gameplay_and_spawns_everyone() {
        let mut session = Session::new(Role::Authority, SessionConfig::default());
        let connected = vec![1, 2];
        for id in &connected {
            session.on_join(*id).unwrap();
        }
        session.set_ready(1, true, &connected).unwrap();
        session.set_ready(2, true, &connected).unwrap();
        assert!(session.lobby_state().unwrap().1);

        let scene = run_until_started(&mut session, &connected);
        assert_eq!(scene.as_deref(), Some(GAMEPLAY_SCENE));
        assert_eq!(session.scene(), &Scene::Gameplay(GAMEPLAY_SCENE.to_string()));
        assert!(session.lobby_state().is_none());

        let players = session.players().unwrap();
        assert_eq!(players.participants(), vec![1, 2]);
        assert_eq!(session.world().len(), 2);
    }

    #[test]
    fn test_transition_waits_for_start_delay() {
        let mut session = Session::new(Role::Authority, SessionConfig::default());
        let connected = vec![1];
        session.on_join(1).unwrap();
        session.set_ready(1, true, &connected).unwrap();

        let ticks_to_start = (START_DELAY.as_millis() / TICK.as_millis()) as usize;
        for _ in 0..ticks_to_start - 1 {
            assert!(session.advance_tick(TICK, &connected, &[]).unwrap().is_none());
        }
        assert!(session.advance_tick(TICK, &connected, &[]).unwrap().is_some());
    }

    #[test]
    fn test_join_and_leave_during_gameplay() {
        let mut session = Session::new(Role::Authority, SessionConfig::default());
        let mut connected = vec![1];
        session.on_join(1).unwrap();
        session.set_ready(1, true, &connected).unwrap();
        run_until_started(&mut session, &connected).unwrap();

        connected.push(2);
        session.on_join(2).unwrap();
        assert_eq!(session.players().unwrap().participants(), vec![1, 2]);

        connected.retain(|id| *id != 1);
        session.on_leave(1, &connected).unwrap();
        assert_eq!(session.players().unwrap().participants(), vec![2]);
        assert_eq!(session.world().len(), 1);
    }

    #[test]
    fn test_ready_after_start_is_ignored() {
        let mut session = Session::new(Role::Authority, SessionConfig::default());
        let connected = vec![1];
        session.on_join(1).unwrap();
        session.set_ready(1, true, &connected).unwrap();
        run_until_started(&mut session, &connected).unwrap();

        assert!(session.set_ready(1, false, &connected).is_ok());
        assert!(matches!(session.scene(), Scene::Gameplay(_)));
    }

    #[test]
    fn test_gameplay_tick_steers_owned_entity() {
        let mut session = Session::new(Role::Authority, SessionConfig::default());
        let connected = vec![1, 2];
        for id in &connected {
            session.on_join(*id).unwrap();
            session.set_ready(*id, true, &connected).unwrap();
        }
        run_until_started(&mut session, &connected).unwrap();

        let intent = InputIntent {
            move_axes: Vec2::new(0.0, 1.0),
            ..Default::default()
        };
        for _ in 0..30 {
            session.advance_tick(TICK, &connected, &[(1, intent)]).unwrap();
        }

        let snapshot = session.snapshot();
        let mine = snapshot.iter().find(|state| state.owner == 1).unwrap();
        let theirs = snapshot.iter().find(|state| state.owner == 2).unwrap();
        assert!(mine.pose.position.z < -1.0);
        assert_eq!(theirs.pose.position, glam::Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_bulk_sync_over_capacity_is_fatal() {
        let config = SessionConfig {
            capacity: 1,
            ..SessionConfig::default()
        };
        let mut session = Session::new(Role::Authority, config);
        let connected = vec![1, 2];
        for id in &connected {
            session.on_join(*id).unwrap();
            session.set_ready(*id, true, &connected).unwrap();
        }

        let mut outcome = Ok(None);
        for _ in 0..100 {
            outcome = session.advance_tick(TICK, &connected, &[]);
            if !matches!(outcome, Ok(None)) {
                break;
            }
        }
        assert_eq!(outcome, Err(SessionError::CapacityExceeded { capacity: 1 }));
    }

    #[test]
    fn test_observer_session_rejects_mutation() {
        let mut session = Session::new(Role::Observer, SessionConfig::default());
        let connected = vec![1];
        assert!(session.on_join(1).is_err());
        assert!(session.set_ready(1, true, &connected).is_err());
        assert!(session.advance_tick(TICK, &connected, &[]).is_err());
        assert_eq!(session.lobby_state(), Some((vec![], false)));
    }
}
