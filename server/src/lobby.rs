//! Lobby readiness gating
//!
//! The [`ReadinessCoordinator`] holds one ready flag per connected participant.
//! Once every connected participant is ready it arms a countdown on the
//! authority tick; if nothing breaks unanimity before it expires, the gameplay
//! scene is loaded exactly once. Any join, any leave and any un-ready cancels
//! the countdown.
//!
//! ```text
//! Idle --all ready--> CountingDown --expiry, still ready--> Started
//!  ^                      |
//!  +--join/leave/unready--+
//! ```

use crate::registry::Presence;
use crate::scheduler::{Scheduler, TaskHandle};
use log::{debug, info};
use shared::config::LobbyConfig;
use shared::{ParticipantId, Role, SessionError};
use std::collections::HashMap;
use std::time::Duration;

/// Capability to perform the one-shot phase transition.
pub trait SceneLoader {
    fn load_scene(&mut self, scene: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    Idle,
    CountingDown,
    /// Terminal; the session has moved on.
    Started,
}

pub struct ReadinessCoordinator {
    role: Role,
    config: LobbyConfig,
    ready: HashMap<ParticipantId, bool>,
    scheduler: Scheduler,
    countdown: Option<TaskHandle>,
    started: bool,
}

impl ReadinessCoordinator {
    pub fn new(role: Role, config: LobbyConfig) -> Self {
        Self {
            role,
            config,
            ready: HashMap::new(),
            scheduler: Scheduler::new(),
            countdown: None,
            started: false,
        }
    }

    pub fn phase(&self) -> LobbyPhase {
        if self.started {
            LobbyPhase::Started
        } else if self.countdown.is_some() {
            LobbyPhase::CountingDown
        } else {
            LobbyPhase::Idle
        }
    }

    pub fn is_ready(&self, participant: ParticipantId) -> bool {
        self.ready.get(&participant).copied().unwrap_or(false)
    }

    /// Ready flags ordered by participant id, as replicated to observers.
    pub fn ready_flags(&self) -> Vec<(ParticipantId, bool)> {
        let mut flags: Vec<(ParticipantId, bool)> =
            self.ready.iter().map(|(id, ready)| (*id, *ready)).collect();
        flags.sort_by_key(|(id, _)| *id);
        flags
    }

    pub fn countdown_remaining(&self) -> Option<Duration> {
        self.countdown
            .and_then(|handle| self.scheduler.remaining(handle))
    }

    /// Seeds a not-ready flag for everyone already connected when the lobby
    /// comes up.
    pub fn on_activate<P: Presence + ?Sized>(&mut self, presence: &P) -> Result<(), SessionError> {
        self.role.require_authority("on_activate")?;

        for participant in presence.connected_participants() {
            self.ready.entry(participant).or_insert(false);
        }
        Ok(())
    }

    pub fn on_join(&mut self, participant: ParticipantId) -> Result<(), SessionError> {
        self.role.require_authority("on_join")?;

        self.ready.entry(participant).or_insert(false);
        self.cancel_countdown();
        Ok(())
    }

    /// `presence` must no longer contain `participant`.
    pub fn on_leave<P: Presence + ?Sized>(
        &mut self,
        participant: ParticipantId,
        presence: &P,
    ) -> Result<(), SessionError> {
        self.role.require_authority("on_leave")?;

        self.ready.remove(&participant);
        self.cancel_countdown();
        // The departing participant may have been the only one not ready.
        self.evaluate_readiness(presence);
        Ok(())
    }

    /// Upserts the participant's flag. Observers must forward the request to
    /// the authority instead.
    pub fn set_ready<P: Presence + ?Sized>(
        &mut self,
        participant: ParticipantId,
        ready: bool,
        presence: &P,
    ) -> Result<(), SessionError> {
        self.role.require_authority("set_ready")?;
        if !presence.is_connected(participant) {
            return Err(SessionError::UnknownParticipant(participant));
        }

        debug!("Participant {} ready: {}", participant, ready);
        self.ready.insert(participant, ready);
        self.evaluate_readiness(presence);
        Ok(())
    }

    /// True iff at least one participant is connected and every connected
    /// participant is flagged ready. Missing flags count as not ready.
    pub fn all_ready<P: Presence + ?Sized>(&self, presence: &P) -> bool {
        let connected = presence.connected_participants();
        !connected.is_empty()
            && !self.ready.is_empty()
            && connected.iter().all(|participant| self.is_ready(*participant))
    }

    /// Starts or cancels the countdown to match the current flags.
    ///
    /// No-op on observers and after the session has started.
    pub fn evaluate_readiness<P: Presence + ?Sized>(&mut self, presence: &P) -> bool {
        if !self.role.is_authority() || self.started {
            return false;
        }

        let holds = self.all_ready(presence);
        if !holds {
            self.cancel_countdown();
        } else if self.countdown.is_none() {
            info!(
                "All participants ready, starting in {:.1}s",
                self.config.start_delay.as_secs_f32()
            );
            self.countdown = Some(self.scheduler.schedule(self.config.start_delay));
        }
        holds
    }

    /// Returns true if a countdown was live.
    pub fn cancel_countdown(&mut self) -> bool {
        match self.countdown.take() {
            Some(handle) => {
                self.scheduler.cancel(handle);
                info!("Start countdown cancelled");
                true
            }
            None => false,
        }
    }

    /// Advances the countdown by one authority tick. Returns true on the tick
    /// the gameplay scene was requested.
    pub fn advance<P: Presence + ?Sized>(
        &mut self,
        dt: Duration,
        presence: &P,
        loader: &mut dyn SceneLoader,
    ) -> bool {
        let Some(handle) = self.countdown else {
            return false;
        };
        if !self.scheduler.advance(dt).contains(&handle) {
            return false;
        }
        self.countdown = None;

        if !self.role.is_authority() || self.started || !self.all_ready(presence) {
            debug!("Countdown expired but readiness no longer holds");
            return false;
        }

        self.started = true;
        info!("Loading scene '{}'", self.config.gameplay_scene);
        loader.load_scene(&self.config.gameplay_scene);
        true
    }
}
