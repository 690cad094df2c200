//! Participant registry for the authority process
//!
//! Tracks which participants are connected, where to reach them, and the
//! intents they have sent since the last simulation tick. The transport layer
//! owns this registry; the session core only reads it through [`Presence`].

use log::{debug, info};
use shared::{InputState, ParticipantId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Read-only view of who is presently connected.
pub trait Presence {
    /// Connected participant ids in ascending order.
    fn connected_participants(&self) -> Vec<ParticipantId>;

    fn is_connected(&self, participant: ParticipantId) -> bool {
        self.connected_participants().contains(&participant)
    }
}

impl Presence for [ParticipantId] {
    fn connected_participants(&self) -> Vec<ParticipantId> {
        let mut ids = self.to_vec();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn is_connected(&self, participant: ParticipantId) -> bool {
        self.contains(&participant)
    }
}

impl Presence for Vec<ParticipantId> {
    fn connected_participants(&self) -> Vec<ParticipantId> {
        self.as_slice().connected_participants()
    }

    fn is_connected(&self, participant: ParticipantId) -> bool {
        self.contains(&participant)
    }
}

/// A connected participant and the intents received from it
#[derive(Debug)]
pub struct Participant {
    pub id: ParticipantId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this participant
    pub last_seen: Instant,
    /// Highest input sequence applied by the authority
    pub last_processed_input: u32,
    /// Intents waiting for the next tick, ordered by sequence
    pub pending_inputs: Vec<InputState>,
    /// Set once an input shows the participant runs the gameplay scene
    pub scene_loaded: bool,
}

impl Participant {
    pub fn new(id: ParticipantId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_processed_input: 0,
            pending_inputs: Vec::new(),
            scene_loaded: false,
        }
    }

    /// Queues an intent unless it is older than what was already applied.
    ///
    /// Returns false for stale or duplicate deliveries.
    pub fn add_input(&mut self, input: InputState) -> bool {
        self.last_seen = Instant::now();
        if input.sequence <= self.last_processed_input
            || self
                .pending_inputs
                .iter()
                .any(|pending| pending.sequence == input.sequence)
        {
            return false;
        }
        self.pending_inputs.push(input);
        self.pending_inputs.sort_by_key(|i| i.sequence);
        true
    }

    /// Takes the newest pending intent and discards everything older.
    pub fn take_latest_input(&mut self) -> Option<InputState> {
        let latest = self.pending_inputs.pop()?;
        self.pending_inputs.clear();
        self.last_processed_input = self.last_processed_input.max(latest.sequence);
        Some(latest)
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// All participants connected to this session
pub struct ParticipantRegistry {
    participants: HashMap<ParticipantId, Participant>,
    next_participant_id: ParticipantId,
    max_participants: usize,
}

impl ParticipantRegistry {
    /// Ids start at 1 and are never reused.
    pub fn new(max_participants: usize) -> Self {
        Self {
            participants: HashMap::new(),
            next_participant_id: 1,
            max_participants,
        }
    }

    /// Returns None when the session is full.
    pub fn add_participant(&mut self, addr: SocketAddr) -> Option<ParticipantId> {
        if self.participants.len() >= self.max_participants {
            return None;
        }

        let id = self.next_participant_id;
        self.next_participant_id += 1;

        info!("Participant {} connected from {}", id, addr);
        self.participants.insert(id, Participant::new(id, addr));

        Some(id)
    }

    pub fn remove_participant(&mut self, id: &ParticipantId) -> bool {
        if let Some(participant) = self.participants.remove(id) {
            info!("Participant {} disconnected", participant.id);
            true
        } else {
            false
        }
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<ParticipantId> {
        self.participants
            .iter()
            .find(|(_, participant)| participant.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes the participant's activity timestamp.
    pub fn touch(&mut self, id: ParticipantId) {
        if let Some(participant) = self.participants.get_mut(&id) {
            participant.last_seen = Instant::now();
        }
    }

    /// Returns false if the participant is unknown or the intent is stale.
    pub fn add_input(&mut self, id: ParticipantId, input: InputState) -> bool {
        match self.participants.get_mut(&id) {
            Some(participant) => {
                let accepted = participant.add_input(input);
                if !accepted {
                    debug!(
                        "Dropped stale input {} from participant {}",
                        input.sequence, id
                    );
                }
                accepted
            }
            None => false,
        }
    }

    /// Drains one intent per participant for the coming tick, ordered by participant id.
    pub fn take_latest_inputs(&mut self) -> Vec<(ParticipantId, InputState)> {
        let mut inputs: Vec<(ParticipantId, InputState)> = self
            .participants
            .iter_mut()
            .filter_map(|(id, participant)| participant.take_latest_input().map(|i| (*id, i)))
            .collect();
        inputs.sort_by_key(|(id, _)| *id);
        inputs
    }

    pub fn last_processed_inputs(&self) -> HashMap<ParticipantId, u32> {
        self.participants
            .iter()
            .map(|(id, participant)| (*id, participant.last_processed_input))
            .collect()
    }

    /// Participants silent for longer than `timeout`, in ascending order.
    ///
    /// Nobody is removed here. Removal belongs to whoever also tells the
    /// session, so both happen in one step.
    pub fn timed_out_participants(&self, timeout: Duration) -> Vec<ParticipantId> {
        let mut timed_out: Vec<ParticipantId> = self
            .participants
            .iter()
            .filter(|(_, participant)| participant.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();
        timed_out.sort_unstable();
        timed_out
    }

    pub fn mark_scene_loaded(&mut self, id: ParticipantId) {
        if let Some(participant) = self.participants.get_mut(&id) {
            participant.scene_loaded = true;
        }
    }

    /// Participants that have not yet confirmed the gameplay scene.
    pub fn awaiting_scene(&self) -> Vec<(ParticipantId, SocketAddr)> {
        let mut awaiting: Vec<(ParticipantId, SocketAddr)> = self
            .participants
            .values()
            .filter(|participant| !participant.scene_loaded)
            .map(|participant| (participant.id, participant.addr))
            .collect();
        awaiting.sort_by_key(|(id, _)| *id);
        awaiting
    }

    pub fn participant_addrs(&self) -> Vec<(ParticipantId, SocketAddr)> {
        self.participants
            .iter()
            .map(|(id, participant)| (*id, participant.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

impl Presence for ParticipantRegistry {
    fn connected_participants(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.participants.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn is_connected(&self, participant: ParticipantId) -> bool {
        self.participants.contains_key(&participant)
    }
}
