use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub mod config;
pub mod intent;
pub mod role;

pub use intent::{Buttons, CameraAngles, InputIntent, InputState};
pub use role::{Role, SessionError};

/// Stable identifier of a connected session member, assigned by the transport.
pub type ParticipantId = u32;
/// Identifier of a spawned entity.
pub type EntityHandle = u32;

pub const CLIENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    SetReady {
        ready: bool,
    },
    /// Keep-alive sent every tick while no inputs flow (lobby).
    Heartbeat,
    Input {
        sequence: u32,
        timestamp: u64,
        intent: InputIntent,
    },
    Disconnect,

    Connected {
        participant_id: ParticipantId,
    },
    LobbyState {
        ready: Vec<(ParticipantId, bool)>,
        countdown_active: bool,
    },
    LoadScene {
        scene: String,
    },
    GameState {
        tick: u32,
        timestamp: u64,
        last_processed_input: HashMap<ParticipantId, u32>,
        entities: Vec<EntityState>,
    },
    Disconnected {
        reason: String,
    },
}

/// Replicated kinematic state of an entity.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    /// Blends two replicated poses; `alpha` is clamped to [0, 1].
    pub fn interpolate(&self, other: &Pose, alpha: f32) -> Pose {
        let alpha = alpha.clamp(0.0, 1.0);
        Pose {
            position: self.position.lerp(other.position, alpha),
            velocity: self.velocity.lerp(other.velocity, alpha),
            rotation: self.rotation.slerp(other.rotation, alpha),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::at(Vec3::from_array(config::SPAWN_POSITION))
    }
}

/// One entity as seen on the wire.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub entity: EntityHandle,
    /// Participant holding input authority over this entity.
    pub owner: ParticipantId,
    pub pose: Pose,
}

/// Milliseconds since the Unix epoch, zero if the clock is before it.
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
