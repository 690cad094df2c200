//! Static session configuration.
//!
//! Everything here is fixed at build time and shared by the authority and
//! every observer. The `*Config` structs group the constants so tests and the
//! binaries can override individual values without touching globals.

use std::time::Duration;

/// Fixed number of entity slots in a session.
pub const MAX_PARTICIPANTS: usize = 12;
/// Grace period between "everyone is ready" and the scene change.
pub const START_DELAY: Duration = Duration::from_millis(1500);
/// Scene the lobby hands over to.
pub const GAMEPLAY_SCENE: &str = "game";

pub const FLY_SPEED: f32 = 20.0;
pub const ACCELERATION: f32 = 4.0;
pub const DECELERATION: f32 = 2.0;
pub const TURN_SPEED: f32 = 10.0;

/// Squared magnitude above which the desired direction counts as "moving".
pub const MOVE_EPSILON_SQ: f32 = 0.01;
/// Squared magnitude above which the entity turns to face its heading.
pub const FACE_EPSILON_SQ: f32 = 0.1;

pub const SPAWN_POSITION: [f32; 3] = [0.0, 1.0, 0.0];

pub const ROTATION_SPEED: f32 = 2.0;
pub const LOOK_MULTIPLIER: f32 = 0.15;
pub const MIN_PITCH_DEG: f32 = -30.0;
pub const MAX_PITCH_DEG: f32 = 60.0;

pub const DEFAULT_TICK_RATE: u32 = 60;
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning for the authoritative movement model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementConfig {
    pub fly_speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub turn_speed: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            fly_speed: FLY_SPEED,
            acceleration: ACCELERATION,
            deceleration: DECELERATION,
            turn_speed: TURN_SPEED,
        }
    }
}

/// Look sensitivity and pitch range of the orbit camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    pub rotation_speed: f32,
    pub look_multiplier: f32,
    pub min_pitch_deg: f32,
    pub max_pitch_deg: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            rotation_speed: ROTATION_SPEED,
            look_multiplier: LOOK_MULTIPLIER,
            min_pitch_deg: MIN_PITCH_DEG,
            max_pitch_deg: MAX_PITCH_DEG,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LobbyConfig {
    pub start_delay: Duration,
    pub gameplay_scene: String,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            start_delay: START_DELAY,
            gameplay_scene: GAMEPLAY_SCENE.to_string(),
        }
    }
}

/// Everything the authority needs to run one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub capacity: usize,
    pub lobby: LobbyConfig,
    pub movement: MovementConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_PARTICIPANTS,
            lobby: LobbyConfig::default(),
            movement: MovementConfig::default(),
        }
    }
}
