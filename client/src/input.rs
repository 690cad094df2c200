//! Client input sampling, accumulation and sequencing
//!
//! Devices are sampled every presentation frame, which usually runs faster
//! than the simulation tick. Frames are folded into an [`InputAccumulator`]
//! and flushed into exactly one intent per tick.

use crate::camera::OrbitCamera;
use glam::Vec2;
use shared::config::LOOK_MULTIPLIER;
use shared::{timestamp_ms, Buttons, CameraAngles, InputIntent, InputState};

/// One frame of raw device state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameSample {
    /// Unnormalized move keys, x = right, y = forward.
    pub move_axes: Vec2,
    /// -1, 0 or 1.
    pub vertical: f32,
    /// Pointer motion in screen space, x = right, y = up.
    pub look_delta: Vec2,
    pub buttons: Buttons,
    /// Primary click this frame.
    pub lock_pressed: bool,
    /// Escape this frame.
    pub unlock_pressed: bool,
}

/// Anything that can be polled once per frame.
pub trait InputDevice {
    fn sample(&mut self) -> FrameSample;
}

/// Canned movement for headless clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MovePattern {
    Idle,
    Forward,
    Circle,
    Climb,
    Zigzag,
}

pub struct ScriptedDevice {
    pattern: MovePattern,
    frame: u64,
}

impl ScriptedDevice {
    pub fn new(pattern: MovePattern) -> Self {
        Self { pattern, frame: 0 }
    }
}

impl InputDevice for ScriptedDevice {
    fn sample(&mut self) -> FrameSample {
        let frame = self.frame;
        self.frame += 1;

        let mut sample = FrameSample {
            lock_pressed: frame == 0,
            ..FrameSample::default()
        };

        match self.pattern {
            MovePattern::Idle => {}
            MovePattern::Forward => sample.move_axes = Vec2::Y,
            MovePattern::Circle => {
                sample.move_axes = Vec2::Y;
                sample.look_delta = Vec2::new(4.0, 0.0);
            }
            MovePattern::Climb => {
                sample.move_axes = Vec2::Y;
                sample.vertical = if (frame / 240) % 2 == 0 { 1.0 } else { -1.0 };
            }
            MovePattern::Zigzag => {
                let side = if (frame / 120) % 2 == 0 { 1.0 } else { -1.0 };
                sample.move_axes = Vec2::new(side, 1.0);
            }
        }
        sample
    }
}

/// Folds frames into one intent per tick.
#[derive(Debug, Clone, Default)]
pub struct InputAccumulator {
    move_sum: Vec2,
    vertical: f32,
    buttons: Buttons,
}

impl InputAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each frame's move vector counts as a unit direction, so frame rate does
    /// not change the result. Vertical and buttons keep the latest frame.
    pub fn accumulate_frame(&mut self, sample: &FrameSample) {
        if sample.move_axes.length_squared() > 0.0 {
            self.move_sum += sample.move_axes.normalize();
        }
        self.vertical = sample.vertical.clamp(-1.0, 1.0);
        self.buttons = sample.buttons;
    }

    /// Emits the intent for this tick and resets.
    pub fn flush<C: CameraAngles + ?Sized>(&mut self, camera: &C) -> InputIntent {
        let intent = InputIntent {
            move_axes: self.move_sum.normalize_or_zero(),
            vertical_axis: self.vertical,
            camera_pitch: camera.pitch(),
            camera_yaw: camera.yaw(),
            buttons: self.buttons,
        };
        *self = Self::default();
        intent
    }
}

/// Owns cursor lock state and input sequencing for one participant.
pub struct InputManager {
    next_sequence: u32,
    accumulator: InputAccumulator,
    cursor_locked: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            accumulator: InputAccumulator::new(),
            cursor_locked: false,
        }
    }

    /// Handles one presentation frame. Look motion only reaches the camera
    /// while the cursor is locked.
    pub fn update_frame(&mut self, sample: &FrameSample, camera: &mut OrbitCamera) {
        if sample.lock_pressed && !self.cursor_locked {
            self.cursor_locked = true;
        }
        if sample.unlock_pressed {
            self.cursor_locked = false;
        }

        if self.cursor_locked && sample.look_delta != Vec2::ZERO {
            // Pointer up raises the view; pointer right turns right, which is
            // a negative yaw about +Y.
            camera.add_look_rotation(
                Vec2::new(sample.look_delta.y, -sample.look_delta.x),
                LOOK_MULTIPLIER,
            );
        }

        self.accumulator.accumulate_frame(sample);
    }

    /// Flushes the accumulator into the next sequenced input.
    pub fn flush_tick<C: CameraAngles + ?Sized>(&mut self, camera: &C) -> InputState {
        let input = InputState {
            sequence: self.next_sequence,
            timestamp: timestamp_ms(),
            intent: self.accumulator.flush(camera),
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);
        input
    }

    pub fn cursor_locked(&self) -> bool {
        self.cursor_locked
    }

    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
