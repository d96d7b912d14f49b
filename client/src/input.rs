//! Client input sampling and sequencing

use rand::Rng;
use shared::{InputSnapshot, Vec2};

/// Raw directional intent read from an input device, one value per axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceState {
    pub x: f32,
    pub y: f32,
}

impl DeviceState {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Source of directional intent, polled once per frame.
pub trait InputDevice {
    fn sample(&mut self, dt: f32) -> DeviceState;
}

/// Turns device state into sequenced input snapshots
pub struct InputSequencer {
    next_sequence: u32,
}

impl InputSequencer {
    pub fn new() -> Self {
        // 0 is the "nothing applied" watermark, so it is never handed out.
        Self { next_sequence: 1 }
    }

    /// Normalizes the intent and assigns the next sequence number.
    ///
    /// Returns None when the device reports no direction; such frames are
    /// neither predicted nor sent and do not consume a sequence number.
    pub fn capture(&mut self, state: DeviceState, dt: f32) -> Option<InputSnapshot> {
        let direction = Vec2::new(state.x, state.y);
        if !direction.is_finite() {
            return None;
        }
        // Vectors too small to normalize count as no input.
        let direction = direction.normalized();
        if direction.is_zero() {
            return None;
        }

        let input = InputSnapshot::new(self.next_sequence, dt, direction);
        self.next_sequence = self.next_sequence.wrapping_add(1).max(1);
        Some(input)
    }

    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }
}

impl Default for InputSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Movement scripts for headless clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementPattern {
    Idle,
    Horizontal,
    Circle,
    Square,
    Wander,
}

/// Input device that plays a movement pattern instead of reading a keyboard
pub struct ScriptedDevice {
    pattern: MovementPattern,
    elapsed: f32,
    heading: f32,
    next_turn: f32,
}

impl ScriptedDevice {
    const SEGMENT_SECS: f32 = 1.0;
    const CIRCLE_PERIOD_SECS: f32 = 4.0;

    pub fn new(pattern: MovementPattern) -> Self {
        Self {
            pattern,
            elapsed: 0.0,
            heading: 0.0,
            next_turn: 0.0,
        }
    }
}

impl InputDevice for ScriptedDevice {
    fn sample(&mut self, dt: f32) -> DeviceState {
        self.elapsed += dt;
        let t = self.elapsed;

        match self.pattern {
            MovementPattern::Idle => DeviceState::default(),
            MovementPattern::Horizontal => {
                let segment = (t / Self::SEGMENT_SECS) as u32;
                let x = if segment % 2 == 0 { 1.0 } else { -1.0 };
                DeviceState::new(x, 0.0)
            }
            MovementPattern::Circle => {
                let angle = t / Self::CIRCLE_PERIOD_SECS * std::f32::consts::TAU;
                DeviceState::new(angle.cos(), angle.sin())
            }
            MovementPattern::Square => match (t / Self::SEGMENT_SECS) as u32 % 4 {
                0 => DeviceState::new(1.0, 0.0),
                1 => DeviceState::new(0.0, 1.0),
                2 => DeviceState::new(-1.0, 0.0),
                _ => DeviceState::new(0.0, -1.0),
            },
            MovementPattern::Wander => {
                if t >= self.next_turn {
                    let mut rng = rand::thread_rng();
                    self.heading = rng.gen_range(0.0..std::f32::consts::TAU);
                    self.next_turn = t + rng.gen_range(0.25..1.5);
                }
                DeviceState::new(self.heading.cos(), self.heading.sin())
            }
        }
    }
}
