//! Server configuration consumed by the library; `main.rs` builds it from the command line.

use shared::{Vec2, MAX_CLIENTS, SERVER_TICK_RATE};
use std::time::Duration;

/// How the server bounds the direction vector of an incoming input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectionBound {
    /// `|x| <= max && |y| <= max`. Accepts diagonals up to `max * sqrt(2)`.
    PerAxis { max: f32 },
    /// `|direction| <= max`, with a small tolerance for float rounding.
    Magnitude { max: f32 },
}

impl DirectionBound {
    const MAGNITUDE_EPSILON: f32 = 1e-4;

    pub fn accepts(&self, direction: Vec2) -> bool {
        match *self {
            DirectionBound::PerAxis { max } => direction.x.abs() <= max && direction.y.abs() <= max,
            DirectionBound::Magnitude { max } => {
                direction.length() <= max + Self::MAGNITUDE_EPSILON
            }
        }
    }
}

/// Acceptance policy for client inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputPolicy {
    pub direction: DirectionBound,
    /// Largest accepted `elapsed` per input, in seconds.
    pub max_elapsed: f32,
}

impl Default for InputPolicy {
    fn default() -> Self {
        Self {
            direction: DirectionBound::PerAxis { max: 1.0 },
            max_elapsed: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_rate: u32,
    pub max_clients: usize,
    pub idle_timeout: Duration,
    pub input_policy: InputPolicy,
}

impl ServerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", shared::DEFAULT_PORT),
            tick_rate: SERVER_TICK_RATE,
            max_clients: MAX_CLIENTS,
            idle_timeout: shared::transport::udp::DEFAULT_IDLE_TIMEOUT,
            input_policy: InputPolicy::default(),
        }
    }
}
