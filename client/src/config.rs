//! Client configuration consumed by the library; `main.rs` builds it from the command line.

use crate::input::MovementPattern;
use shared::{server_tick_interval, DEFAULT_PORT, SERVER_TICK_RATE};
use std::time::Duration;

/// Debug switches for the three netcode techniques.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetcodeToggles {
    pub prediction: bool,
    pub reconciliation: bool,
    pub interpolation: bool,
}

impl Default for NetcodeToggles {
    fn default() -> Self {
        Self {
            prediction: true,
            reconciliation: true,
            interpolation: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub pattern: MovementPattern,
    pub frame_rate: u32,
    /// Server tick rate, used to derive the interpolation delay.
    pub tick_rate: u32,
    pub connect_timeout: Duration,
    pub toggles: NetcodeToggles,
    /// How long to run; `None` runs until disconnected or interrupted.
    pub duration: Option<Duration>,
}

impl ClientConfig {
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }

    /// Remote entities are rendered one server tick behind local time.
    pub fn interpolation_delay(&self) -> f32 {
        server_tick_interval(self.tick_rate)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            pattern: MovementPattern::Circle,
            frame_rate: 60,
            tick_rate: SERVER_TICK_RATE,
            connect_timeout: Duration::from_secs(5),
            toggles: NetcodeToggles::default(),
            duration: None,
        }
    }
}
