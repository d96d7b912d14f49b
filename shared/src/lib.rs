//! Shared protocol pieces used by both the server and the client: the entity
//! model and its deterministic update rule, the binary wire codec, and the
//! transport boundary.

pub mod entity;
pub mod math;
pub mod packet;
pub mod transport;

pub use entity::{apply, Entity, InputSnapshot};
pub use math::Vec2;
pub use packet::{MalformedPacket, Packet, WorldStateEntry};

/// Movement speed of every entity, in units per second.
pub const ENTITY_SPEED: f32 = 128.0;
/// Server simulation ticks per second.
pub const SERVER_TICK_RATE: u32 = 20;
/// Capacity of the server's id pool and the transport's connection cap.
pub const MAX_CLIENTS: usize = 32;
pub const DEFAULT_PORT: u16 = 7777;

/// One server tick in seconds. Clients render remote entities this far in the past.
pub fn server_tick_interval(tick_rate: u32) -> f32 {
    1.0 / tick_rate.max(1) as f32
}
