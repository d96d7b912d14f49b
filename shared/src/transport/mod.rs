//! Transport collaborator boundary.
//!
//! The synchronization core only sees opaque encoded messages and connection
//! lifecycle events. Anything implementing these traits can carry it; the
//! [`udp`] module provides the implementation used by the binaries.

mod frame;
pub mod udp;

pub use frame::Frame;
pub use udp::{UdpClientTransport, UdpServerTransport};

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Opaque handle for one live transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Server side transport events.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected(ConnectionId),
    Disconnected(ConnectionId),
    DisconnectedTimeout(ConnectionId),
    MessageReceived(ConnectionId, Vec<u8>),
}

/// Client side transport events.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Disconnected,
    DisconnectedTimeout,
    MessageReceived(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame encoding error: {0}")]
    Frame(#[from] bincode::Error),
    #[error("invalid address: {0}")]
    Address(String),
    #[error("timed out connecting to {0}")]
    Timeout(String),
    #[error("connection rejected: {0}")]
    Rejected(String),
    #[error("not connected")]
    NotConnected,
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
}

/// Transport as seen by the server: many connections, one poll loop.
#[allow(async_fn_in_trait)]
pub trait ServerTransport {
    /// Waits at most `max_wait` for events, then returns whatever arrived.
    /// A zero wait must not block.
    async fn poll(&mut self, max_wait: Duration) -> Result<Vec<TransportEvent>, TransportError>;

    async fn send(&mut self, connection: ConnectionId, bytes: &[u8]) -> Result<(), TransportError>;

    async fn broadcast(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Ends a connection from the server side. No event is reported for it.
    async fn disconnect(&mut self, connection: ConnectionId) -> Result<(), TransportError>;
}

/// Transport as seen by a client: a single connection to the server.
#[allow(async_fn_in_trait)]
pub trait ClientTransport {
    async fn poll(&mut self, max_wait: Duration) -> Result<Vec<ClientEvent>, TransportError>;

    async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}
