use serde::{Deserialize, Serialize};

use super::TransportError;

/// Datagram framing of the UDP transport. Application packets travel opaque
/// inside [`Frame::Payload`]; the other variants drive the connection lifecycle.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Frame {
    Connect { protocol_version: u32 },
    Accept,
    Reject { reason: String },
    Disconnect,
    Heartbeat,
    Payload(Vec<u8>),
}

impl Frame {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransportError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Frame, TransportError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
