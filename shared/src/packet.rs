//! Fixed-layout binary codec for application messages.
//!
//! Every packet starts with a one byte type tag followed by its fields in
//! order, little-endian, without padding:
//!
//! | Tag | Packet     | Fields |
//! |-----|------------|--------|
//! | 0   | Welcome    | `client_id: u32` |
//! | 1   | Input      | `sequence: u32, direction_x: f32, direction_y: f32, elapsed: f32` |
//! | 2   | WorldState | `count: u32`, then `count` × `(entity_id: u32, last_processed_input: u32, x: f32, y: f32)` |
//!
//! Decoding is bounds checked. A buffer that is shorter or longer than the
//! layout requires is rejected instead of truncated.

use crate::entity::InputSnapshot;
use crate::math::Vec2;
use thiserror::Error;

const TAG_WELCOME: u8 = 0;
const TAG_INPUT: u8 = 1;
const TAG_WORLD_STATE: u8 = 2;

/// Encoded size of one world state entry.
pub const WORLD_STATE_ENTRY_SIZE: usize = 16;

/// One entity's authoritative state inside a world state broadcast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldStateEntry {
    pub entity_id: u32,
    /// Highest input sequence the server applied for this entity. Only the
    /// entity's own client reads it.
    pub last_processed_input: u32,
    pub position: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Server to client, first message of a session.
    Welcome { client_id: u32 },
    /// Client to server.
    Input(InputSnapshot),
    /// Server to every client, once per tick.
    WorldState(Vec<WorldStateEntry>),
}

/// Reasons a buffer could not be decoded into a [`Packet`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedPacket {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet type tag {0}")]
    UnknownTag(u8),
    #[error("packet truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("world state declares {count} entries but only {remaining} bytes follow")]
    EntryCountOverflow { count: u32, remaining: usize },
    #[error("{0} trailing bytes after packet")]
    TrailingBytes(usize),
}

impl Packet {
    pub fn type_tag(&self) -> u8 {
        match self {
            Packet::Welcome { .. } => TAG_WELCOME,
            Packet::Input(_) => TAG_INPUT,
            Packet::WorldState(_) => TAG_WORLD_STATE,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(self.encoded_len());
        writer.put_u8(self.type_tag());

        match self {
            Packet::Welcome { client_id } => writer.put_u32(*client_id),
            Packet::Input(input) => {
                writer.put_u32(input.sequence);
                writer.put_f32(input.direction.x);
                writer.put_f32(input.direction.y);
                writer.put_f32(input.elapsed);
            }
            Packet::WorldState(entries) => {
                writer.put_u32(entries.len() as u32);
                for entry in entries {
                    writer.put_u32(entry.entity_id);
                    writer.put_u32(entry.last_processed_input);
                    writer.put_f32(entry.position.x);
                    writer.put_f32(entry.position.y);
                }
            }
        }

        writer.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, MalformedPacket> {
        let mut reader = Reader::new(bytes);
        if reader.remaining() == 0 {
            return Err(MalformedPacket::Empty);
        }

        let packet = match reader.u8()? {
            TAG_WELCOME => Packet::Welcome {
                client_id: reader.u32()?,
            },
            TAG_INPUT => {
                let sequence = reader.u32()?;
                let x = reader.f32()?;
                let y = reader.f32()?;
                let elapsed = reader.f32()?;
                Packet::Input(InputSnapshot::new(sequence, elapsed, Vec2::new(x, y)))
            }
            TAG_WORLD_STATE => {
                let count = reader.u32()?;
                let remaining = reader.remaining();
                if count as usize > remaining / WORLD_STATE_ENTRY_SIZE {
                    return Err(MalformedPacket::EntryCountOverflow { count, remaining });
                }

                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let entity_id = reader.u32()?;
                    let last_processed_input = reader.u32()?;
                    let x = reader.f32()?;
                    let y = reader.f32()?;
                    entries.push(WorldStateEntry {
                        entity_id,
                        last_processed_input,
                        position: Vec2::new(x, y),
                    });
                }
                Packet::WorldState(entries)
            }
            tag => return Err(MalformedPacket::UnknownTag(tag)),
        };

        match reader.remaining() {
            0 => Ok(packet),
            extra => Err(MalformedPacket::TrailingBytes(extra)),
        }
    }

    fn encoded_len(&self) -> usize {
        1 + match self {
            Packet::Welcome { .. } => 4,
            Packet::Input(_) => 16,
            Packet::WorldState(entries) => 4 + entries.len() * WORLD_STATE_ENTRY_SIZE,
        }
    }
}

struct Writer {
    buffer: Vec<u8>,
}

impl Writer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    fn put_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    fn put_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn put_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], MalformedPacket> {
        let remaining = self.remaining();
        if remaining < N {
            return Err(MalformedPacket::Truncated {
                needed: N,
                remaining,
            });
        }

        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.offset..self.offset + N]);
        self.offset += N;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, MalformedPacket> {
        Ok(self.take::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, MalformedPacket> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn f32(&mut self) -> Result<f32, MalformedPacket> {
        Ok(f32::from_le_bytes(self.take()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_world_state() -> Packet {
        Packet::WorldState(vec![
            WorldStateEntry {
                entity_id: 0,
                last_processed_input: 17,
                position: Vec2::new(12.5, -3.0),
            },
            WorldStateEntry {
                entity_id: 5,
                last_processed_input: 0,
                position: Vec2::new(-100.0, 256.25),
            },
        ])
    }

    #[test]
    fn test_packet_roundtrip_welcome() {
        let packet = Packet::Welcome { client_id: 31 };
        let encoded = packet.encode();
        assert_eq!(encoded, vec![0, 31, 0, 0, 0]);
        assert_eq!(Packet::decode(&encoded).unwrap(), packet);
    }

    #[test]
    fn test_packet_roundtrip_input() {
        let packet = Packet::Input(InputSnapshot::new(
            123,
            1.0 / 60.0,
            Vec2::new(0.6, -0.8),
        ));
        let encoded = packet.encode();
        assert_eq!(encoded.len(), 17);
        assert_eq!(encoded[0], 1);
        assert_eq!(Packet::decode(&encoded).unwrap(), packet);
    }

    #[test]
    fn test_packet_roundtrip_world_state() {
        let packet = sample_world_state();
        let encoded = packet.encode();
        assert_eq!(encoded.len(), 1 + 4 + 2 * WORLD_STATE_ENTRY_SIZE);
        assert_eq!(&encoded[1..5], &2u32.to_le_bytes());
        assert_eq!(Packet::decode(&encoded).unwrap(), packet);
    }

    #[test]
    fn test_empty_world_state() {
        let packet = Packet::WorldState(Vec::new());
        let encoded = packet.encode();
        assert_eq!(encoded, vec![2, 0, 0, 0, 0]);
        assert_eq!(Packet::decode(&encoded).unwrap(), packet);
    }

    #[test]
    fn test_input_field_layout() {
        let packet = Packet::Input(InputSnapshot::new(7, 0.5, Vec2::new(1.0, 0.0)));
        let encoded = packet.encode();
        assert_eq!(&encoded[1..5], &7u32.to_le_bytes());
        assert_eq!(&encoded[5..9], &1.0f32.to_le_bytes());
        assert_eq!(&encoded[9..13], &0.0f32.to_le_bytes());
        assert_eq!(&encoded[13..17], &0.5f32.to_le_bytes());
    }

    #[test]
    fn test_decode_empty_buffer() {
        assert_eq!(Packet::decode(&[]), Err(MalformedPacket::Empty));
    }

    #[test]
    fn test_decode_unknown_tag() {
        assert_eq!(
            Packet::decode(&[9, 0, 0, 0, 0]),
            Err(MalformedPacket::UnknownTag(9))
        );
    }

    #[test]
    fn test_decode_truncated_input() {
        let mut encoded =
            Packet::Input(InputSnapshot::new(1, 0.1, Vec2::new(0.0, 1.0))).encode();
        encoded.pop();
        assert_eq!(
            Packet::decode(&encoded),
            Err(MalformedPacket::Truncated {
                needed: 4,
                remaining: 3
            })
        );
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut encoded = Packet::Welcome { client_id: 1 }.encode();
        encoded.extend_from_slice(&[0xAA, 0xBB]);
        assert_eq!(
            Packet::decode(&encoded),
            Err(MalformedPacket::TrailingBytes(2))
        );
    }

    #[test]
    fn test_decode_entry_count_larger_than_payload() {
        let mut encoded = vec![2];
        encoded.extend_from_slice(&u32::MAX.to_le_bytes());
        encoded.extend_from_slice(&[0u8; WORLD_STATE_ENTRY_SIZE]);
        assert_eq!(
            Packet::decode(&encoded),
            Err(MalformedPacket::EntryCountOverflow {
                count: u32::MAX,
                remaining: WORLD_STATE_ENTRY_SIZE
            })
        );
    }

    #[test]
    fn test_decode_partial_entry() {
        let mut encoded = sample_world_state().encode();
        encoded.truncate(encoded.len() - 1);
        assert!(Packet::decode(&encoded).is_err());
    }

    #[test]
    fn test_nan_survives_decoding() {
        let packet = Packet::Input(InputSnapshot::new(1, f32::NAN, Vec2::ZERO));
        match Packet::decode(&packet.encode()).unwrap() {
            Packet::Input(input) => assert!(input.elapsed.is_nan()),
            _ => panic!("Wrong packet type after decoding"),
        }
    }
}
