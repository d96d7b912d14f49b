use crate::client_manager::{Client, ClientManager};
use crate::config::InputPolicy;
use crate::slots::PoolExhausted;
use log::{debug, info};
use shared::transport::ConnectionId;
use shared::{InputSnapshot, WorldStateEntry};
use thiserror::Error;

/// Why an input was dropped without being applied or acknowledged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputRejected {
    #[error("input from inactive {0}")]
    UnknownConnection(ConnectionId),
    #[error("direction ({x}, {y}) outside the accepted bound")]
    InvalidDirection { x: f32, y: f32 },
    #[error("elapsed time {0} outside the accepted range")]
    InvalidElapsed(f32),
    #[error("sequence {sequence} already covered by watermark {watermark}")]
    Stale { sequence: u32, watermark: u32 },
}

/// Checks an input against the policy. Non-finite values and negative elapsed
/// time are always rejected.
pub fn validate_input(input: &InputSnapshot, policy: &InputPolicy) -> Result<(), InputRejected> {
    let direction = input.direction;
    if !direction.is_finite() || !policy.direction.accepts(direction) {
        return Err(InputRejected::InvalidDirection {
            x: direction.x,
            y: direction.y,
        });
    }

    if !input.elapsed.is_finite() || input.elapsed < 0.0 || input.elapsed > policy.max_elapsed {
        return Err(InputRejected::InvalidElapsed(input.elapsed));
    }

    Ok(())
}

/// Authoritative world: one entity per active connection.
pub struct GameState {
    pub tick: u64,
    clients: ClientManager,
    policy: InputPolicy,
}

impl GameState {
    pub fn new(max_clients: usize, policy: InputPolicy) -> Self {
        Self {
            tick: 0,
            clients: ClientManager::new(max_clients),
            policy,
        }
    }

    pub fn add_player(&mut self, connection: ConnectionId) -> Result<u32, PoolExhausted> {
        let id = self.clients.add_client(connection)?;
        info!("Added player {} at the origin", id);
        Ok(id)
    }

    pub fn remove_player(&mut self, connection: ConnectionId) -> Option<u32> {
        let client = self.clients.remove_client(connection)?;
        info!(
            "Removed player {} after {:.1}s",
            client.id,
            client.connected_at.elapsed().as_secs_f32()
        );
        Some(client.id)
    }

    /// Validates and applies one input, returning the connection's new watermark.
    ///
    /// A rejected input leaves both the entity and the watermark untouched.
    pub fn apply_input(
        &mut self,
        connection: ConnectionId,
        input: &InputSnapshot,
    ) -> Result<u32, InputRejected> {
        let policy = self.policy;
        let client = self
            .clients
            .get_mut(connection)
            .ok_or(InputRejected::UnknownConnection(connection))?;
        client.heard_from = true;

        if input.sequence <= client.last_processed_input {
            return Err(InputRejected::Stale {
                sequence: input.sequence,
                watermark: client.last_processed_input,
            });
        }
        validate_input(input, &policy)?;

        client.entity.update(input);
        client.last_processed_input = input.sequence;
        debug!(
            "Player {} applied input {} -> ({:.2}, {:.2})",
            client.id, input.sequence, client.entity.position.x, client.entity.position.y
        );
        Ok(client.last_processed_input)
    }

    /// Snapshot of every active entity, each tagged with its own watermark.
    pub fn world_state(&self) -> Vec<WorldStateEntry> {
        self.clients
            .iter()
            .map(|client| WorldStateEntry {
                entity_id: client.id,
                last_processed_input: client.last_processed_input,
                position: client.entity.position,
            })
            .collect()
    }

    pub fn client(&self, connection: ConnectionId) -> Option<&Client> {
        self.clients.get(connection)
    }

    pub fn connections(&self) -> Vec<ConnectionId> {
        self.clients.connections()
    }

    pub fn player_count(&self) -> usize {
        self.clients.len()
    }

    /// Clients that have not sent any input since their welcome.
    pub fn awaiting_first_input(&self) -> Vec<(ConnectionId, u32)> {
        self.clients
            .iter()
            .filter(|client| !client.heard_from)
            .map(|client| (client.connection, client.id))
            .collect()
    }
}
