//! Connection table for the authoritative server
//!
//! This module maps live transport connections to the small entity ids handed
//! out to clients, and owns the authoritative entity of every connection:
//! - Id assignment from a bounded pool when a connection becomes active
//! - Last applied input tracking (the acknowledgment watermark)
//! - Teardown that releases the id and destroys the entity together
//!
//! An id is never reassigned while its connection is live, and is reusable as
//! soon as the connection has been removed.

use crate::slots::{PoolExhausted, SlotArena};
use log::info;
use shared::transport::ConnectionId;
use shared::Entity;
use std::collections::HashMap;
use std::time::Instant;

/// Server-side record of one active connection
#[derive(Debug)]
pub struct Client {
    /// Entity id assigned to this connection
    pub id: u32,
    pub connection: ConnectionId,
    /// Authoritative copy of the client's entity
    pub entity: Entity,
    /// Highest input sequence number applied to `entity`, 0 when none yet
    pub last_processed_input: u32,
    /// Set once any input arrives, valid or not; proves the welcome got through
    pub heard_from: bool,
    pub connected_at: Instant,
}

impl Client {
    /// Creates a client with a zeroed entity and no applied inputs.
    pub fn new(id: u32, connection: ConnectionId) -> Self {
        Self {
            id,
            connection,
            entity: Entity::default(),
            last_processed_input: 0,
            heard_from: false,
            connected_at: Instant::now(),
        }
    }
}

/// Manages all active connections and the id pool backing them
pub struct ClientManager {
    clients: SlotArena<Client>,
    connections: HashMap<ConnectionId, u32>,
}

impl ClientManager {
    /// Creates a manager whose id pool holds `max_clients` ids.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: SlotArena::with_capacity(max_clients),
            connections: HashMap::new(),
        }
    }

    /// Activates a connection, assigning it an id and a fresh entity
    ///
    /// Connecting an already active connection returns its existing id.
    pub fn add_client(&mut self, connection: ConnectionId) -> Result<u32, PoolExhausted> {
        if let Some(&id) = self.connections.get(&connection) {
            return Ok(id);
        }

        let id = self.clients.insert(Client::new(0, connection))?;
        if let Some(client) = self.clients.get_mut(id) {
            client.id = id;
        }
        self.connections.insert(connection, id);

        info!(
            "Client {} assigned to {} ({}/{})",
            id,
            connection,
            self.len(),
            self.capacity()
        );
        Ok(id)
    }

    /// Tears a connection down, destroying its entity and freeing its id
    ///
    /// Returns the removed client, or None if the connection was not active.
    pub fn remove_client(&mut self, connection: ConnectionId) -> Option<Client> {
        let id = self.connections.remove(&connection)?;
        let client = self.clients.remove(id)?;

        info!(
            "Client {} released from {} ({}/{})",
            id,
            connection,
            self.len(),
            self.capacity()
        );
        Some(client)
    }

    pub fn client_id(&self, connection: ConnectionId) -> Option<u32> {
        self.connections.get(&connection).copied()
    }

    pub fn get(&self, connection: ConnectionId) -> Option<&Client> {
        let id = self.client_id(connection)?;
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, connection: ConnectionId) -> Option<&mut Client> {
        let id = self.client_id(connection)?;
        self.clients.get_mut(id)
    }

    /// Active clients in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.iter().map(|(_, client)| client)
    }

    /// Connections currently holding an id
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.iter().map(|client| client.connection).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.clients.capacity()
    }
}
