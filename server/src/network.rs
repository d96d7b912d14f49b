//! Server tick loop coordinating the transport and the authoritative simulation

use crate::config::ServerConfig;
use crate::game::GameState;
use crate::slots::PoolExhausted;
use log::{debug, error, info, warn};
use shared::transport::{ConnectionId, ServerTransport, TransportError, TransportEvent};
use shared::Packet;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Ticks between periodic statistics log lines
const STATS_INTERVAL_TICKS: u64 = 100;
/// Ticks between welcome repeats to clients that have not sent input yet
pub const WELCOME_RESEND_TICKS: u64 = 10;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Admission is capped by the transport, so this is an invariant violation.
    #[error("id pool exhausted: {0}")]
    PoolExhausted(#[from] PoolExhausted),
}

/// Authoritative server: owns the transport and the game state and runs the
/// fixed timestep loop over them.
pub struct Server<T: ServerTransport> {
    transport: T,
    game_state: GameState,
    tick_duration: Duration,
    running: bool,
}

impl<T: ServerTransport> Server<T> {
    pub fn new(transport: T, config: &ServerConfig) -> Self {
        Self {
            transport,
            game_state: GameState::new(config.max_clients, config.input_policy),
            tick_duration: config.tick_duration(),
            running: false,
        }
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Ends `run` after the tick in progress.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Runs ticks at the configured rate until `stop` is called or an error occurs.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.running = true;
        info!(
            "Server started, tick interval {:.1}ms",
            self.tick_duration.as_secs_f64() * 1000.0
        );

        let mut deadline = Instant::now() + self.tick_duration;
        while self.running {
            if let Err(e) = self.tick(deadline).await {
                error!("Server tick failed: {}", e);
                self.running = false;
                return Err(e);
            }

            deadline += self.tick_duration;
            let now = Instant::now();
            if deadline <= now {
                warn!(
                    "Tick {} overran by {:?}, resynchronizing",
                    self.game_state.tick,
                    now - deadline
                );
                deadline = now + self.tick_duration;
            }
        }

        info!("Server stopped after {} ticks", self.game_state.tick);
        Ok(())
    }

    /// One fixed timestep: drain network events until `deadline`, then broadcast
    /// the world state.
    pub async fn tick(&mut self, deadline: Instant) -> Result<(), ServerError> {
        self.drain_until(deadline).await?;
        self.broadcast_world_state().await?;
        self.game_state.tick += 1;

        if self.game_state.tick % WELCOME_RESEND_TICKS == 0 {
            self.resend_welcomes().await;
        }

        if self.game_state.tick % STATS_INTERVAL_TICKS == 0 {
            debug!(
                "Tick {}: {} clients",
                self.game_state.tick,
                self.game_state.player_count()
            );
        }
        Ok(())
    }

    /// Processes transport events until the deadline passes. Polls at least once,
    /// and never waits past the deadline.
    async fn drain_until(&mut self, deadline: Instant) -> Result<(), ServerError> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let events = self.transport.poll(remaining).await?;
            for event in events {
                self.handle_event(event).await?;
            }

            if remaining.is_zero() {
                return Ok(());
            }
        }
    }

    async fn handle_event(&mut self, event: TransportEvent) -> Result<(), ServerError> {
        match event {
            TransportEvent::Connected(connection) => {
                let client_id = self.game_state.add_player(connection)?;
                self.send_welcome(connection, client_id).await;
            }
            TransportEvent::Disconnected(connection) => {
                self.game_state.remove_player(connection);
            }
            TransportEvent::DisconnectedTimeout(connection) => {
                info!("{} timed out", connection);
                self.game_state.remove_player(connection);
            }
            TransportEvent::MessageReceived(connection, bytes) => {
                self.handle_message(connection, &bytes);
            }
        }
        Ok(())
    }

    async fn send_welcome(&mut self, connection: ConnectionId, client_id: u32) {
        let welcome = Packet::Welcome { client_id }.encode();
        if let Err(e) = self.transport.send(connection, &welcome).await {
            warn!("Failed to welcome {}: {}", connection, e);
        }
    }

    /// The welcome travels best effort. Until a client's first input proves it
    /// arrived, it is sent again.
    async fn resend_welcomes(&mut self) {
        for (connection, client_id) in self.game_state.awaiting_first_input() {
            debug!("Repeating welcome for id {} to {}", client_id, connection);
            self.send_welcome(connection, client_id).await;
        }
    }

    fn handle_message(&mut self, connection: ConnectionId, bytes: &[u8]) {
        match Packet::decode(bytes) {
            Ok(Packet::Input(input)) => {
                if let Err(reason) = self.game_state.apply_input(connection, &input) {
                    debug!("Dropped input {} from {}: {}", input.sequence, connection, reason);
                }
            }
            Ok(other) => {
                warn!(
                    "Unexpected packet type {} from {}",
                    other.type_tag(),
                    connection
                );
            }
            Err(e) => {
                warn!("Malformed packet from {}: {}", connection, e);
            }
        }
    }

    async fn broadcast_world_state(&mut self) -> Result<(), ServerError> {
        if self.game_state.player_count() == 0 {
            return Ok(());
        }

        let packet = Packet::WorldState(self.game_state.world_state());
        self.transport.broadcast(&packet.encode()).await?;
        Ok(())
    }

    /// Disconnects every active connection and releases its id and entity.
    pub async fn shutdown(&mut self) {
        self.running = false;
        for connection in self.game_state.connections() {
            if let Err(e) = self.transport.disconnect(connection).await {
                warn!("Failed to disconnect {}: {}", connection, e);
            }
            self.game_state.remove_player(connection);
        }
        info!("Server shut down");
    }
}
