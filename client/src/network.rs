//! Client session: drives the transport, the input device and the game state
//! once per frame.

use crate::config::ClientConfig;
use crate::game::ClientGameState;
use crate::input::InputDevice;
use log::{debug, error, info, warn};
use shared::transport::{ClientEvent, ClientTransport, TransportError};
use shared::Packet;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Interval between debug log lines describing the current view
const VIEW_LOG_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub struct Client<T: ClientTransport, D: InputDevice> {
    transport: T,
    device: D,
    game_state: ClientGameState,
    frame_duration: Duration,
    connected: bool,
    last_view_log: Option<Instant>,
}

impl<T: ClientTransport, D: InputDevice> Client<T, D> {
    pub fn new(transport: T, device: D, config: &ClientConfig) -> Self {
        Self {
            connected: transport.is_connected(),
            transport,
            device,
            game_state: ClientGameState::new(config.interpolation_delay(), config.toggles),
            frame_duration: config.frame_duration(),
            last_view_log: None,
        }
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Runs frames at the configured rate until disconnected, until
    /// `duration` elapses, or until a transport error occurs.
    pub async fn run(&mut self, duration: Option<Duration>) -> Result<(), ClientError> {
        let started = Instant::now();
        let mut frames = interval(self.frame_duration);
        frames.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_frame = started;
        while self.connected {
            frames.tick().await;

            let now = Instant::now();
            let dt = (now - last_frame).as_secs_f32();
            last_frame = now;

            if let Err(e) = self.frame(dt).await {
                error!("Client frame failed: {}", e);
                return Err(e);
            }

            if duration.is_some_and(|limit| now - started >= limit) {
                info!("Run time elapsed");
                break;
            }
        }

        info!(
            "Session ended at ({:.1}, {:.1}) with {} inputs pending",
            self.game_state.local_position().x,
            self.game_state.local_position().y,
            self.game_state.pending_input_count()
        );
        Ok(())
    }

    /// One client frame: drain the network, sample and send input, then
    /// interpolate remote entities.
    pub async fn frame(&mut self, dt: f32) -> Result<(), ClientError> {
        self.game_state.advance_clock(dt);

        let events = self.transport.poll(Duration::ZERO).await?;
        for event in events {
            self.handle_event(event);
        }
        if !self.connected {
            return Ok(());
        }

        let state = self.device.sample(dt);
        if let Some(input) = self.game_state.capture_input(state, dt) {
            self.transport.send(&Packet::Input(input).encode()).await?;
        }

        self.game_state.interpolate();
        self.log_view();
        Ok(())
    }

    fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::MessageReceived(bytes) => self.handle_message(&bytes),
            ClientEvent::Disconnected => {
                warn!("Disconnected by server");
                self.end_session();
            }
            ClientEvent::DisconnectedTimeout => {
                warn!("Connection to server timed out");
                self.end_session();
            }
        }
    }

    fn handle_message(&mut self, bytes: &[u8]) {
        match Packet::decode(bytes) {
            Ok(Packet::Welcome { client_id }) => self.game_state.handle_welcome(client_id),
            Ok(Packet::WorldState(entries)) => self.game_state.apply_world_state(&entries),
            Ok(other) => warn!("Unexpected packet type {} from server", other.type_tag()),
            Err(e) => warn!("Malformed packet from server: {}", e),
        }
    }

    fn end_session(&mut self) {
        self.connected = false;
        self.game_state.reset();
    }

    fn log_view(&mut self) {
        let now = Instant::now();
        if self
            .last_view_log
            .is_some_and(|last| now - last < VIEW_LOG_INTERVAL)
        {
            return;
        }
        self.last_view_log = Some(now);

        let local = self.game_state.local_position();
        debug!(
            "id {:?} at ({:.1}, {:.1}), {} pending, {} remotes: {:?}",
            self.game_state.player_id(),
            local.x,
            local.y,
            self.game_state.pending_input_count(),
            self.game_state.remote_positions().len(),
            self.game_state.remote_positions()
        );
    }

    /// Tells the server the session is over.
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            warn!("Failed to disconnect cleanly: {}", e);
        }
        self.end_session();
    }
}
