//! Client-side view of the world: the predicted local entity and the
//! interpolated remote entities.

use crate::config::NetcodeToggles;
use crate::input::{DeviceState, InputSequencer};
use crate::interpolation::RemoteEntity;
use crate::prediction::PendingInputs;
use log::{debug, info};
use shared::{Entity, InputSnapshot, Vec2, WorldStateEntry};
use std::collections::HashMap;

pub struct ClientGameState {
    player_id: Option<u32>,
    local: Entity,
    sequencer: InputSequencer,
    pending: PendingInputs,
    remotes: HashMap<u32, RemoteEntity>,
    /// Highest watermark applied to the local entity.
    last_watermark: u32,
    /// Seconds since the session started, advanced once per frame.
    game_time: f64,
    interpolation_delay: f64,
    toggles: NetcodeToggles,
}

impl ClientGameState {
    pub fn new(interpolation_delay: f32, toggles: NetcodeToggles) -> Self {
        Self {
            player_id: None,
            local: Entity::default(),
            sequencer: InputSequencer::new(),
            pending: PendingInputs::new(),
            remotes: HashMap::new(),
            last_watermark: 0,
            game_time: 0.0,
            interpolation_delay: f64::from(interpolation_delay),
            toggles,
        }
    }

    pub fn advance_clock(&mut self, dt: f32) {
        self.game_time += f64::from(dt);
    }

    /// Starts a fresh session under `client_id`. Anything predicted or
    /// buffered under a previous id is discarded.
    ///
    /// The server repeats its welcome until it hears from us, so a welcome
    /// for the id we already hold is ignored.
    pub fn handle_welcome(&mut self, client_id: u32) {
        match self.player_id {
            Some(current) if current == client_id => {
                debug!("Repeated welcome for id {}", client_id);
                return;
            }
            Some(previous) => info!("Reassigned from id {} to {}", previous, client_id),
            None => info!("Assigned id {}", client_id),
        }

        self.reset();
        self.player_id = Some(client_id);
    }

    /// Clears the assignment and all session state.
    pub fn reset(&mut self) {
        self.player_id = None;
        self.local = Entity::default();
        self.sequencer = InputSequencer::new();
        self.pending.clear();
        self.remotes.clear();
        self.last_watermark = 0;
    }

    /// Samples one frame of input. The returned snapshot has been queued as
    /// pending and, with prediction on, already applied to the local entity.
    /// The caller sends it.
    pub fn capture_input(&mut self, state: DeviceState, dt: f32) -> Option<InputSnapshot> {
        if self.player_id.is_none() {
            return None;
        }

        let input = self.sequencer.capture(state, dt)?;
        if self.toggles.prediction {
            self.local.update(&input);
        }
        self.pending.push(input);
        Some(input)
    }

    /// Applies one authoritative world state broadcast.
    pub fn apply_world_state(&mut self, entries: &[WorldStateEntry]) {
        let Some(player_id) = self.player_id else {
            debug!("Ignoring world state before assignment");
            return;
        };

        // Datagrams can arrive out of order. A snapshot acknowledging less than
        // one already applied predates it and would roll the prediction back.
        if let Some(own) = entries.iter().find(|entry| entry.entity_id == player_id) {
            if own.last_processed_input < self.last_watermark {
                debug!(
                    "Ignoring stale world state (watermark {} < {})",
                    own.last_processed_input, self.last_watermark
                );
                return;
            }
        }

        for entry in entries {
            if entry.entity_id == player_id {
                self.reconcile(entry.position, entry.last_processed_input);
                continue;
            }

            match self.remotes.get_mut(&entry.entity_id) {
                Some(remote) => remote.push_sample(self.game_time, entry.position),
                None => {
                    debug!("Remote entity {} appeared", entry.entity_id);
                    self.remotes
                        .insert(entry.entity_id, RemoteEntity::new(self.game_time, entry.position));
                }
            }
        }

        self.remotes.retain(|id, _| {
            let present = entries.iter().any(|entry| entry.entity_id == *id);
            if !present {
                debug!("Remote entity {} left", id);
            }
            present
        });
    }

    fn reconcile(&mut self, authoritative: Vec2, watermark: u32) {
        self.last_watermark = watermark;
        self.pending.acknowledge(watermark);

        // Without prediction, unacknowledged inputs are never shown locally.
        self.local.position = if self.toggles.reconciliation && self.toggles.prediction {
            self.pending.replay(authoritative)
        } else {
            authoritative
        };
    }

    /// Updates every remote entity's displayed position for this frame.
    pub fn interpolate(&mut self) {
        let render_timestamp = self.game_time - self.interpolation_delay;
        for remote in self.remotes.values_mut() {
            if self.toggles.interpolation {
                remote.interpolate(render_timestamp);
            } else {
                remote.snap_to_latest();
            }
        }
    }

    pub fn player_id(&self) -> Option<u32> {
        self.player_id
    }

    pub fn is_assigned(&self) -> bool {
        self.player_id.is_some()
    }

    pub fn local_position(&self) -> Vec2 {
        self.local.position
    }

    /// Displayed position of every remote entity, ordered by id.
    pub fn remote_positions(&self) -> Vec<(u32, Vec2)> {
        let mut positions: Vec<(u32, Vec2)> = self
            .remotes
            .iter()
            .map(|(id, remote)| (*id, remote.position()))
            .collect();
        positions.sort_by_key(|(id, _)| *id);
        positions
    }

    pub fn pending_input_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> &PendingInputs {
        &self.pending
    }

    pub fn game_time(&self) -> f64 {
        self.game_time
    }

    pub fn toggles(&self) -> NetcodeToggles {
        self.toggles
    }
}
