//! Pending input queue and server reconciliation.

use shared::{apply, InputSnapshot, Vec2};
use std::collections::VecDeque;

/// Inputs applied locally but not yet acknowledged by the server, in
/// ascending sequence order.
#[derive(Debug, Default, Clone)]
pub struct PendingInputs {
    inputs: VecDeque<InputSnapshot>,
}

impl PendingInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, input: InputSnapshot) {
        debug_assert!(
            self.inputs
                .back()
                .map_or(true, |last| last.sequence < input.sequence),
            "pending inputs must be pushed in ascending sequence order"
        );
        self.inputs.push_back(input);
    }

    /// Drops every input with a sequence number at or below `watermark`.
    pub fn acknowledge(&mut self, watermark: u32) {
        while self
            .inputs
            .front()
            .is_some_and(|input| input.sequence <= watermark)
        {
            self.inputs.pop_front();
        }
    }

    /// Re-applies every pending input, in order, on top of `from`.
    pub fn replay(&self, from: Vec2) -> Vec2 {
        self.inputs.iter().fold(from, apply)
    }

    /// Acknowledges up to `watermark` and returns the position predicted on top
    /// of the authoritative one.
    pub fn reconcile(&mut self, authoritative: Vec2, watermark: u32) -> Vec2 {
        self.acknowledge(watermark);
        self.replay(authoritative)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputSnapshot> {
        self.inputs.iter()
    }

    pub fn sequences(&self) -> Vec<u32> {
        self.inputs.iter().map(|input| input.sequence).collect()
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}
