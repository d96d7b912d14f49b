//! Time-shifted interpolation of remote entities.
//!
//! Remote entities are drawn one server tick in the past, between the two
//! received samples that straddle the render timestamp. They are never
//! extrapolated past the newest sample.

use shared::{Entity, Vec2};
use std::collections::VecDeque;

/// An authoritative position stamped with the local time, in seconds, it arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub timestamp: f64,
    pub position: Vec2,
}

/// Display-only copy of another client's entity and its sample history.
#[derive(Debug, Clone)]
pub struct RemoteEntity {
    entity: Entity,
    samples: VecDeque<PositionSample>,
}

impl RemoteEntity {
    /// Creates the entity at its first known position.
    pub fn new(timestamp: f64, position: Vec2) -> Self {
        let mut samples = VecDeque::new();
        samples.push_back(PositionSample {
            timestamp,
            position,
        });

        Self {
            entity: Entity::new(position),
            samples,
        }
    }

    /// Appends a sample. Samples older than the newest one are ignored.
    pub fn push_sample(&mut self, timestamp: f64, position: Vec2) {
        if self
            .samples
            .back()
            .is_some_and(|last| timestamp < last.timestamp)
        {
            return;
        }
        self.samples.push_back(PositionSample {
            timestamp,
            position,
        });
    }

    /// Updates the displayed position for `render_timestamp`.
    pub fn interpolate(&mut self, render_timestamp: f64) {
        while self.samples.len() >= 2 && self.samples[1].timestamp <= render_timestamp {
            self.samples.pop_front();
        }

        let Some(&from) = self.samples.front() else {
            return;
        };
        if from.timestamp > render_timestamp {
            // Render time is before anything we know; keep the last position.
            return;
        }

        match self.samples.get(1) {
            Some(&to) if to.timestamp > from.timestamp => {
                let alpha = (render_timestamp - from.timestamp) / (to.timestamp - from.timestamp);
                self.entity.position = from.position.lerp(to.position, alpha as f32);
            }
            // Past the newest sample: hold it rather than guess ahead.
            _ => self.entity.position = from.position,
        }
    }

    /// Shows the newest sample directly, for when interpolation is disabled.
    pub fn snap_to_latest(&mut self) {
        if let Some(&latest) = self.samples.back() {
            self.entity.position = latest.position;
            self.samples.clear();
            self.samples.push_back(latest);
        }
    }

    pub fn position(&self) -> Vec2 {
        self.entity.position
    }

    pub fn samples(&self) -> impl Iterator<Item = &PositionSample> {
        self.samples.iter()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}
