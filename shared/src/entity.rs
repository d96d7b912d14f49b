//! Authoritative entity model shared by the server simulation and client prediction.
//!
//! Both sides move entities through the same [`apply`] rule. The client replays
//! historical inputs through it during reconciliation, so it must stay pure and
//! deterministic: same start position and same inputs, same result.

use crate::math::Vec2;
use crate::ENTITY_SPEED;

/// One discrete input sample captured by a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSnapshot {
    /// Strictly increasing per connection, starting at 1.
    pub sequence: u32,
    /// Seconds elapsed since the previous sample.
    pub elapsed: f32,
    /// Unit length, or zero for "no input".
    pub direction: Vec2,
}

impl InputSnapshot {
    pub fn new(sequence: u32, elapsed: f32, direction: Vec2) -> Self {
        Self {
            sequence,
            elapsed,
            direction,
        }
    }

    /// Returns true if the snapshot carries any movement.
    pub fn has_input(&self) -> bool {
        !self.direction.is_zero()
    }
}

/// Advances `position` by one input: `position + direction * speed * elapsed`.
///
/// No clamping and no collision.
pub fn apply(position: Vec2, input: &InputSnapshot) -> Vec2 {
    position + input.direction * (ENTITY_SPEED * input.elapsed)
}

/// An entity in the world. Only the position is synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Entity {
    pub position: Vec2,
}

impl Entity {
    pub fn new(position: Vec2) -> Self {
        Self { position }
    }

    /// Moves the entity by one input through [`apply`].
    pub fn update(&mut self, input: &InputSnapshot) {
        self.position = apply(self.position, input);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_entity_starts_at_origin() {
        let entity = Entity::default();
        assert_eq!(entity.position, Vec2::ZERO);
    }

    #[test]
    fn test_apply_moves_by_speed_times_elapsed() {
        let input = InputSnapshot::new(1, 0.5, Vec2::new(1.0, 0.0));
        let moved = apply(Vec2::new(10.0, 20.0), &input);
        assert_approx_eq!(moved.x, 10.0 + ENTITY_SPEED * 0.5);
        assert_approx_eq!(moved.y, 20.0);
    }

    #[test]
    fn test_apply_zero_direction_is_identity() {
        let input = InputSnapshot::new(1, 0.25, Vec2::ZERO);
        let start = Vec2::new(3.0, -4.0);
        assert_eq!(apply(start, &input), start);
        assert!(!input.has_input());
    }

    #[test]
    fn test_apply_is_deterministic() {
        let inputs: Vec<InputSnapshot> = (1..=50)
            .map(|seq| {
                let angle = seq as f32 * 0.37;
                InputSnapshot::new(seq, 1.0 / 60.0, Vec2::new(angle.cos(), angle.sin()))
            })
            .collect();

        let mut first = Entity::default();
        let mut second = Entity::default();
        for input in &inputs {
            first.update(input);
        }
        for input in &inputs {
            second.update(input);
        }

        assert_eq!(first.position.x.to_bits(), second.position.x.to_bits());
        assert_eq!(first.position.y.to_bits(), second.position.y.to_bits());
    }

    #[test]
    fn test_no_clamping_at_world_edges() {
        let mut entity = Entity::new(Vec2::new(-1000.0, 0.0));
        entity.update(&InputSnapshot::new(1, 1.0, Vec2::new(-1.0, 0.0)));
        assert_approx_eq!(entity.position.x, -1000.0 - ENTITY_SPEED);
    }
}
