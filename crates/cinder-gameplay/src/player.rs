//! The player as seen by the combat core: position, health and view bounds.
//!
//! Movement and input are driven from outside; the core only reads the
//! position and camera, and subtracts health when enemies land hits.

use cinder_common::Rect;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Default visible area around the player.
pub const DEFAULT_VIEW_SIZE: Vec2 = Vec2::new(800.0, 600.0);

/// Player state shared with the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    position: Vec2,
    health: f32,
    max_health: f32,
    /// Visible world area (meteor barrage placement)
    pub camera: Rect,
}

impl PlayerState {
    /// Creates a player at full health with the camera centered on it.
    #[must_use]
    pub fn new(position: Vec2, max_health: f32) -> Self {
        let max_health = max_health.max(1.0);
        Self {
            position,
            health: max_health,
            max_health,
            camera: Rect::centered(position, DEFAULT_VIEW_SIZE.x, DEFAULT_VIEW_SIZE.y),
        }
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Moves the player, dragging the camera along.
    pub fn set_position(&mut self, position: Vec2) {
        self.camera = Rect::centered(position, self.camera.width, self.camera.height);
        self.position = position;
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> f32 {
        self.health
    }

    /// Maximum health.
    #[must_use]
    pub const fn max_health(&self) -> f32 {
        self.max_health
    }

    /// Whether health is above zero.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Subtracts damage, clamped at zero. Returns the amount applied.
    pub fn apply_damage(&mut self, amount: f32) -> f32 {
        if !amount.is_finite() {
            return 0.0;
        }
        let before = self.health;
        self.health = (self.health - amount.max(0.0)).max(0.0);
        before - self.health
    }

    /// Restores health up to the maximum.
    pub fn heal(&mut self, amount: f32) {
        if amount.is_finite() {
            self.health = (self.health + amount.max(0.0)).min(self.max_health);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_clamps_at_zero() {
        let mut player = PlayerState::new(Vec2::ZERO, 50.0);
        assert_eq!(player.apply_damage(30.0), 30.0);
        assert_eq!(player.apply_damage(30.0), 20.0);
        assert_eq!(player.health(), 0.0);
        assert!(!player.is_alive());
        player.heal(500.0);
        assert_eq!(player.health(), 50.0);
    }

    #[test]
    fn test_camera_follows_position() {
        let mut player = PlayerState::new(Vec2::ZERO, 100.0);
        player.set_position(Vec2::new(1000.0, 0.0));
        assert!(player.camera.contains(Vec2::new(1000.0, 0.0)));
        assert!(!player.camera.contains(Vec2::ZERO));
    }
}
