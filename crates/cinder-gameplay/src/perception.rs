//! Enemy sight: range, view cone and line of sight against walls.

use cinder_common::IsoProjection;
use glam::Vec2;
use std::f32::consts::{PI, TAU};

use crate::enemy::Enemy;
use crate::grid::DungeonGrid;

const MIN_DISTANCE: f32 = 1e-3;
const MIN_SPEED_SQ: f32 = 1e-6;

/// Signed angular difference wrapped into `[-PI, PI]`.
#[must_use]
pub fn angle_difference(a: f32, b: f32) -> f32 {
    (a - b + PI).rem_euclid(TAU) - PI
}

/// Angle of the vector from `from` to `to`, or `None` when they coincide.
#[must_use]
pub fn angle_between(from: Vec2, to: Vec2) -> Option<f32> {
    let delta = to - from;
    (delta.length_squared() > MIN_DISTANCE * MIN_DISTANCE).then(|| delta.y.atan2(delta.x))
}

/// Step-sampled line of sight. Any wall (or off-grid) tile strictly between
/// the endpoints blocks sight.
#[must_use]
pub fn has_line_of_sight(grid: &DungeonGrid, projection: &IsoProjection, from: Vec2, to: Vec2) -> bool {
    let distance = from.distance(to);
    if distance < MIN_DISTANCE {
        return true;
    }
    let steps = (distance / projection.sample_step()).ceil() as usize;
    (1..steps).all(|i| {
        let point = from.lerp(to, i as f32 / steps as f32);
        grid.is_passable(projection.world_to_tile(point))
    })
}

/// Whether an enemy can currently see the player.
///
/// A moving enemy looks along its velocity; a stationary one looks toward the
/// player, so only range and walls can hide the player from it.
#[must_use]
pub fn is_visible(enemy: &Enemy, player: Vec2, grid: &DungeonGrid, projection: &IsoProjection) -> bool {
    let distance = enemy.position.distance(player);
    if distance > enemy.fov_range {
        return false;
    }
    let to_player = match angle_between(enemy.position, player) {
        Some(angle) => angle,
        None => return true,
    };
    let facing = if enemy.velocity.length_squared() > MIN_SPEED_SQ {
        enemy.velocity.y.atan2(enemy.velocity.x)
    } else {
        to_player
    };
    if angle_difference(to_player, facing).abs() > enemy.fov_angle / 2.0 {
        return false;
    }
    has_line_of_sight(grid, projection, enemy.position, player)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enemy::{Archetype, Personality};
    use cinder_common::{EntityId, TileCoord};

    fn setup(lines: &[&str]) -> (DungeonGrid, IsoProjection) {
        (DungeonGrid::from_ascii(lines).unwrap(), IsoProjection::default())
    }

    fn enemy_at(proj: &IsoProjection, tile: TileCoord) -> Enemy {
        Enemy::new(
            EntityId::from_raw(1),
            Archetype::Normal,
            Archetype::Normal.default_stats(),
            Personality::Aggressive,
            proj.tile_to_world(tile),
            0.0,
        )
    }

    #[test]
    fn test_angle_difference_wraps() {
        assert!((angle_difference(PI - 0.1, -PI + 0.1) + 0.2).abs() < 1e-5);
        assert!(angle_difference(0.5, 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_stationary_enemy_sees_player_in_range() {
        let (grid, proj) = setup(&[".......", ".......", "......."]);
        let enemy = enemy_at(&proj, TileCoord::new(0, 1));
        assert!(is_visible(&enemy, proj.tile_to_world(TileCoord::new(4, 1)), &grid, &proj));
    }

    #[test]
    fn test_out_of_range_fails_closed() {
        let (grid, proj) = setup(&["......................"]);
        let mut enemy = enemy_at(&proj, TileCoord::new(0, 0));
        enemy.fov_range = 50.0;
        assert!(!is_visible(&enemy, proj.tile_to_world(TileCoord::new(10, 0)), &grid, &proj));
    }

    #[test]
    fn test_wall_blocks_sight() {
        let (grid, proj) = setup(&["...#..."]);
        let enemy = enemy_at(&proj, TileCoord::new(0, 0));
        assert!(!is_visible(&enemy, proj.tile_to_world(TileCoord::new(6, 0)), &grid, &proj));
    }

    #[test]
    fn test_player_behind_moving_enemy_is_unseen() {
        let (grid, proj) = setup(&[".......", ".......", "......."]);
        let mut enemy = enemy_at(&proj, TileCoord::new(3, 1));
        let player = proj.tile_to_world(TileCoord::new(6, 1));
        enemy.velocity = (enemy.position - player).normalize() * 50.0;
        assert!(!is_visible(&enemy, player, &grid, &proj));

        enemy.velocity = (player - enemy.position).normalize() * 50.0;
        assert!(is_visible(&enemy, player, &grid, &proj));
    }

    #[test]
    fn test_zero_distance_is_visible_without_nan() {
        let (grid, proj) = setup(&["..."]);
        let enemy = enemy_at(&proj, TileCoord::new(1, 0));
        assert!(is_visible(&enemy, enemy.position, &grid, &proj));
        assert!(angle_between(enemy.position, enemy.position).is_none());
    }
}
