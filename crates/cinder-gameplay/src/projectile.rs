//! Projectiles: travel, expiry, wall bounces and steering.
//!
//! Collision with enemies and the player is resolved by the combat resolver;
//! this module only owns a shot's own state.

use cinder_common::{EntityId, IsoProjection, TileCoord};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::events::ProjectileEnd;
use crate::grid::DungeonGrid;

/// Which side fired a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileOwner {
    /// The player's weapon (or a hazard it spawned)
    Player,
    /// An enemy's ranged attack
    Enemy(EntityId),
}

/// Optional per-shot behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectileTags {
    /// Steers toward the nearest enemy
    pub homing: bool,
    /// Slows enemies it hits
    pub slow_on_hit: bool,
    /// Oversized variant
    pub large: bool,
}

/// One fired shot.
#[derive(Debug, Clone)]
pub struct Projectile {
    /// Entity ID
    pub id: EntityId,
    /// Side that fired it
    pub owner: ProjectileOwner,
    /// World position
    pub position: Vec2,
    /// Velocity (units/s)
    pub velocity: Vec2,
    /// Where it was fired from
    pub spawn_position: Vec2,
    /// When it was fired (ms)
    pub spawn_time: f64,
    /// Damage per hit
    pub damage: f32,
    /// Remaining enemies it may pass through
    pub pierce: u32,
    /// Remaining wall bounces
    pub bounce: u32,
    /// Chance to explode when spent on an enemy
    pub explosion_chance: f32,
    /// Always explodes when spent on an enemy
    pub explosive: bool,
    /// Blast radius when it explodes
    pub explosion_radius: f32,
    /// Remaining chain shots
    pub chain_shot: u32,
    /// Collision radius
    pub radius: f32,
    /// Behavior tags
    pub tags: ProjectileTags,
    hit_enemies: Vec<EntityId>,
    end: Option<ProjectileEnd>,
}

impl Projectile {
    /// Creates a projectile with no modifiers.
    #[must_use]
    pub fn new(
        id: EntityId,
        owner: ProjectileOwner,
        position: Vec2,
        velocity: Vec2,
        damage: f32,
        now: f64,
    ) -> Self {
        Self {
            id,
            owner,
            position,
            velocity,
            spawn_position: position,
            spawn_time: now,
            damage,
            pierce: 0,
            bounce: 0,
            explosion_chance: 0.0,
            explosive: false,
            explosion_radius: 0.0,
            chain_shot: 0,
            radius: 6.0,
            tags: ProjectileTags::default(),
            hit_enemies: Vec::new(),
            end: None,
        }
    }

    /// Whether the player fired it.
    #[must_use]
    pub const fn is_player_owned(&self) -> bool {
        matches!(self.owner, ProjectileOwner::Player)
    }

    /// Whether it has been destroyed.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.end.is_some()
    }

    /// Why it was destroyed.
    #[must_use]
    pub const fn end_reason(&self) -> Option<ProjectileEnd> {
        self.end
    }

    /// Marks the projectile destroyed. Returns `true` only on the first call.
    pub fn destroy(&mut self, reason: ProjectileEnd) -> bool {
        if self.end.is_some() {
            return false;
        }
        self.end = Some(reason);
        self.velocity = Vec2::ZERO;
        true
    }

    /// Current speed.
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Moves along the velocity for `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }

    /// Reason to retire the projectile at `now`, if its time or distance box ran out.
    #[must_use]
    pub fn expiry(&self, now: f64, lifetime_ms: f64, max_distance: f32) -> Option<ProjectileEnd> {
        if now - self.spawn_time >= lifetime_ms {
            Some(ProjectileEnd::Expired)
        } else if self.position.distance(self.spawn_position) > max_distance {
            Some(ProjectileEnd::OutOfRange)
        } else {
            None
        }
    }

    /// Whether this projectile already hit `enemy`.
    #[must_use]
    pub fn has_hit(&self, enemy: EntityId) -> bool {
        self.hit_enemies.contains(&enemy)
    }

    /// Remembers a hit so piercing shots never hit the same enemy twice.
    pub fn record_hit(&mut self, enemy: EntityId) {
        if !self.has_hit(enemy) {
            self.hit_enemies.push(enemy);
        }
    }

    /// Reflects the velocity about a unit wall normal.
    pub fn reflect(&mut self, normal: Vec2) {
        self.velocity -= 2.0 * self.velocity.dot(normal) * normal;
    }

    /// Consumes a bounce charge and reflects. Returns `false` when none remain.
    pub fn try_bounce(&mut self, normal: Vec2) -> bool {
        if self.bounce == 0 {
            return false;
        }
        self.bounce -= 1;
        self.reflect(normal);
        true
    }

    /// Points the velocity straight at `target`, keeping speed.
    pub fn redirect_toward(&mut self, target: Vec2) {
        let direction = (target - self.position).normalize_or_zero();
        if direction != Vec2::ZERO {
            self.velocity = direction * self.speed();
        }
    }

    /// Blends the velocity toward `target` by `turn_rate`, keeping speed.
    pub fn steer_toward(&mut self, target: Vec2, turn_rate: f32) {
        let speed = self.speed();
        let desired = (target - self.position).normalize_or_zero() * speed;
        if desired == Vec2::ZERO {
            return;
        }
        let blended = self.velocity.lerp(desired, turn_rate.clamp(0.0, 1.0));
        self.velocity = if blended.length_squared() > f32::EPSILON {
            blended.normalize() * speed
        } else {
            desired
        };
    }
}

/// Wall normal for a move from `from` to `to`, or `None` when `to` is open.
///
/// The crossed tile edges decide the normal: an edge crossed along tile `x`
/// whose neighbor is blocked contributes a tile-space `x` normal, likewise
/// for `y`. Corners contribute both. The result is in world space.
#[must_use]
pub fn wall_contact(grid: &DungeonGrid, projection: &IsoProjection, from: Vec2, to: Vec2) -> Option<Vec2> {
    if grid.is_passable(projection.world_to_tile(to)) {
        return None;
    }
    let start = projection.world_to_fractional(from);
    let end = projection.world_to_fractional(to);
    let start_tile = TileCoord::new(start.x.floor() as i32, start.y.floor() as i32);
    let end_tile = TileCoord::new(end.x.floor() as i32, end.y.floor() as i32);

    let mut tile_normal = Vec2::ZERO;
    if end_tile.x != start_tile.x && !grid.is_passable(TileCoord::new(end_tile.x, start_tile.y)) {
        tile_normal.x = -(end.x - start.x).signum();
    }
    if end_tile.y != start_tile.y && !grid.is_passable(TileCoord::new(start_tile.x, end_tile.y)) {
        tile_normal.y = -(end.y - start.y).signum();
    }
    if tile_normal == Vec2::ZERO {
        // Diagonal entry into a corner: both edges face the shot.
        tile_normal = Vec2::new(
            -(end.x - start.x).signum() * f32::from(end_tile.x != start_tile.x),
            -(end.y - start.y).signum() * f32::from(end_tile.y != start_tile.y),
        );
    }

    let normal = projection.edge_normal(tile_normal);
    if normal == Vec2::ZERO {
        Some(-(to - from).normalize_or_zero())
    } else {
        Some(normal)
    }
}
