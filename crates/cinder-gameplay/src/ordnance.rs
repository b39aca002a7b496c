//! Secondary weapon payloads: grenades, mines, missiles, fire patches, and
//! the placement math for instant pulses, lasers and meteor drops.

use cinder_common::{EntityId, Rect};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::weapon::SecondaryWeapon;

/// Grenade fuse (ms).
pub const GRENADE_FUSE_MS: f64 = 1000.0;
/// Grenade throw speed (units/s).
pub const GRENADE_SPEED: f32 = 250.0;
/// Mine lifetime before it fizzles (ms).
pub const MINE_LIFETIME_MS: f64 = 10_000.0;
/// Extra reach of a mine's proximity trigger beyond the enemy radius.
pub const MINE_TRIGGER_RADIUS: f32 = 20.0;
/// Missile lifetime before it self-detonates (ms).
pub const MISSILE_LIFETIME_MS: f64 = 5000.0;
/// Missile speed (units/s).
pub const MISSILE_SPEED: f32 = 220.0;
/// Missile contact radius.
pub const MISSILE_CONTACT_RADIUS: f32 = 8.0;
/// Laser beam length.
pub const LASER_LENGTH: f32 = 400.0;
/// Meteors per barrage.
pub const METEOR_COUNT: u32 = 5;
/// Gap between meteor drops (ms).
pub const METEOR_STAGGER_MS: f64 = 500.0;
/// Maximum distance of an area blast from the player.
pub const AREA_BLAST_RANGE: f32 = 150.0;
/// Fire patch lifetime (ms).
pub const FIRE_PATCH_LIFETIME_MS: f64 = 2000.0;
/// Gap between fire patch damage ticks (ms).
pub const FIRE_TICK_MS: f64 = 500.0;

/// Kind of a physical ordnance entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdnanceKind {
    /// Thrown, explodes when its fuse runs out
    Grenade,
    /// Stationary, explodes when an enemy steps close
    Mine,
    /// Chases the nearest enemy, explodes on contact or timeout
    Missile,
}

impl OrdnanceKind {
    /// Secondary weapon that launches this ordnance.
    #[must_use]
    pub const fn weapon(self) -> SecondaryWeapon {
        match self {
            Self::Grenade => SecondaryWeapon::Grenade,
            Self::Mine => SecondaryWeapon::Mine,
            Self::Missile => SecondaryWeapon::Missile,
        }
    }

    /// Time from launch until the fuse or lifetime ends (ms).
    #[must_use]
    pub const fn lifetime_ms(self) -> f64 {
        match self {
            Self::Grenade => GRENADE_FUSE_MS,
            Self::Mine => MINE_LIFETIME_MS,
            Self::Missile => MISSILE_LIFETIME_MS,
        }
    }

    /// Whether running out of time ends in a blast (otherwise it fizzles).
    #[must_use]
    pub const fn explodes_on_timeout(self) -> bool {
        !matches!(self, Self::Mine)
    }
}

/// A grenade, mine or missile in flight or on the ground.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordnance {
    /// Entity ID
    pub id: EntityId,
    /// Kind
    pub kind: OrdnanceKind,
    /// World position
    pub position: Vec2,
    /// Velocity (units/s)
    pub velocity: Vec2,
    /// Where a grenade lands
    pub destination: Option<Vec2>,
    /// Blast damage
    pub damage: f32,
    /// Blast radius
    pub radius: f32,
    /// Launch time (ms)
    pub spawn_time: f64,
    spent: bool,
}

impl Ordnance {
    fn launch(id: EntityId, kind: OrdnanceKind, origin: Vec2, velocity: Vec2, base_damage: f32, now: f64) -> Self {
        let weapon = kind.weapon();
        Self {
            id,
            kind,
            position: origin,
            velocity,
            destination: None,
            damage: base_damage * weapon.damage_multiplier(),
            radius: weapon.radius(),
            spawn_time: now,
            spent: false,
        }
    }

    /// Grenade thrown from `origin` toward `target`.
    #[must_use]
    pub fn grenade(id: EntityId, origin: Vec2, target: Vec2, base_damage: f32, now: f64) -> Self {
        let velocity = (target - origin).normalize_or_zero() * GRENADE_SPEED;
        let mut grenade = Self::launch(id, OrdnanceKind::Grenade, origin, velocity, base_damage, now);
        grenade.destination = Some(target);
        grenade
    }

    /// Mine dropped at `origin`.
    #[must_use]
    pub fn mine(id: EntityId, origin: Vec2, base_damage: f32, now: f64) -> Self {
        Self::launch(id, OrdnanceKind::Mine, origin, Vec2::ZERO, base_damage, now)
    }

    /// Missile launched from `origin` toward `target`.
    #[must_use]
    pub fn missile(id: EntityId, origin: Vec2, target: Vec2, base_damage: f32, now: f64) -> Self {
        let velocity = (target - origin).normalize_or_zero() * MISSILE_SPEED;
        Self::launch(id, OrdnanceKind::Missile, origin, velocity, base_damage, now)
    }

    /// Whether it has exploded or fizzled.
    #[must_use]
    pub const fn is_spent(&self) -> bool {
        self.spent
    }

    /// Marks it spent. Returns `true` only on the first call.
    pub fn spend(&mut self) -> bool {
        let first = !self.spent;
        self.spent = true;
        self.velocity = Vec2::ZERO;
        first
    }

    /// Moves for `dt` seconds. Grenades stop on their destination.
    pub fn advance(&mut self, dt: f32) {
        let step = self.velocity * dt;
        if let Some(destination) = self.destination {
            let remaining = destination - self.position;
            if step.length_squared() >= remaining.length_squared() {
                self.position = destination;
                self.velocity = Vec2::ZERO;
                return;
            }
        }
        self.position += step;
    }

    /// Turns a missile toward a new target.
    pub fn retarget(&mut self, target: Vec2) {
        if self.kind == OrdnanceKind::Missile {
            let direction = (target - self.position).normalize_or_zero();
            if direction != Vec2::ZERO {
                self.velocity = direction * MISSILE_SPEED;
            }
        }
    }

    /// Whether an enemy at `position` sets this ordnance off.
    #[must_use]
    pub fn triggered_by(&self, position: Vec2, enemy_radius: f32) -> bool {
        let reach = match self.kind {
            OrdnanceKind::Grenade => return false,
            OrdnanceKind::Mine => MINE_TRIGGER_RADIUS,
            OrdnanceKind::Missile => MISSILE_CONTACT_RADIUS,
        };
        self.position.distance(position) <= reach + enemy_radius
    }
}

/// Burning ground left by the fire trail.
#[derive(Debug, Clone, PartialEq)]
pub struct FirePatch {
    /// Center
    pub position: Vec2,
    /// Radius
    pub radius: f32,
    /// Damage per tick
    pub damage: f32,
    /// When it burns out (ms)
    pub expires_at: f64,
    next_tick: f64,
}

impl FirePatch {
    /// New patch that deals its first tick right away.
    #[must_use]
    pub fn new(position: Vec2, base_damage: f32, now: f64) -> Self {
        Self {
            position,
            radius: SecondaryWeapon::FireTrail.radius(),
            damage: base_damage * SecondaryWeapon::FireTrail.damage_multiplier(),
            expires_at: now + FIRE_PATCH_LIFETIME_MS,
            next_tick: now,
        }
    }

    /// Whether it has burned out.
    #[must_use]
    pub fn is_expired(&self, now: f64) -> bool {
        now >= self.expires_at
    }

    /// Consumes a damage tick if one is due at `now`.
    pub fn take_tick(&mut self, now: f64) -> bool {
        if self.is_expired(now) || now < self.next_tick {
            return false;
        }
        self.next_tick = now + FIRE_TICK_MS;
        true
    }

    /// Whether a circle overlaps the patch.
    #[must_use]
    pub fn covers(&self, position: Vec2, radius: f32) -> bool {
        self.position.distance(position) <= self.radius + radius
    }
}

/// Random point within [`AREA_BLAST_RANGE`] of `center`.
#[must_use]
pub fn area_blast_point(center: Vec2, rng: &mut fastrand::Rng) -> Vec2 {
    let angle = rng.f32() * TAU;
    center + Vec2::from_angle(angle) * (rng.f32() * AREA_BLAST_RANGE)
}

/// Drop points spread evenly across the camera width at random heights.
#[must_use]
pub fn meteor_drop_points(camera: Rect, count: u32, rng: &mut fastrand::Rng) -> Vec<Vec2> {
    (0..count)
        .map(|k| {
            let x = camera.x + camera.width * (k as f32 + 0.5) / count as f32;
            let y = camera.y + rng.f32() * camera.height;
            Vec2::new(x, y)
        })
        .collect()
}

/// Distance from `point` to the segment `from..to`.
#[must_use]
pub fn distance_to_segment(point: Vec2, from: Vec2, to: Vec2) -> f32 {
    let segment = to - from;
    let len_sq = segment.length_squared();
    if len_sq <= f32::EPSILON {
        return point.distance(from);
    }
    let t = ((point - from).dot(segment) / len_sq).clamp(0.0, 1.0);
    point.distance(from + segment * t)
}

/// Whether a beam of `width` along `from..to` touches a circle.
#[must_use]
pub fn beam_hits(from: Vec2, to: Vec2, width: f32, position: Vec2, radius: f32) -> bool {
    distance_to_segment(position, from, to) <= width / 2.0 + radius
}
