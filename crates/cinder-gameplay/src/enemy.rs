//! Enemy data: archetype templates, personality profiles and per-instance state.

use ahash::AHashMap;
use cinder_common::{CinderError, CinderResult, EntityId, TileCoord};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while creating an enemy.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpawnError {
    /// Archetype name not recognized
    #[error("unknown archetype: {0}")]
    UnknownArchetype(String),
    /// Stat table has no entry for the archetype
    #[error("no stat entry for archetype {0}")]
    MissingStats(Archetype),
    /// Stat entry exists but is unusable
    #[error("malformed stats for {archetype}: {reason}")]
    MalformedStats {
        /// Archetype
        archetype: Archetype,
        /// What is wrong
        reason: String,
    },
    /// Spawn tile is outside the grid or on a wall
    #[error("cannot spawn at ({}, {})", .0.x, .0.y)]
    InvalidTile(TileCoord),
    /// Stat payload could not be parsed
    #[error("malformed enemy payload: {0}")]
    Payload(String),
}

/// Result type for spawn operations.
pub type SpawnResult<T> = Result<T, SpawnError>;

impl From<SpawnError> for CinderError {
    fn from(e: SpawnError) -> Self {
        Self::Spawn(e.to_string())
    }
}

/// Enemy base template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    /// Baseline melee enemy
    Normal,
    /// Quick flanker
    Fast,
    /// Slow, hard-hitting brute
    Heavy,
    /// Erratic mover
    Random,
    /// Ranged shooter
    Marksman,
    /// Room boss
    Boss,
}

impl Archetype {
    /// All archetypes.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::Normal,
            Self::Fast,
            Self::Heavy,
            Self::Random,
            Self::Marksman,
            Self::Boss,
        ]
    }

    /// Lowercase name used in data files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fast => "fast",
            Self::Heavy => "heavy",
            Self::Random => "random",
            Self::Marksman => "marksman",
            Self::Boss => "boss",
        }
    }

    /// Built-in stat template.
    #[must_use]
    pub const fn default_stats(self) -> ArchetypeStats {
        let base = ArchetypeStats {
            health: 30.0,
            speed: 60.0,
            attack_range: 40.0,
            attack_cooldown_ms: 1000.0,
            damage: 5.0,
            ranged: false,
            fov_range: 250.0,
            fov_angle_deg: 120.0,
            xp: 10,
        };
        match self {
            Self::Normal => base,
            Self::Fast => ArchetypeStats {
                health: 20.0,
                speed: 100.0,
                attack_range: 35.0,
                attack_cooldown_ms: 800.0,
                damage: 4.0,
                xp: 15,
                ..base
            },
            Self::Heavy => ArchetypeStats {
                health: 80.0,
                speed: 40.0,
                attack_range: 45.0,
                attack_cooldown_ms: 1500.0,
                damage: 12.0,
                xp: 25,
                ..base
            },
            Self::Random => ArchetypeStats {
                health: 25.0,
                speed: 70.0,
                xp: 12,
                ..base
            },
            Self::Marksman => ArchetypeStats {
                health: 25.0,
                speed: 50.0,
                attack_range: 250.0,
                attack_cooldown_ms: 1500.0,
                damage: 8.0,
                ranged: true,
                fov_range: 350.0,
                xp: 20,
                ..base
            },
            Self::Boss => ArchetypeStats {
                health: 150.0,
                speed: 50.0,
                attack_range: 60.0,
                attack_cooldown_ms: 1200.0,
                damage: 20.0,
                fov_range: 400.0,
                xp: 100,
                ..base
            },
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Archetype {
    type Err = SpawnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SpawnError::UnknownArchetype(s.to_string()))
    }
}

/// Base stats for an archetype, before personality scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeStats {
    /// Starting and maximum health
    pub health: f32,
    /// Movement speed (units/s)
    pub speed: f32,
    /// Attack reach
    pub attack_range: f32,
    /// Time between attacks (ms)
    pub attack_cooldown_ms: f64,
    /// Damage per attack
    pub damage: f32,
    /// Shoots bullets instead of striking
    pub ranged: bool,
    /// Sight distance
    pub fov_range: f32,
    /// Full cone angle in degrees
    pub fov_angle_deg: f32,
    /// Experience granted on death
    pub xp: u32,
}

impl ArchetypeStats {
    fn check(&self, archetype: Archetype) -> SpawnResult<()> {
        let numbers = [
            self.health,
            self.speed,
            self.attack_range,
            self.damage,
            self.fov_range,
            self.fov_angle_deg,
        ];
        let reason = if numbers.iter().any(|v| !v.is_finite()) || !self.attack_cooldown_ms.is_finite() {
            Some("non-finite value")
        } else if self.health <= 0.0 {
            Some("health must be positive")
        } else if numbers.iter().any(|&v| v < 0.0) || self.attack_cooldown_ms < 0.0 {
            Some("negative value")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(SpawnError::MalformedStats {
                archetype,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Lookup table from archetype to base stats.
#[derive(Debug, Clone)]
pub struct ArchetypeTable {
    entries: AHashMap<Archetype, ArchetypeStats>,
}

impl Default for ArchetypeTable {
    fn default() -> Self {
        Self {
            entries: Archetype::all()
                .into_iter()
                .map(|a| (a, a.default_stats()))
                .collect(),
        }
    }
}

impl ArchetypeTable {
    /// Table with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }

    /// Parses a JSON object keyed by archetype name.
    ///
    /// Entries not present in the payload stay missing; spawning them fails.
    pub fn from_json(json: &str) -> SpawnResult<Self> {
        let raw: AHashMap<String, ArchetypeStats> =
            serde_json::from_str(json).map_err(|e| SpawnError::Payload(e.to_string()))?;
        let mut table = Self::empty();
        for (name, stats) in raw {
            let archetype = name.parse()?;
            stats.check(archetype)?;
            table.entries.insert(archetype, stats);
        }
        Ok(table)
    }

    /// Reads a JSON stat table from disk.
    pub fn load_from<P: AsRef<Path>>(path: P) -> CinderResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, archetype: Archetype, stats: ArchetypeStats) {
        self.entries.insert(archetype, stats);
    }

    /// Validated stats for an archetype.
    pub fn get(&self, archetype: Archetype) -> SpawnResult<ArchetypeStats> {
        let stats = self
            .entries
            .get(&archetype)
            .copied()
            .ok_or(SpawnError::MissingStats(archetype))?;
        stats.check(archetype)?;
        Ok(stats)
    }
}

/// Per-instance temperament rolled at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    /// Pushes hard, gives up late
    Aggressive,
    /// Keeps distance, flees early
    Cautious,
    /// Hits hard, ignores danger
    Reckless,
}

impl Personality {
    /// All personalities.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Aggressive, Self::Cautious, Self::Reckless]
    }

    /// Multiplier and threshold profile.
    #[must_use]
    pub const fn profile(self) -> PersonalityProfile {
        match self {
            Self::Aggressive => PersonalityProfile {
                speed: 1.1,
                damage: 1.2,
                attack_range: 1.0,
                attack_cooldown: 0.9,
                disengage_distance: 500.0,
                flee_health: 5.0,
                recover_health: 10.0,
                approach_speed: 0.5,
                flee_stride: 1.0,
            },
            Self::Cautious => PersonalityProfile {
                speed: 0.9,
                damage: 0.9,
                attack_range: 1.1,
                attack_cooldown: 1.2,
                disengage_distance: 350.0,
                flee_health: 15.0,
                recover_health: 20.0,
                approach_speed: 0.3,
                flee_stride: 1.5,
            },
            Self::Reckless => PersonalityProfile {
                speed: 1.2,
                damage: 1.3,
                attack_range: 0.9,
                attack_cooldown: 0.8,
                disengage_distance: 400.0,
                flee_health: 5.0,
                recover_health: 10.0,
                approach_speed: 0.5,
                flee_stride: 1.0,
            },
        }
    }
}

/// Declarative personality coefficients, applied once at spawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonalityProfile {
    /// Movement speed multiplier
    pub speed: f32,
    /// Damage multiplier
    pub damage: f32,
    /// Attack range multiplier
    pub attack_range: f32,
    /// Attack cooldown multiplier
    pub attack_cooldown: f64,
    /// Chase is abandoned beyond this distance when the player is unseen
    pub disengage_distance: f32,
    /// Attack turns to flee below this health
    pub flee_health: f32,
    /// Flee turns back to chase above this health
    pub recover_health: f32,
    /// Speed factor when closing in during an attack
    pub approach_speed: f32,
    /// Extra stride factor while fleeing
    pub flee_stride: f32,
}

/// Behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyState {
    /// Wandering, player unseen
    Patrol,
    /// Moving toward the player
    Chase,
    /// In range and attacking
    Attack,
    /// Running away to recover
    Flee,
}

/// How an enemy moves between decision ticks.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Locomotion {
    /// Standing still
    #[default]
    Idle,
    /// Fixed unit direction
    Heading(Vec2),
    /// Straight to a point, then idle
    Toward(Vec2),
    /// Along tile waypoints, head first
    FollowPath(VecDeque<TileCoord>),
}

/// One spawned hostile actor.
#[derive(Debug, Clone)]
pub struct Enemy {
    /// Entity ID
    pub id: EntityId,
    /// Base template
    pub archetype: Archetype,
    /// Rolled temperament
    pub personality: Personality,
    /// Behavior state
    pub state: EnemyState,
    /// World position
    pub position: Vec2,
    /// World velocity (units/s)
    pub velocity: Vec2,
    health: f32,
    max_health: f32,
    /// Personality-scaled movement speed
    pub speed: f32,
    /// Personality-scaled attack reach
    pub attack_range: f32,
    /// Personality-scaled cooldown (ms)
    pub attack_cooldown_ms: f64,
    /// Personality-scaled damage
    pub damage: f32,
    /// Shoots instead of striking
    pub ranged: bool,
    /// Sight distance
    pub fov_range: f32,
    /// Full cone angle in radians
    pub fov_angle: f32,
    /// Experience granted on death
    pub xp_reward: u32,
    alive: bool,
    /// Last attack time (ms)
    pub last_attack: f64,
    /// Last time the enemy was moving (ms)
    pub last_move: f64,
    /// Last flank pick (ms)
    pub last_flank: f64,
    /// Last random walk or random destination pick (ms)
    pub last_random_move: f64,
    /// Last idle cue (ms)
    pub last_idle_cue: f64,
    /// Per-enemy idle cue interval (ms)
    pub idle_cue_interval: f64,
    /// Last time damage landed (ms)
    pub last_damage: Option<f64>,
    /// Slowed until this time (ms)
    pub slowed_until: f64,
    /// Current movement intent
    pub locomotion: Locomotion,
    /// Unslowed speed chosen by the last decision
    pub move_speed: f32,
}

impl Enemy {
    /// Creates an enemy, scaling stats by personality once.
    #[must_use]
    pub fn new(
        id: EntityId,
        archetype: Archetype,
        stats: ArchetypeStats,
        personality: Personality,
        position: Vec2,
        now: f64,
    ) -> Self {
        let profile = personality.profile();
        Self {
            id,
            archetype,
            personality,
            state: EnemyState::Patrol,
            position,
            velocity: Vec2::ZERO,
            health: stats.health,
            max_health: stats.health,
            speed: stats.speed * profile.speed,
            attack_range: stats.attack_range * profile.attack_range,
            attack_cooldown_ms: stats.attack_cooldown_ms * profile.attack_cooldown,
            damage: stats.damage * profile.damage,
            ranged: stats.ranged,
            fov_range: stats.fov_range,
            fov_angle: stats.fov_angle_deg.to_radians(),
            xp_reward: stats.xp,
            alive: true,
            last_attack: now,
            last_move: now,
            last_flank: now,
            last_random_move: now,
            last_idle_cue: now,
            idle_cue_interval: 3000.0,
            last_damage: None,
            slowed_until: now,
            locomotion: Locomotion::Idle,
            move_speed: 0.0,
        }
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

    /// Health as a fraction of maximum, for health bars.
    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            self.health / self.max_health
        }
    }

    /// Whether the health bar should be drawn at `now`.
    #[must_use]
    pub fn health_bar_visible(&self, now: f64, visible_ms: f64) -> bool {
        self.alive && self.last_damage.is_some_and(|t| now - t <= visible_ms)
    }

    /// Whether the enemy has not been destroyed.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Personality coefficients.
    #[must_use]
    pub const fn profile(&self) -> PersonalityProfile {
        self.personality.profile()
    }

    /// Subtracts damage, clamped to `[0, max]`. Returns the amount applied.
    pub fn apply_damage(&mut self, amount: f32, now: f64) -> f32 {
        if !self.alive || !amount.is_finite() {
            return 0.0;
        }
        let before = self.health;
        self.health = (self.health - amount.max(0.0)).clamp(0.0, self.max_health);
        self.last_damage = Some(now);
        before - self.health
    }

    /// Restores health up to the maximum.
    pub fn heal(&mut self, amount: f32) {
        if self.alive && amount.is_finite() {
            self.health = (self.health + amount.max(0.0)).min(self.max_health);
        }
    }

    /// Marks the enemy destroyed. Returns `true` only on the first call.
    pub fn mark_destroyed(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        self.alive = false;
        self.velocity = Vec2::ZERO;
        self.locomotion = Locomotion::Idle;
        true
    }

    /// Multiplier from temporary slows at `now`.
    #[must_use]
    pub fn slow_multiplier(&self, now: f64, slow_factor: f32) -> f32 {
        if now < self.slowed_until {
            slow_factor
        } else {
            1.0
        }
    }

    /// Cached waypoints, if the enemy is following a path.
    #[must_use]
    pub fn path(&self) -> Option<&VecDeque<TileCoord>> {
        match &self.locomotion {
            Locomotion::FollowPath(path) => Some(path),
            _ => None,
        }
    }

    /// Stops moving and drops any cached path.
    pub fn halt(&mut self) {
        self.locomotion = Locomotion::Idle;
        self.velocity = Vec2::ZERO;
    }

    /// Distance to a point.
    #[must_use]
    pub fn distance_to(&self, point: Vec2) -> f32 {
        self.position.distance(point)
    }
}
