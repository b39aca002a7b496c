//! Player weapon stats and skill application.
//!
//! Numeric stats accumulate additively or multiplicatively as skills are
//! picked up. Secondary weapons (grenades, mines, lasers, ...) and projectile
//! behaviors are kept as small tagged collections instead of one boolean per
//! feature; enabling one twice only refreshes its interval.

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Lowest shoot cooldown reachable through skills (ms).
pub const MIN_SHOOT_COOLDOWN_MS: f64 = 50.0;

/// Roll chance for slow-on-hit per shot.
pub const SLOW_ON_HIT_CHANCE: f32 = 0.10;
/// Roll chance for a cloned offset shot.
pub const CLONE_SHOT_CHANCE: f32 = 0.15;
/// Roll chance for a large projectile.
pub const LARGE_PROJECTILE_CHANCE: f32 = 0.20;

/// How a volley is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FirePattern {
    /// Fan centered on the aim angle
    #[default]
    Spread,
    /// Evenly spaced around a full circle
    Circular,
}

/// Per-projectile behavior toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectileBehavior {
    /// Steers toward the nearest enemy
    Homing,
    /// Chance to slow enemies on hit
    SlowOnHit,
    /// Chance to fire an offset twin
    CloneShot,
    /// Chance to fire an oversized explosive shot
    Large,
}

/// Secondary weapons fired from the main fire call on their own intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecondaryWeapon {
    /// Delayed-fuse explosive
    Grenade,
    /// Stationary proximity explosive
    Mine,
    /// Guided explosive
    Missile,
    /// Blast on an enemy from above
    SkyExplosion,
    /// Blast at a random spot near the player
    AreaExplosion,
    /// Pulse centered on the player
    EnergyExplosion,
    /// Instant beam
    Laser,
    /// Staggered meteor drops across the view
    MeteorBarrage,
    /// Burning patches left behind
    FireTrail,
}

impl SecondaryWeapon {
    /// Interval used when a skill doesn't specify one (ms).
    #[must_use]
    pub const fn default_interval_ms(self) -> f64 {
        match self {
            Self::Grenade => 3000.0,
            Self::Mine => 5000.0,
            Self::Missile => 4000.0,
            Self::SkyExplosion => 6000.0,
            Self::AreaExplosion => 5000.0,
            Self::EnergyExplosion => 7000.0,
            Self::Laser => 2500.0,
            Self::MeteorBarrage => 10_000.0,
            Self::FireTrail => 300.0,
        }
    }

    /// Damage multiplier over the current shot damage.
    #[must_use]
    pub const fn damage_multiplier(self) -> f32 {
        match self {
            Self::Grenade | Self::Laser | Self::MeteorBarrage | Self::EnergyExplosion => 2.0,
            Self::Mine | Self::AreaExplosion => 1.5,
            Self::Missile => 3.0,
            Self::SkyExplosion => 2.5,
            Self::FireTrail => 0.5,
        }
    }

    /// Blast radius.
    #[must_use]
    pub const fn radius(self) -> f32 {
        match self {
            Self::Grenade => 80.0,
            Self::Mine => 60.0,
            Self::Missile => 70.0,
            Self::SkyExplosion => 90.0,
            Self::AreaExplosion => 100.0,
            Self::EnergyExplosion => 120.0,
            Self::Laser => 15.0,
            Self::MeteorBarrage => 70.0,
            Self::FireTrail => 30.0,
        }
    }
}

/// A secondary weapon with its own cooldown state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveModifier {
    /// Which weapon
    pub kind: SecondaryWeapon,
    /// Interval between uses (ms)
    pub interval_ms: f64,
    /// Last use (ms)
    pub last_fired: f64,
}

impl ActiveModifier {
    /// Creates a modifier that is due immediately.
    #[must_use]
    pub const fn new(kind: SecondaryWeapon, interval_ms: f64) -> Self {
        Self {
            kind,
            interval_ms,
            last_fired: f64::NEG_INFINITY,
        }
    }

    /// Whether the interval has elapsed at `now`.
    #[must_use]
    pub fn is_due(&self, now: f64) -> bool {
        now - self.last_fired >= self.interval_ms
    }
}

/// Starting template a weapon is built from and respecs back to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponBase {
    /// Damage per shot
    pub damage: f32,
    /// Time between shots (ms)
    pub shoot_cooldown_ms: f64,
    /// Projectile speed (units/s)
    pub projectile_speed: f32,
    /// Critical chance
    pub crit_chance: f32,
    /// Critical damage multiplier
    pub crit_multiplier: f32,
}

impl Default for WeaponBase {
    fn default() -> Self {
        Self {
            damage: 10.0,
            shoot_cooldown_ms: 400.0,
            projectile_speed: 300.0,
            crit_chance: 0.05,
            crit_multiplier: 1.5,
        }
    }
}

/// Accumulated weapon stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponStats {
    base: WeaponBase,
    /// Damage per shot before the boost
    pub damage: f32,
    /// Time between shots (ms)
    pub shoot_cooldown_ms: f64,
    /// Projectile speed (units/s)
    pub projectile_speed: f32,
    /// Enemies a shot passes through
    pub pierce: u32,
    /// Shots per volley
    pub projectile_count: u32,
    /// Wall bounces per shot
    pub bounce: u32,
    /// Chance a shot is explosive
    pub explosion_chance: f32,
    /// Chance a kill sets off a chain blast
    pub chain_explosion_chance: f32,
    /// Blast radius on critical hits (0 = off)
    pub explosion_on_critical: f32,
    /// Staggered blasts on each kill
    pub multi_explosion_count: u32,
    /// Chance a spent shot redirects at an enemy instead of dying on a wall
    pub redirect_chance: f32,
    /// Guaranteed explosive shots per volley
    pub explosive_projectiles: u32,
    /// Retargeted follow-up shots on kills
    pub chain_shot_count: u32,
    /// Fractional damage bonus
    pub damage_boost: f32,
    /// Fractional extra damage the player takes
    pub defense_penalty: f32,
    /// Chance to reflect enemy bullets
    pub deflect_chance: f32,
    /// Critical chance
    pub crit_chance: f32,
    /// Critical damage multiplier
    pub crit_multiplier: f32,
    /// Volley layout
    pub fire_pattern: FirePattern,
    behaviors: Vec<ProjectileBehavior>,
    modifiers: Vec<ActiveModifier>,
}

impl Default for WeaponStats {
    fn default() -> Self {
        Self::new(WeaponBase::default())
    }
}

impl WeaponStats {
    /// Fresh stats from a template.
    #[must_use]
    pub fn new(base: WeaponBase) -> Self {
        Self {
            base,
            damage: base.damage,
            shoot_cooldown_ms: base.shoot_cooldown_ms,
            projectile_speed: base.projectile_speed,
            pierce: 0,
            projectile_count: 1,
            bounce: 0,
            explosion_chance: 0.0,
            chain_explosion_chance: 0.0,
            explosion_on_critical: 0.0,
            multi_explosion_count: 0,
            redirect_chance: 0.0,
            explosive_projectiles: 0,
            chain_shot_count: 0,
            damage_boost: 0.0,
            defense_penalty: 0.0,
            deflect_chance: 0.0,
            crit_chance: base.crit_chance,
            crit_multiplier: base.crit_multiplier,
            fire_pattern: FirePattern::Spread,
            behaviors: Vec::new(),
            modifiers: Vec::new(),
        }
    }

    /// Damage a shot carries: `damage * (1 + damage_boost)`.
    #[must_use]
    pub fn effective_damage(&self) -> f32 {
        self.damage * (1.0 + self.damage_boost)
    }

    /// Resets every stat and modifier to the template.
    pub fn respec(&mut self) {
        *self = Self::new(self.base);
        info!("weapon respec");
    }

    /// Whether a projectile behavior is enabled.
    #[must_use]
    pub fn has_behavior(&self, behavior: ProjectileBehavior) -> bool {
        self.behaviors.contains(&behavior)
    }

    /// Enables a projectile behavior. Idempotent.
    pub fn enable_behavior(&mut self, behavior: ProjectileBehavior) {
        if !self.has_behavior(behavior) {
            self.behaviors.push(behavior);
        }
    }

    /// Enabled projectile behaviors.
    #[must_use]
    pub fn behaviors(&self) -> &[ProjectileBehavior] {
        &self.behaviors
    }

    /// Enables a secondary weapon, or overwrites its interval if already on.
    pub fn enable_modifier(&mut self, kind: SecondaryWeapon, interval_ms: f64) {
        let interval_ms = interval_ms.max(1.0);
        match self.modifiers.iter_mut().find(|m| m.kind == kind) {
            Some(existing) => existing.interval_ms = interval_ms,
            None => self.modifiers.push(ActiveModifier::new(kind, interval_ms)),
        }
    }

    /// Looks up an active secondary weapon.
    #[must_use]
    pub fn modifier(&self, kind: SecondaryWeapon) -> Option<&ActiveModifier> {
        self.modifiers.iter().find(|m| m.kind == kind)
    }

    /// Active secondary weapons in enable order.
    #[must_use]
    pub fn modifiers(&self) -> &[ActiveModifier] {
        &self.modifiers
    }

    /// Returns the secondary weapons due at `now` and restarts their cooldowns.
    pub fn take_due_modifiers(&mut self, now: f64) -> Vec<SecondaryWeapon> {
        self.modifiers
            .iter_mut()
            .filter(|m| m.is_due(now))
            .map(|m| {
                m.last_fired = now;
                m.kind
            })
            .collect()
    }

    /// Applies one skill effect.
    ///
    /// Unknown effect types come back as [`SkillOutcome::PassThrough`] so the
    /// caller can handle them (player stats, inventory, ...).
    pub fn apply_skill_effect(&mut self, effect: &SkillEffect, rng: &mut fastrand::Rng) -> SkillOutcome {
        let Ok(kind) = effect.kind.parse::<EffectType>() else {
            debug!(kind = %effect.kind, "skill effect passed through");
            return SkillOutcome::PassThrough(effect.clone());
        };

        let applied = if kind == EffectType::RandomEffect {
            let pick = [EffectType::Damage, EffectType::Pierce, EffectType::ProjectileCount][rng.usize(..3)];
            self.apply_typed(pick, effect);
            pick
        } else {
            self.apply_typed(kind, effect);
            kind
        };

        self.defense_penalty += effect.defense_penalty.max(0.0);
        info!(effect = %applied, value = effect.value, "skill applied");
        SkillOutcome::Applied(applied)
    }

    fn apply_typed(&mut self, kind: EffectType, effect: &SkillEffect) {
        let count = effect.count();
        let chance = effect.value.max(0.0);
        let interval = |weapon: SecondaryWeapon| effect.interval_ms.unwrap_or(weapon.default_interval_ms());

        match kind {
            EffectType::Cooldown => {
                let factor = (1.0 - f64::from(effect.value)).clamp(0.1, 1.0);
                self.shoot_cooldown_ms = (self.shoot_cooldown_ms * factor).max(MIN_SHOOT_COOLDOWN_MS);
            },
            EffectType::Damage => self.damage += effect.value,
            EffectType::Pierce => self.pierce = self.pierce.saturating_add(count),
            EffectType::ProjectileCount => self.projectile_count = self.projectile_count.saturating_add(count),
            EffectType::ChainShot => self.chain_shot_count = self.chain_shot_count.saturating_add(count),
            EffectType::Bounce => self.bounce = self.bounce.saturating_add(count),
            EffectType::Explosion => {
                self.explosion_chance = (self.explosion_chance + chance).min(1.0);
            },
            EffectType::ChainExplosion => {
                self.chain_explosion_chance = (self.chain_explosion_chance + chance).min(1.0);
            },
            EffectType::MultiExplosion => {
                self.multi_explosion_count = self.multi_explosion_count.saturating_add(count);
            },
            EffectType::ExplosionOnCritical => self.explosion_on_critical += effect.value.max(0.0),
            EffectType::Deflect => self.deflect_chance = (self.deflect_chance + chance).min(1.0),
            EffectType::Redirect => self.redirect_chance = (self.redirect_chance + chance).min(1.0),
            EffectType::DamageBoost => self.damage_boost += effect.value,
            EffectType::ExplosiveProjectiles => {
                self.explosive_projectiles = self.explosive_projectiles.saturating_add(count);
            },
            EffectType::CircularPattern => self.fire_pattern = FirePattern::Circular,
            EffectType::Homing => self.enable_behavior(ProjectileBehavior::Homing),
            EffectType::SlowOnHit => self.enable_behavior(ProjectileBehavior::SlowOnHit),
            EffectType::CloneShot => self.enable_behavior(ProjectileBehavior::CloneShot),
            EffectType::LargeProjectile => self.enable_behavior(ProjectileBehavior::Large),
            EffectType::Grenade => self.enable_modifier(SecondaryWeapon::Grenade, interval(SecondaryWeapon::Grenade)),
            EffectType::Mine => self.enable_modifier(SecondaryWeapon::Mine, interval(SecondaryWeapon::Mine)),
            EffectType::Missile => self.enable_modifier(SecondaryWeapon::Missile, interval(SecondaryWeapon::Missile)),
            EffectType::SkyExplosion => {
                self.enable_modifier(SecondaryWeapon::SkyExplosion, interval(SecondaryWeapon::SkyExplosion));
            },
            EffectType::AreaExplosion | EffectType::AreaEffect => {
                self.enable_modifier(SecondaryWeapon::AreaExplosion, interval(SecondaryWeapon::AreaExplosion));
            },
            EffectType::EnergyExplosion => {
                self.enable_modifier(SecondaryWeapon::EnergyExplosion, interval(SecondaryWeapon::EnergyExplosion));
            },
            EffectType::Laser => self.enable_modifier(SecondaryWeapon::Laser, interval(SecondaryWeapon::Laser)),
            EffectType::MeteorBarrage => {
                self.enable_modifier(SecondaryWeapon::MeteorBarrage, interval(SecondaryWeapon::MeteorBarrage));
            },
            EffectType::FireTrail => {
                self.enable_modifier(SecondaryWeapon::FireTrail, interval(SecondaryWeapon::FireTrail));
            },
            // Resolved by the caller before dispatch.
            EffectType::RandomEffect => {},
        }
    }
}

/// A skill/item effect as delivered by the item collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEffect {
    /// Effect type name (`"pierce"`, `"grenade"`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Magnitude; meaning depends on the type
    #[serde(default)]
    pub value: f32,
    /// Interval for secondary weapons (ms)
    #[serde(default, rename = "interval")]
    pub interval_ms: Option<f64>,
    /// Extra damage the player takes afterwards (fraction)
    #[serde(default, rename = "defensePenalty")]
    pub defense_penalty: f32,
}

impl SkillEffect {
    /// Effect with a type and value.
    #[must_use]
    pub fn new(kind: impl Into<String>, value: f32) -> Self {
        Self {
            kind: kind.into(),
            value,
            interval_ms: None,
            defense_penalty: 0.0,
        }
    }

    /// Sets the secondary weapon interval.
    #[must_use]
    pub fn with_interval(mut self, interval_ms: f64) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    /// Sets the defense penalty.
    #[must_use]
    pub fn with_defense_penalty(mut self, penalty: f32) -> Self {
        self.defense_penalty = penalty;
        self
    }

    /// Value as a whole count, at least one.
    fn count(&self) -> u32 {
        (self.value.round() as u32).max(1)
    }
}

/// What happened to a skill effect.
#[derive(Debug, Clone, PartialEq)]
pub enum SkillOutcome {
    /// Weapon stats were updated
    Applied(EffectType),
    /// Not a weapon effect; the caller should handle it
    PassThrough(SkillEffect),
}

/// Recognized effect types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectType {
    /// Shorter shoot cooldown
    Cooldown,
    /// More base damage
    Damage,
    /// More pierce
    Pierce,
    /// More shots per volley
    ProjectileCount,
    /// More chain shots
    ChainShot,
    /// More bounces
    Bounce,
    /// Higher explosion chance
    Explosion,
    /// Grenade launcher
    Grenade,
    /// Mine layer
    Mine,
    /// Large shots
    LargeProjectile,
    /// Guided missiles
    Missile,
    /// Higher chain-explosion chance
    ChainExplosion,
    /// Sky strikes
    SkyExplosion,
    /// Fire trail
    FireTrail,
    /// Area blasts
    AreaExplosion,
    /// Alias of area blasts
    AreaEffect,
    /// More blasts per kill
    MultiExplosion,
    /// Enemy bullet reflection
    Deflect,
    /// Blast on critical hits
    ExplosionOnCritical,
    /// Laser beam
    Laser,
    /// Energy pulse
    EnergyExplosion,
    /// Meteor barrage
    MeteorBarrage,
    /// Fractional damage bonus
    DamageBoost,
    /// Guaranteed explosive shots
    ExplosiveProjectiles,
    /// One of damage, pierce, projectile count
    RandomEffect,
    /// Wall redirects
    Redirect,
    /// Homing shots
    Homing,
    /// Slowing shots
    SlowOnHit,
    /// Cloned shots
    CloneShot,
    /// Circular volleys
    CircularPattern,
}

impl EffectType {
    const NAMES: [(&'static str, Self); 30] = [
        ("cooldown", Self::Cooldown),
        ("damage", Self::Damage),
        ("pierce", Self::Pierce),
        ("projectileCount", Self::ProjectileCount),
        ("chainShot", Self::ChainShot),
        ("bounce", Self::Bounce),
        ("explosion", Self::Explosion),
        ("grenade", Self::Grenade),
        ("mine", Self::Mine),
        ("largeProjectile", Self::LargeProjectile),
        ("missile", Self::Missile),
        ("chainExplosion", Self::ChainExplosion),
        ("skyExplosion", Self::SkyExplosion),
        ("fireTrail", Self::FireTrail),
        ("areaExplosion", Self::AreaExplosion),
        ("areaEffect", Self::AreaEffect),
        ("multiExplosion", Self::MultiExplosion),
        ("deflect", Self::Deflect),
        ("explosionOnCritical", Self::ExplosionOnCritical),
        ("laser", Self::Laser),
        ("energyExplosion", Self::EnergyExplosion),
        ("meteorBarrage", Self::MeteorBarrage),
        ("damageBoost", Self::DamageBoost),
        ("explosiveProjectiles", Self::ExplosiveProjectiles),
        ("randomEffect", Self::RandomEffect),
        ("redirect", Self::Redirect),
        ("homing", Self::Homing),
        ("slowOnHit", Self::SlowOnHit),
        ("cloneShot", Self::CloneShot),
        ("circularPattern", Self::CircularPattern),
    ];

    /// Wire name.
    #[must_use]
    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, kind)| *kind == self)
            .map_or("unknown", |(name, _)| name)
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|&(_, kind)| kind)
            .ok_or(())
    }
}

/// Launch angles for a volley of `count` shots.
///
/// Spread volleys are symmetric about `aim`; circular volleys start at `aim`
/// and divide the full turn evenly.
#[must_use]
pub fn volley_angles(aim: f32, count: u32, pattern: FirePattern, spread: f32) -> Vec<f32> {
    let count = count.max(1);
    match pattern {
        FirePattern::Spread => {
            let half = (count as f32 - 1.0) / 2.0;
            (0..count).map(|i| aim + (i as f32 - half) * spread).collect()
        },
        FirePattern::Circular => (0..count).map(|i| aim + i as f32 * TAU / count as f32).collect(),
    }
}
