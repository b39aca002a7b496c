//! Combat resolution shared by projectile hits, blasts and enemy attacks.
//!
//! This module provides:
//! - Clamped damage with typed events for health bars and damage numbers
//! - Exactly-once kills and experience grants
//! - Pierce, explode-on-hit and chain-shot handling for projectile hits
//! - Area explosions with bounded chain reactions
//! - Player damage scaled by the weapon's defense penalty

use cinder_common::EntityId;
use glam::Vec2;
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::config::SimulationConfig;
use crate::enemy::Enemy;
use crate::events::{CombatEvent, DamageTarget, EventBus, ProjectileEnd};
use crate::player::PlayerState;
use crate::projectile::Projectile;
use crate::schedule::{ScheduledAction, Scheduler};
use crate::stats::SimulationStats;
use crate::weapon::WeaponStats;

/// Result of damaging one enemy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DamageReport {
    /// Health actually removed
    pub applied: f32,
    /// This hit destroyed the enemy
    pub killed: bool,
}

/// Follow-up shot requested by a lethal chain-shot hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainShot {
    /// Where the new shot starts
    pub origin: Vec2,
    /// Nearest surviving enemy
    pub target: Vec2,
    /// Damage it carries
    pub damage: f32,
    /// Chain shots it may still spawn
    pub remaining: u32,
}

/// What a projectile hit did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitOutcome {
    /// Damage dealt to the target
    pub report: DamageReport,
    /// Critical hit
    pub critical: bool,
    /// Follow-up shot to spawn, if any
    pub chain_shot: Option<ChainShot>,
}

/// Borrowed view of everything a hit can touch.
///
/// Built fresh by the simulation wherever hits are resolved so that the
/// enemy list and the projectile list can be borrowed independently.
pub struct Resolver<'a> {
    /// Enemies in spawn order
    pub enemies: &'a mut [Enemy],
    /// Weapon the player fires with
    pub weapon: &'a WeaponStats,
    /// Tuning
    pub config: &'a SimulationConfig,
    /// Simulation RNG
    pub rng: &'a mut fastrand::Rng,
    /// Deferred actions
    pub scheduler: &'a mut Scheduler,
    /// Event sink
    pub events: &'a EventBus,
    /// Run counters
    pub stats: &'a mut SimulationStats,
    /// Simulation time (ms)
    pub now: f64,
}

impl Resolver<'_> {
    /// Index of a living or dead enemy by ID.
    #[must_use]
    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.enemies.iter().position(|e| e.id == id)
    }

    /// Damages one enemy and destroys it when health reaches zero.
    pub fn damage_enemy(&mut self, index: usize, amount: f32, critical: bool) -> DamageReport {
        let Some(enemy) = self.enemies.get_mut(index) else {
            return DamageReport::default();
        };
        if !enemy.is_alive() {
            return DamageReport::default();
        }

        let applied = enemy.apply_damage(amount, self.now);
        self.stats.damage_dealt += applied;
        self.events.publish(CombatEvent::DamageApplied {
            target: DamageTarget::Enemy(enemy.id),
            amount: applied,
            position: enemy.position,
            time: self.now,
            critical,
        });
        self.events.publish(CombatEvent::HealthChanged {
            entity: enemy.id,
            current: enemy.health(),
            max: enemy.max_health(),
        });

        let killed = enemy.health() <= 0.0 && self.destroy_enemy(index);
        DamageReport { applied, killed }
    }

    /// Destroys an enemy and grants its experience. Returns `true` only once per enemy.
    pub fn destroy_enemy(&mut self, index: usize) -> bool {
        let Some(enemy) = self.enemies.get_mut(index) else {
            return false;
        };
        if !enemy.mark_destroyed() {
            return false;
        }
        let (id, archetype, position, xp) = (enemy.id, enemy.archetype, enemy.position, enemy.xp_reward);
        self.stats.record_kill(xp);
        self.events.publish(CombatEvent::EnemyDestroyed {
            entity: id,
            archetype,
            position,
            xp,
        });
        self.scheduler.cancel_for(id);
        debug!("Enemy {id} ({archetype}) destroyed, +{xp} xp");
        true
    }

    /// Resolves a projectile striking an enemy.
    ///
    /// Returns `None` (and does nothing) if the target is unknown or already dead.
    pub fn resolve_hit(&mut self, projectile: &mut Projectile, target: EntityId) -> Option<HitOutcome> {
        let Some(index) = self.index_of(target) else {
            warn!("Hit on unknown enemy {target} ignored");
            return None;
        };
        if !self.enemies[index].is_alive() {
            debug!("Hit on destroyed enemy {target} ignored");
            return None;
        }

        let critical = projectile.is_player_owned() && self.rng.f32() < self.weapon.crit_chance;
        let damage = if critical {
            projectile.damage * self.weapon.crit_multiplier
        } else {
            projectile.damage
        };
        let hit_point = self.enemies[index].position;

        let report = self.damage_enemy(index, damage, critical);
        projectile.record_hit(target);

        if projectile.tags.slow_on_hit && !report.killed {
            let enemy = &mut self.enemies[index];
            if self.now >= enemy.slowed_until {
                enemy.velocity *= self.config.slow_factor;
            }
            enemy.slowed_until = self.now + self.config.slow_duration_ms;
        }

        if critical {
            self.stats.critical_hits += 1;
            if self.weapon.explosion_on_critical > 0.0 {
                self.explode(hit_point, self.weapon.explosion_on_critical, projectile.damage, 0);
            }
        }

        if report.killed {
            self.on_kill(hit_point, projectile.damage);
        }

        if projectile.pierce > 0 {
            projectile.pierce -= 1;
        } else {
            let explodes = projectile.explosive
                || (projectile.explosion_chance > 0.0 && self.rng.f32() < projectile.explosion_chance);
            if explodes {
                let radius = if projectile.explosion_radius > 0.0 {
                    projectile.explosion_radius
                } else {
                    self.config.explosion_radius
                };
                self.explode(projectile.position, radius, projectile.damage, 0);
            }
            projectile.destroy(ProjectileEnd::Hit);
        }

        let chain_shot = if report.killed && projectile.chain_shot > 0 {
            self.nearest_enemy(hit_point, target).map(|target| ChainShot {
                origin: hit_point,
                target,
                damage: projectile.damage,
                remaining: projectile.chain_shot - 1,
            })
        } else {
            None
        };

        Some(HitOutcome {
            report,
            critical,
            chain_shot,
        })
    }

    /// Secondary effects of a lethal direct hit: one chain blast roll and the
    /// staggered multi-explosion blasts.
    fn on_kill(&mut self, position: Vec2, damage: f32) {
        if self.config.max_chain_depth > 0
            && self.weapon.chain_explosion_chance > 0.0
            && self.rng.f32() < self.weapon.chain_explosion_chance
        {
            self.explode(position, self.config.explosion_radius, damage, 1);
        }

        for k in 0..self.weapon.multi_explosion_count {
            self.scheduler.schedule(
                self.now + f64::from(k) * self.config.multi_explosion_stagger_ms,
                None,
                ScheduledAction::Explosion {
                    position,
                    radius: self.config.explosion_radius,
                    damage,
                },
            );
        }
    }

    /// Area blast: damages every living enemy within `radius` of `origin`.
    ///
    /// Kills may set off a further blast at a reduced radius while `depth`
    /// stays below the configured chain depth.
    pub fn explode(&mut self, origin: Vec2, radius: f32, damage: f32, depth: u32) {
        let mut pending = VecDeque::from([(origin, radius, depth)]);

        while let Some((center, radius, depth)) = pending.pop_front() {
            self.stats.explosions += 1;
            self.events.publish(CombatEvent::ExplosionTriggered {
                position: center,
                radius,
                depth,
            });

            let targets: Vec<usize> = self
                .enemies
                .iter()
                .enumerate()
                .filter(|(_, e)| e.is_alive() && e.distance_to(center) <= radius)
                .map(|(i, _)| i)
                .collect();

            for index in targets {
                let position = self.enemies[index].position;
                let report = self.damage_enemy(index, damage, false);
                if report.killed
                    && depth < self.config.max_chain_depth
                    && self.weapon.chain_explosion_chance > 0.0
                    && self.rng.f32() < self.weapon.chain_explosion_chance
                {
                    pending.push_back((position, radius * self.config.chain_radius_factor, depth + 1));
                }
            }
        }
    }

    /// Applies an enemy attack to the player, scaled by the defense penalty.
    pub fn damage_player(&mut self, player: &mut PlayerState, amount: f32, source: Option<EntityId>) -> f32 {
        let scaled = amount * (1.0 + self.weapon.defense_penalty.max(0.0));
        let applied = player.apply_damage(scaled);
        self.stats.damage_taken += applied;
        self.events.publish(CombatEvent::DamageApplied {
            target: DamageTarget::Player,
            amount: applied,
            position: player.position(),
            time: self.now,
            critical: false,
        });
        self.events.publish(CombatEvent::PlayerDamaged {
            amount: applied,
            remaining: player.health(),
            source,
        });
        applied
    }

    /// Position of the living enemy closest to `from`, skipping `exclude`.
    #[must_use]
    pub fn nearest_enemy(&self, from: Vec2, exclude: EntityId) -> Option<Vec2> {
        nearest_living(self.enemies, from, f32::INFINITY, Some(exclude)).map(|i| self.enemies[i].position)
    }
}

/// Index of the nearest living enemy within `max_distance` of `from`.
#[must_use]
pub fn nearest_living(enemies: &[Enemy], from: Vec2, max_distance: f32, exclude: Option<EntityId>) -> Option<usize> {
    enemies
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_alive() && Some(e.id) != exclude)
        .map(|(i, e)| (i, e.distance_to(from)))
        .filter(|&(_, d)| d <= max_distance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enemy::{Archetype, Personality};
    use crate::projectile::ProjectileOwner;
    use crate::weapon::WeaponBase;

    struct Fixture {
        enemies: Vec<Enemy>,
        weapon: WeaponStats,
        config: SimulationConfig,
        rng: fastrand::Rng,
        scheduler: Scheduler,
        events: EventBus,
        stats: SimulationStats,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                enemies: Vec::new(),
                weapon: WeaponStats::new(WeaponBase {
                    crit_chance: 0.0,
                    ..WeaponBase::default()
                }),
                config: SimulationConfig::default(),
                rng: fastrand::Rng::with_seed(3),
                scheduler: Scheduler::new(),
                events: EventBus::default(),
                stats: SimulationStats::default(),
            }
        }

        fn spawn(&mut self, archetype: Archetype, position: Vec2) -> EntityId {
            let id = EntityId::from_raw(self.enemies.len() as u64 + 1);
            self.enemies.push(Enemy::new(
                id,
                archetype,
                archetype.default_stats(),
                Personality::Aggressive,
                position,
                0.0,
            ));
            id
        }

        fn resolver(&mut self) -> Resolver<'_> {
            Resolver {
                enemies: &mut self.enemies,
                weapon: &self.weapon,
                config: &self.config,
                rng: &mut self.rng,
                scheduler: &mut self.scheduler,
                events: &self.events,
                stats: &mut self.stats,
                now: 100.0,
            }
        }

        fn count(&self, pred: impl Fn(&CombatEvent) -> bool) -> usize {
            self.events.drain().iter().filter(|e| pred(e)).count()
        }
    }

    fn bullet(damage: f32) -> Projectile {
        Projectile::new(
            EntityId::from_raw(1000),
            ProjectileOwner::Player,
            Vec2::ZERO,
            Vec2::X,
            damage,
            0.0,
        )
    }

    #[test]
    fn test_boss_dies_on_third_hit_once() {
        let mut fx = Fixture::new();
        let boss = fx.spawn(Archetype::Boss, Vec2::ZERO);
        let mut healths = vec![fx.enemies[0].health()];
        let mut kills = 0;
        for _ in 0..3 {
            let mut shot = bullet(60.0);
            let outcome = fx.resolver().resolve_hit(&mut shot, boss).unwrap();
            kills += u32::from(outcome.report.killed);
            healths.push(fx.enemies[0].health());
        }
        assert_eq!(healths, vec![150.0, 90.0, 30.0, 0.0]);
        assert_eq!(kills, 1);
        assert_eq!(fx.stats.xp, 100);
        assert_eq!(fx.count(|e| matches!(e, CombatEvent::EnemyDestroyed { .. })), 1);
    }

    #[test]
    fn test_overlapping_hits_grant_xp_once() {
        let mut fx = Fixture::new();
        let id = fx.spawn(Archetype::Normal, Vec2::ZERO);
        let mut first = bullet(100.0);
        let mut second = bullet(100.0);
        assert!(fx.resolver().resolve_hit(&mut first, id).is_some());
        assert!(fx.resolver().resolve_hit(&mut second, id).is_none());
        assert!(fx.resolver().damage_enemy(0, 50.0, false) == DamageReport::default());
        assert!(!fx.resolver().destroy_enemy(0));
        assert_eq!(fx.stats.kills, 1);
        assert_eq!(fx.stats.xp, 10);
        // The second shot was never spent.
        assert!(!second.is_destroyed());
    }

    #[test]
    fn test_pierce_survives_two_hits() {
        let mut fx = Fixture::new();
        let ids: Vec<_> = (0..3)
            .map(|i| fx.spawn(Archetype::Normal, Vec2::new(i as f32 * 200.0, 0.0)))
            .collect();
        let mut shot = bullet(100.0);
        shot.pierce = 2;

        fx.resolver().resolve_hit(&mut shot, ids[0]);
        assert!(!shot.is_destroyed());
        assert_eq!(shot.pierce, 1);
        fx.resolver().resolve_hit(&mut shot, ids[1]);
        assert!(!shot.is_destroyed());
        assert_eq!(shot.pierce, 0);
        fx.resolver().resolve_hit(&mut shot, ids[2]);
        assert_eq!(shot.end_reason(), Some(ProjectileEnd::Hit));
        assert_eq!(fx.stats.kills, 3);
        assert_eq!(fx.stats.explosions, 0);
    }

    #[test]
    fn test_explosive_shot_explodes_when_spent() {
        let mut fx = Fixture::new();
        let target = fx.spawn(Archetype::Boss, Vec2::ZERO);
        fx.spawn(Archetype::Normal, Vec2::new(30.0, 0.0));
        let mut shot = bullet(10.0);
        shot.explosive = true;

        fx.resolver().resolve_hit(&mut shot, target);
        assert!(shot.is_destroyed());
        assert_eq!(fx.stats.explosions, 1);
        assert_eq!(fx.enemies[1].health(), 20.0);
    }

    #[test]
    fn test_chain_depth_is_bounded() {
        for (max_depth, expected) in [(0, 1), (1, 3), (2, 4)] {
            let mut fx = Fixture::new();
            fx.config.max_chain_depth = max_depth;
            fx.weapon.chain_explosion_chance = 1.0;
            for x in [0.0, 40.0, 80.0] {
                fx.spawn(Archetype::Normal, Vec2::new(x, 0.0));
            }
            fx.resolver().explode(Vec2::ZERO, 60.0, 100.0, 0);
            assert_eq!(fx.stats.explosions, expected, "max depth {max_depth}");
        }
    }

    #[test]
    fn test_multi_explosion_is_staggered() {
        let mut fx = Fixture::new();
        fx.weapon.multi_explosion_count = 3;
        let id = fx.spawn(Archetype::Normal, Vec2::ZERO);
        let mut shot = bullet(100.0);
        fx.resolver().resolve_hit(&mut shot, id);

        let due: Vec<f64> = fx.scheduler.drain_due(f64::MAX).iter().map(|e| e.due).collect();
        assert_eq!(due, vec![100.0, 300.0, 500.0]);
    }

    #[test]
    fn test_chain_shot_targets_nearest_survivor() {
        let mut fx = Fixture::new();
        let first = fx.spawn(Archetype::Normal, Vec2::ZERO);
        fx.spawn(Archetype::Normal, Vec2::new(300.0, 0.0));
        fx.spawn(Archetype::Normal, Vec2::new(0.0, 90.0));
        let mut shot = bullet(100.0);
        shot.chain_shot = 2;

        let outcome = fx.resolver().resolve_hit(&mut shot, first).unwrap();
        let chain = outcome.chain_shot.unwrap();
        assert_eq!(chain.target, Vec2::new(0.0, 90.0));
        assert_eq!(chain.remaining, 1);
        assert_eq!(chain.damage, 100.0);
    }

    #[test]
    fn test_unknown_target_is_noop() {
        let mut fx = Fixture::new();
        let mut shot = bullet(10.0);
        assert!(fx.resolver().resolve_hit(&mut shot, EntityId::from_raw(77)).is_none());
        assert!(!shot.is_destroyed());
        assert_eq!(fx.events.pending_count(), 0);
    }

    #[test]
    fn test_defense_penalty_scales_player_damage() {
        let mut fx = Fixture::new();
        fx.weapon.defense_penalty = 0.5;
        let mut player = PlayerState::new(Vec2::ZERO, 100.0);
        let applied = fx.resolver().damage_player(&mut player, 10.0, None);
        assert_eq!(applied, 15.0);
        assert_eq!(player.health(), 85.0);
        assert_eq!(fx.stats.damage_taken, 15.0);
    }

    #[test]
    fn test_slow_on_hit_marks_enemy() {
        let mut fx = Fixture::new();
        let id = fx.spawn(Archetype::Boss, Vec2::ZERO);
        let mut shot = bullet(1.0);
        shot.tags.slow_on_hit = true;
        fx.resolver().resolve_hit(&mut shot, id);
        assert_eq!(fx.enemies[0].slowed_until, 2100.0);
        assert_eq!(fx.enemies[0].slow_multiplier(1000.0, 0.5), 0.5);
    }
}
