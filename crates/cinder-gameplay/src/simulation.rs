//! The combat simulation: one authoritative tick over enemies, projectiles,
//! ordnance and hazards.
//!
//! Entry points for the orchestrator are [`Simulation::spawn_enemy`],
//! [`Simulation::fire`] and [`Simulation::update`]. Destroyed entities are
//! only marked during a tick and swept at its end, so nothing is revisited
//! after it dies.

use cinder_common::{EntityId, IdAllocator, IsoProjection, TileCoord};
use glam::Vec2;
use tracing::{debug, info, warn};

use crate::combat::{nearest_living, ChainShot, Resolver};
use crate::config::SimulationConfig;
use crate::enemy::{Archetype, ArchetypeTable};
use crate::enemy_ai::{AiContext, EnemyAction, EnemyManager};
use crate::events::{CombatEvent, EventBus, ProjectileEnd};
use crate::grid::DungeonGrid;
use crate::ordnance::{
    area_blast_point, beam_hits, meteor_drop_points, FirePatch, Ordnance, OrdnanceKind, LASER_LENGTH, METEOR_COUNT,
    METEOR_STAGGER_MS,
};
use crate::pathfinding::Pathfinder;
use crate::perception::angle_between;
use crate::player::PlayerState;
use crate::projectile::{wall_contact, Projectile, ProjectileOwner};
use crate::schedule::{ScheduledAction, Scheduler};
use crate::stats::SimulationStats;
use crate::weapon::{
    volley_angles, ProjectileBehavior, SecondaryWeapon, SkillEffect, SkillOutcome, WeaponStats, CLONE_SHOT_CHANCE,
    LARGE_PROJECTILE_CHANCE, SLOW_ON_HIT_CHANCE,
};

/// Longest frame the simulation integrates in one step (ms).
pub const MAX_FRAME_MS: f64 = 100.0;
/// Player health at the start of a run.
pub const DEFAULT_PLAYER_HEALTH: f32 = 100.0;
/// Sideways offset of a cloned shot.
pub(crate) const CLONE_OFFSET: f32 = 10.0;
/// Size and blast scale of a large shot.
pub(crate) const LARGE_SCALE: f32 = 2.0;
/// Damage scale of a large shot.
pub(crate) const LARGE_DAMAGE_SCALE: f32 = 1.5;

/// Borrows the disjoint fields a [`Resolver`] needs.
macro_rules! resolver {
    ($sim:ident, $now:expr) => {
        Resolver {
            enemies: $sim.enemies.as_mut_slice(),
            weapon: &$sim.weapon,
            config: &$sim.config,
            rng: &mut $sim.rng,
            scheduler: &mut $sim.scheduler,
            events: &$sim.events,
            stats: &mut $sim.stats,
            now: $now,
        }
    };
}

/// Borrows the fields an [`AiContext`] needs at spawn time.
macro_rules! spawn_context {
    ($sim:ident) => {
        AiContext {
            grid: &$sim.grid,
            projection: &$sim.projection,
            config: &$sim.config,
            player: $sim.player.position(),
            now: $sim.now,
            dt: 0.0,
        }
    };
}

/// The combat simulation core.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    grid: DungeonGrid,
    projection: IsoProjection,
    rng: fastrand::Rng,
    ids: IdAllocator,
    enemies: EnemyManager,
    projectiles: Vec<Projectile>,
    ordnance: Vec<Ordnance>,
    fire_patches: Vec<FirePatch>,
    weapon: WeaponStats,
    player: PlayerState,
    scheduler: Scheduler,
    events: EventBus,
    stats: SimulationStats,
    last_update: Option<f64>,
    last_shot: Option<f64>,
    now: f64,
}

impl Simulation {
    /// Creates a simulation over a dungeon with the player on the center tile.
    #[must_use]
    pub fn new(config: SimulationConfig, grid: DungeonGrid, projection: IsoProjection) -> Self {
        let player = PlayerState::new(projection.tile_to_world(grid.center_tile()), DEFAULT_PLAYER_HEALTH);
        info!(
            "Simulation ready: {}x{} grid, {} rooms, seed {:#x}",
            grid.width(),
            grid.height(),
            grid.rooms().len(),
            config.seed
        );
        Self {
            rng: fastrand::Rng::with_seed(config.seed),
            ids: IdAllocator::new(),
            enemies: EnemyManager::new(ArchetypeTable::default(), Pathfinder::new(config.path_cache_size)),
            projectiles: Vec::new(),
            ordnance: Vec::new(),
            fire_patches: Vec::new(),
            weapon: WeaponStats::default(),
            player,
            scheduler: Scheduler::new(),
            events: EventBus::new(config.event_capacity),
            stats: SimulationStats::default(),
            last_update: None,
            last_shot: None,
            now: 0.0,
            config,
            grid,
            projection,
        }
    }

    /// Uses a custom archetype stat table for spawns.
    #[must_use]
    pub fn with_archetypes(mut self, table: ArchetypeTable) -> Self {
        self.enemies.set_table(table);
        self
    }

    // ========================================================================
    // Creation entry points
    // ========================================================================

    /// Spawns an enemy on a tile. Returns `None` (and logs why) if the spawn
    /// is rejected.
    pub fn spawn_enemy(&mut self, tile: TileCoord, archetype: Archetype) -> Option<EntityId> {
        let ctx = spawn_context!(self);
        match self.enemies.try_spawn(&ctx, &mut self.ids, &mut self.rng, tile, archetype) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Enemy spawn failed: {e}");
                None
            },
        }
    }

    /// Spawns an enemy by archetype name, as delivered by level data.
    pub fn spawn_enemy_named(&mut self, tile: TileCoord, name: &str) -> Option<EntityId> {
        let ctx = spawn_context!(self);
        match self.enemies.try_spawn_named(&ctx, &mut self.ids, &mut self.rng, tile, name) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Enemy spawn failed: {e}");
                None
            },
        }
    }

    /// Fires the player's weapon from `origin` toward `target`.
    ///
    /// Respects the shoot cooldown, spawns one volley and launches every
    /// secondary weapon that is due. Returns the number of projectiles spawned.
    pub fn fire(&mut self, origin: Vec2, target: Vec2, now: f64) -> usize {
        if self
            .last_shot
            .is_some_and(|last| now - last < self.weapon.shoot_cooldown_ms)
        {
            return 0;
        }
        self.last_shot = Some(now);

        let aim = angle_between(origin, target).unwrap_or(0.0);
        let angles = volley_angles(
            aim,
            self.weapon.projectile_count,
            self.weapon.fire_pattern,
            self.config.spread_angle,
        );
        let damage = self.weapon.effective_damage();
        let explosive_count = self.weapon.explosive_projectiles as usize;

        let before = self.projectiles.len();
        for (i, angle) in angles.into_iter().enumerate() {
            let direction = Vec2::from_angle(angle);
            let mut shot = self.player_shot(origin, direction, damage, now);
            shot.explosive = i < explosive_count;

            if self.weapon.has_behavior(ProjectileBehavior::SlowOnHit) && self.rng.f32() < SLOW_ON_HIT_CHANCE {
                shot.tags.slow_on_hit = true;
            }
            if self.weapon.has_behavior(ProjectileBehavior::Large) && self.rng.f32() < LARGE_PROJECTILE_CHANCE {
                shot.tags.large = true;
                shot.radius *= LARGE_SCALE;
                shot.damage *= LARGE_DAMAGE_SCALE;
                shot.explosive = true;
                shot.explosion_radius *= LARGE_SCALE;
            }
            let clone = self.weapon.has_behavior(ProjectileBehavior::CloneShot) && self.rng.f32() < CLONE_SHOT_CHANCE;
            if clone {
                let mut twin = shot.clone();
                twin.id = self.ids.next_id();
                twin.position += direction.perp() * CLONE_OFFSET;
                twin.spawn_position = twin.position;
                self.projectiles.push(twin);
            }
            self.projectiles.push(shot);
        }
        let spawned = self.projectiles.len() - before;
        self.stats.shots_fired += spawned as u64;

        for kind in self.weapon.take_due_modifiers(now) {
            self.fire_secondary(kind, origin, target, now);
        }
        spawned
    }

    fn player_shot(&mut self, origin: Vec2, direction: Vec2, damage: f32, now: f64) -> Projectile {
        let mut shot = Projectile::new(
            self.ids.next_id(),
            ProjectileOwner::Player,
            origin,
            direction * self.weapon.projectile_speed,
            damage,
            now,
        );
        shot.pierce = self.weapon.pierce;
        shot.bounce = self.weapon.bounce;
        shot.explosion_chance = self.weapon.explosion_chance;
        shot.explosion_radius = self.config.explosion_radius;
        shot.chain_shot = self.weapon.chain_shot_count;
        shot.radius = self.config.projectile_radius;
        shot.tags.homing = self.weapon.has_behavior(ProjectileBehavior::Homing);
        shot
    }

    fn fire_secondary(&mut self, kind: SecondaryWeapon, origin: Vec2, target: Vec2, now: f64) {
        let base = self.weapon.effective_damage();
        let damage = base * kind.damage_multiplier();
        debug!("Secondary weapon {kind:?} fired");

        match kind {
            SecondaryWeapon::Grenade => {
                let id = self.ids.next_id();
                self.launch(Ordnance::grenade(id, origin, target, base, now));
            },
            SecondaryWeapon::Mine => {
                let id = self.ids.next_id();
                self.launch(Ordnance::mine(id, origin, base, now));
            },
            SecondaryWeapon::Missile => {
                let enemies = self.enemies.as_slice();
                let aim = nearest_living(enemies, origin, f32::INFINITY, None).map_or(target, |i| enemies[i].position);
                let id = self.ids.next_id();
                self.launch(Ordnance::missile(id, origin, aim, base, now));
            },
            SecondaryWeapon::SkyExplosion => {
                let living: Vec<Vec2> = self.enemies.iter().filter(|e| e.is_alive()).map(|e| e.position).collect();
                if !living.is_empty() {
                    let position = living[self.rng.usize(..living.len())];
                    resolver!(self, now).explode(position, kind.radius(), damage, 0);
                }
            },
            SecondaryWeapon::AreaExplosion => {
                let position = area_blast_point(self.player.position(), &mut self.rng);
                resolver!(self, now).explode(position, kind.radius(), damage, 0);
            },
            SecondaryWeapon::EnergyExplosion => {
                let position = self.player.position();
                resolver!(self, now).explode(position, kind.radius(), damage, 0);
            },
            SecondaryWeapon::Laser => {
                let direction = (target - origin).normalize_or_zero();
                let direction = if direction == Vec2::ZERO { Vec2::X } else { direction };
                let end = origin + direction * LASER_LENGTH;
                self.events.publish(CombatEvent::LaserFired { from: origin, to: end });

                let radius = self.config.enemy_radius;
                let targets: Vec<usize> = self
                    .enemies
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.is_alive() && beam_hits(origin, end, kind.radius(), e.position, radius))
                    .map(|(i, _)| i)
                    .collect();
                let mut resolver = resolver!(self, now);
                for index in targets {
                    resolver.damage_enemy(index, damage, false);
                }
            },
            SecondaryWeapon::MeteorBarrage => {
                let points = meteor_drop_points(self.player.camera, METEOR_COUNT, &mut self.rng);
                for (k, position) in points.into_iter().enumerate() {
                    self.scheduler.schedule(
                        now + k as f64 * METEOR_STAGGER_MS,
                        None,
                        ScheduledAction::MeteorImpact {
                            position,
                            radius: kind.radius(),
                            damage,
                        },
                    );
                }
            },
            SecondaryWeapon::FireTrail => {
                self.fire_patches.push(FirePatch::new(origin, base, now));
            },
        }
    }

    fn launch(&mut self, ordnance: Ordnance) {
        let kind = ordnance.kind;
        let action = if kind.explodes_on_timeout() {
            ScheduledAction::Detonate(ordnance.id)
        } else {
            ScheduledAction::Expire(ordnance.id)
        };
        self.scheduler
            .schedule(ordnance.spawn_time + kind.lifetime_ms(), Some(ordnance.id), action);
        self.ordnance.push(ordnance);
    }

    /// Applies a skill effect to the weapon; unknown effects are handed back.
    pub fn apply_skill_effect(&mut self, effect: &SkillEffect) -> SkillOutcome {
        self.weapon.apply_skill_effect(effect, &mut self.rng)
    }

    /// Marks the room under the player visited. Returns its ID on the first visit.
    pub fn mark_room_visited(&mut self) -> Option<u32> {
        let tile = self.projection.world_to_tile(self.player.position());
        let room = self.grid.room_at(tile)?.id;
        if self.grid.mark_room_visited(room) {
            info!("Room {room} visited");
            Some(room)
        } else {
            None
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advances the simulation to `now` (ms).
    ///
    /// Frames longer than [`MAX_FRAME_MS`] are clamped so a stalled caller
    /// cannot tunnel projectiles through walls.
    #[doc(alias = "update_enemy_ai")]
    pub fn update(&mut self, now: f64) {
        let dt_ms = self
            .last_update
            .map_or(0.0, |last| (now - last).clamp(0.0, MAX_FRAME_MS));
        self.last_update = Some(now);
        self.now = now;
        let dt = (dt_ms / 1000.0) as f32;

        self.run_scheduled(now);
        self.update_enemies(now, dt);
        self.update_projectiles(now, dt);
        self.update_ordnance(now, dt);
        self.update_fire_patches(now);
        self.sweep();
    }

    fn run_scheduled(&mut self, now: f64) {
        for event in self.scheduler.drain_due(now) {
            match event.action {
                ScheduledAction::Explosion {
                    position,
                    radius,
                    damage,
                }
                | ScheduledAction::MeteorImpact {
                    position,
                    radius,
                    damage,
                } => {
                    resolver!(self, now).explode(position, radius, damage, 0);
                },
                ScheduledAction::Detonate(id) => self.detonate(id, now),
                ScheduledAction::Expire(id) => {
                    if let Some(item) = self.ordnance.iter_mut().find(|o| o.id == id) {
                        item.spend();
                    }
                },
            }
        }
    }

    fn detonate(&mut self, id: EntityId, now: f64) {
        let Some(item) = self.ordnance.iter_mut().find(|o| o.id == id) else {
            debug!("Detonation for missing ordnance {id} ignored");
            return;
        };
        if item.spend() {
            let (position, radius, damage) = (item.position, item.radius, item.damage);
            self.scheduler.cancel_for(id);
            resolver!(self, now).explode(position, radius, damage, 0);
        }
    }

    fn update_enemies(&mut self, now: f64, dt: f32) {
        let ctx = AiContext {
            grid: &self.grid,
            projection: &self.projection,
            config: &self.config,
            player: self.player.position(),
            now,
            dt,
        };
        let actions = self.enemies.update(&ctx, &mut self.rng, &self.events);

        for action in actions {
            match action {
                EnemyAction::Strike { enemy, damage } => {
                    resolver!(self, now).damage_player(&mut self.player, damage, Some(enemy));
                },
                EnemyAction::Shoot {
                    enemy,
                    origin,
                    direction,
                    damage,
                } => {
                    let mut bullet = Projectile::new(
                        self.ids.next_id(),
                        ProjectileOwner::Enemy(enemy),
                        origin,
                        direction * self.config.enemy_bullet_speed,
                        damage,
                        now,
                    );
                    bullet.radius = self.config.projectile_radius;
                    self.projectiles.push(bullet);
                },
            }
        }
    }

    fn update_projectiles(&mut self, now: f64, dt: f32) {
        let mut chain_shots: Vec<ChainShot> = Vec::new();
        let player_position = self.player.position();

        for index in 0..self.projectiles.len() {
            let projectile = &mut self.projectiles[index];
            if projectile.is_destroyed() {
                continue;
            }

            if projectile.tags.homing {
                let enemies = self.enemies.as_slice();
                let nearest = nearest_living(enemies, projectile.position, self.config.homing_radius, None);
                if let Some(target) = nearest.map(|i| enemies[i].position) {
                    projectile.steer_toward(target, self.config.homing_turn_rate);
                }
            }

            let from = projectile.position;
            projectile.advance(dt);

            if let Some(reason) = projectile.expiry(
                now,
                self.config.projectile_lifetime_ms,
                self.config.projectile_max_distance,
            ) {
                projectile.destroy(reason);
                continue;
            }

            if let Some(normal) = wall_contact(&self.grid, &self.projection, from, projectile.position) {
                projectile.position = from;
                if projectile.try_bounce(normal) {
                    continue;
                }
                let redirect = projectile.is_player_owned()
                    && self.weapon.redirect_chance > 0.0
                    && self.rng.f32() < self.weapon.redirect_chance;
                let redirect_target = if redirect {
                    let enemies = self.enemies.as_slice();
                    nearest_living(enemies, from, self.config.homing_radius, None).map(|i| enemies[i].position)
                } else {
                    None
                };
                match redirect_target {
                    Some(target) => projectile.redirect_toward(target),
                    None => {
                        projectile.destroy(ProjectileEnd::Wall);
                    },
                }
                continue;
            }

            match projectile.owner {
                ProjectileOwner::Player => {
                    let reach = self.config.enemy_radius + projectile.radius;
                    let target = self
                        .enemies
                        .iter()
                        .find(|e| e.is_alive() && !projectile.has_hit(e.id) && e.distance_to(projectile.position) <= reach)
                        .map(|e| e.id);
                    if let Some(target) = target {
                        let outcome = resolver!(self, now).resolve_hit(projectile, target);
                        if let Some(shot) = outcome.and_then(|o| o.chain_shot) {
                            chain_shots.push(shot);
                        }
                    }
                },
                ProjectileOwner::Enemy(source) => {
                    let reach = self.config.player_radius + projectile.radius;
                    if projectile.position.distance(player_position) > reach {
                        continue;
                    }
                    if self.weapon.deflect_chance > 0.0 && self.rng.f32() < self.weapon.deflect_chance {
                        projectile.owner = ProjectileOwner::Player;
                        projectile.velocity = -projectile.velocity;
                        projectile.spawn_position = projectile.position;
                        projectile.spawn_time = now;
                        self.stats.deflections += 1;
                        debug!("Bullet {} from {source} deflected", projectile.id);
                    } else {
                        resolver!(self, now).damage_player(&mut self.player, projectile.damage, Some(source));
                        projectile.destroy(ProjectileEnd::Hit);
                    }
                },
            }
        }

        for shot in chain_shots {
            let direction = (shot.target - shot.origin).normalize_or_zero();
            let mut projectile = Projectile::new(
                self.ids.next_id(),
                ProjectileOwner::Player,
                shot.origin,
                direction * self.weapon.projectile_speed,
                shot.damage,
                now,
            );
            projectile.radius = self.config.projectile_radius;
            projectile.chain_shot = shot.remaining;
            self.projectiles.push(projectile);
        }
    }

    fn update_ordnance(&mut self, now: f64, dt: f32) {
        for index in 0..self.ordnance.len() {
            let item = &mut self.ordnance[index];
            if item.is_spent() {
                continue;
            }

            if item.kind == OrdnanceKind::Missile {
                let enemies = self.enemies.as_slice();
                if let Some(i) = nearest_living(enemies, item.position, f32::INFINITY, None) {
                    let target = enemies[i].position;
                    item.retarget(target);
                }
            }

            let from = item.position;
            item.advance(dt);
            let mut blocked = false;
            if !self.grid.is_passable(self.projection.world_to_tile(item.position)) {
                item.position = from;
                item.velocity = Vec2::ZERO;
                blocked = true;
            }

            let radius = self.config.enemy_radius;
            let triggered = self
                .enemies
                .iter()
                .any(|e| e.is_alive() && item.triggered_by(e.position, radius));
            let missile_crashed = blocked && item.kind == OrdnanceKind::Missile;

            if (triggered || missile_crashed) && item.spend() {
                let (id, position, blast, damage) = (item.id, item.position, item.radius, item.damage);
                self.scheduler.cancel_for(id);
                resolver!(self, now).explode(position, blast, damage, 0);
            }
        }
    }

    fn update_fire_patches(&mut self, now: f64) {
        let radius = self.config.enemy_radius;
        for index in 0..self.fire_patches.len() {
            let patch = &mut self.fire_patches[index];
            if !patch.take_tick(now) {
                continue;
            }
            let (damage, targets): (f32, Vec<usize>) = (
                patch.damage,
                self.enemies
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.is_alive() && patch.covers(e.position, radius))
                    .map(|(i, _)| i)
                    .collect(),
            );
            let mut resolver = resolver!(self, now);
            for target in targets {
                resolver.damage_enemy(target, damage, false);
            }
        }
        self.fire_patches.retain(|patch| !patch.is_expired(now));
    }

    /// Removes everything destroyed this tick and cancels its pending events.
    fn sweep(&mut self) {
        for projectile in self.projectiles.iter().filter(|p| p.is_destroyed()) {
            self.scheduler.cancel_for(projectile.id);
            if let Some(reason) = projectile.end_reason() {
                self.events.publish(CombatEvent::ProjectileDestroyed {
                    entity: projectile.id,
                    position: projectile.position,
                    reason,
                });
            }
        }
        self.projectiles.retain(|p| !p.is_destroyed());

        for item in self.ordnance.iter().filter(|o| o.is_spent()) {
            self.scheduler.cancel_for(item.id);
        }
        self.ordnance.retain(|o| !o.is_spent());

        for id in self.enemies.remove_destroyed() {
            self.scheduler.cancel_for(id);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Tuning in effect.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Dungeon grid.
    #[must_use]
    pub const fn grid(&self) -> &DungeonGrid {
        &self.grid
    }

    /// Tile/world projection.
    #[must_use]
    pub const fn projection(&self) -> &IsoProjection {
        &self.projection
    }

    /// Enemy controller.
    #[must_use]
    pub const fn enemies(&self) -> &EnemyManager {
        &self.enemies
    }

    /// Enemy controller, mutably.
    pub fn enemies_mut(&mut self) -> &mut EnemyManager {
        &mut self.enemies
    }

    /// Health bars to draw at the current time as `(enemy, position, fraction)`.
    ///
    /// A bar shows while the enemy was hit within the configured visibility window.
    #[must_use]
    pub fn health_bars(&self) -> Vec<(EntityId, Vec2, f32)> {
        self.enemies
            .iter()
            .filter(|e| e.is_alive() && e.health_bar_visible(self.now, self.config.health_bar_visible_ms))
            .map(|e| (e.id, e.position, e.health_fraction()))
            .collect()
    }

    /// Live projectiles.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Live grenades, mines and missiles.
    #[must_use]
    pub fn ordnance(&self) -> &[Ordnance] {
        &self.ordnance
    }

    /// Burning fire trail patches.
    #[must_use]
    pub fn fire_patches(&self) -> &[FirePatch] {
        &self.fire_patches
    }

    /// Player state.
    #[must_use]
    pub const fn player(&self) -> &PlayerState {
        &self.player
    }

    /// Player state, mutably (movement, camera).
    pub fn player_mut(&mut self) -> &mut PlayerState {
        &mut self.player
    }

    /// Weapon stats.
    #[must_use]
    pub const fn weapon(&self) -> &WeaponStats {
        &self.weapon
    }

    /// Weapon stats, mutably.
    pub fn weapon_mut(&mut self) -> &mut WeaponStats {
        &mut self.weapon
    }

    /// Run counters.
    #[must_use]
    pub const fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Event bus collaborators drain each frame.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Number of pending scheduled actions.
    #[must_use]
    pub fn pending_scheduled(&self) -> usize {
        self.scheduler.len()
    }

    /// Time of the last update (ms).
    #[must_use]
    pub const fn now(&self) -> f64 {
        self.now
    }
}
