//! Enemy controller: spawning, the patrol/chase/attack/flee state machine and
//! per-frame movement.
//!
//! Decisions (state transitions, attacks, new paths) run on a coarse AI tick;
//! steering along the chosen path and position integration run every frame.
//! Attacks come back to the caller as [`EnemyAction`]s so the combat
//! resolver can apply them.

use cinder_common::{EntityId, IdAllocator, IsoProjection, TileCoord};
use glam::Vec2;
use std::f32::consts::TAU;
use tracing::debug;

use crate::config::SimulationConfig;
use crate::enemy::{Archetype, ArchetypeTable, Enemy, EnemyState, Locomotion, Personality, SpawnError, SpawnResult};
use crate::events::{CombatEvent, EventBus, IdleCue};
use crate::grid::DungeonGrid;
use crate::pathfinding::Pathfinder;
use crate::perception::is_visible;

/// Attack leaves the state once the player is this far beyond attack range.
const ATTACK_EXIT_FACTOR: f32 = 1.1;
/// Melee enemies keep closing in beyond this fraction of their range.
const MELEE_APPROACH_FACTOR: f32 = 0.8;
/// Ranged enemies back off inside this fraction of their range.
const RANGED_RETREAT_FACTOR: f32 = 0.5;
/// Heavy damage multiplier while attacking.
const HEAVY_DAMAGE_FACTOR: f32 = 1.3;
/// Heavy movement multiplier while attacking.
const HEAVY_MOVE_FACTOR: f32 = 0.5;

/// Read-only view of the world for one enemy update.
#[derive(Debug, Clone, Copy)]
pub struct AiContext<'a> {
    /// Static dungeon
    pub grid: &'a DungeonGrid,
    /// Tile/world mapping
    pub projection: &'a IsoProjection,
    /// Tuning
    pub config: &'a SimulationConfig,
    /// Player position
    pub player: Vec2,
    /// Simulation time (ms)
    pub now: f64,
    /// Frame time (s)
    pub dt: f32,
}

/// Attack produced by an enemy decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnemyAction {
    /// Melee hit on the player
    Strike {
        /// Attacker
        enemy: EntityId,
        /// Damage before the player's defense penalty
        damage: f32,
    },
    /// Bullet fired at the player
    Shoot {
        /// Shooter
        enemy: EntityId,
        /// Muzzle position
        origin: Vec2,
        /// Unit direction
        direction: Vec2,
        /// Bullet damage
        damage: f32,
    },
}

/// Owns every enemy and drives their behavior.
#[derive(Debug)]
pub struct EnemyManager {
    enemies: Vec<Enemy>,
    table: ArchetypeTable,
    pathfinder: Pathfinder,
    last_decision: Option<f64>,
}

impl Default for EnemyManager {
    fn default() -> Self {
        Self::new(ArchetypeTable::default(), Pathfinder::default())
    }
}

impl EnemyManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(table: ArchetypeTable, pathfinder: Pathfinder) -> Self {
        Self {
            enemies: Vec::new(),
            table,
            pathfinder,
            last_decision: None,
        }
    }

    /// Replaces the archetype stat table for future spawns.
    pub fn set_table(&mut self, table: ArchetypeTable) {
        self.table = table;
    }

    /// Number of enemies, including ones destroyed this tick.
    #[must_use]
    pub fn len(&self) -> usize {
        self.enemies.len()
    }

    /// Whether there are no enemies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enemies.is_empty()
    }

    /// Number of living enemies.
    #[must_use]
    pub fn living_count(&self) -> usize {
        self.enemies.iter().filter(|e| e.is_alive()).count()
    }

    /// Looks up an enemy.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.id == id)
    }

    /// Looks up an enemy mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Enemy> {
        self.enemies.iter_mut().find(|e| e.id == id)
    }

    /// Enemies in spawn order.
    pub fn iter(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.iter()
    }

    /// Enemies in spawn order, as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Enemy] {
        &self.enemies
    }

    /// Enemies in spawn order, for the combat resolver.
    pub fn as_mut_slice(&mut self) -> &mut [Enemy] {
        &mut self.enemies
    }

    /// Spawns an enemy on a tile.
    ///
    /// Personality and the idle cue interval are rolled here; stats are
    /// validated before anything is allocated.
    pub fn try_spawn(
        &mut self,
        ctx: &AiContext<'_>,
        ids: &mut IdAllocator,
        rng: &mut fastrand::Rng,
        tile: TileCoord,
        archetype: Archetype,
    ) -> SpawnResult<EntityId> {
        if !ctx.grid.is_passable(tile) {
            return Err(SpawnError::InvalidTile(tile));
        }
        let stats = self.table.get(archetype)?;
        let personality = Personality::all()[rng.usize(..Personality::all().len())];

        let id = ids.next_id();
        let mut enemy = Enemy::new(
            id,
            archetype,
            stats,
            personality,
            ctx.projection.tile_to_world(tile),
            ctx.now,
        );
        let (low, high) = (ctx.config.idle_cue_min_ms, ctx.config.idle_cue_max_ms);
        enemy.idle_cue_interval = low + rng.f64() * (high - low);
        // Offset so neighbors don't bob in sync.
        enemy.last_idle_cue = ctx.now - rng.f64() * enemy.idle_cue_interval;

        debug!("Spawned {archetype} {id} ({personality:?}) at ({}, {})", tile.x, tile.y);
        self.enemies.push(enemy);
        Ok(id)
    }

    /// Spawns an enemy by archetype name.
    pub fn try_spawn_named(
        &mut self,
        ctx: &AiContext<'_>,
        ids: &mut IdAllocator,
        rng: &mut fastrand::Rng,
        tile: TileCoord,
        name: &str,
    ) -> SpawnResult<EntityId> {
        let archetype = name.parse()?;
        self.try_spawn(ctx, ids, rng, tile, archetype)
    }

    /// Drops destroyed enemies and returns their IDs.
    pub fn remove_destroyed(&mut self) -> Vec<EntityId> {
        let removed: Vec<EntityId> = self.enemies.iter().filter(|e| !e.is_alive()).map(|e| e.id).collect();
        if !removed.is_empty() {
            self.enemies.retain(Enemy::is_alive);
        }
        removed
    }

    /// Advances every living enemy by one frame.
    pub fn update(
        &mut self,
        ctx: &AiContext<'_>,
        rng: &mut fastrand::Rng,
        events: &EventBus,
    ) -> Vec<EnemyAction> {
        let decide = self
            .last_decision
            .map_or(true, |last| ctx.now - last >= ctx.config.ai_tick_ms);
        if decide {
            self.last_decision = Some(ctx.now);
        }

        let mut actions = Vec::new();
        for index in 0..self.enemies.len() {
            if !self.enemies[index].is_alive() {
                continue;
            }
            // Work on a copy so the others can be read while deciding.
            let mut enemy = self.enemies[index].clone();

            recover_bounds(&mut enemy, ctx);
            if decide {
                self.decide(&mut enemy, ctx, rng, events, &mut actions);
            }
            steer(&mut enemy, ctx);
            integrate(&mut enemy, ctx);
            if enemy.state == EnemyState::Flee {
                enemy.heal(ctx.config.flee_regen_per_second * ctx.dt);
            }

            self.enemies[index] = enemy;
        }

        self.resolve_contacts(ctx.config.enemy_radius);
        actions
    }

    fn decide(
        &mut self,
        enemy: &mut Enemy,
        ctx: &AiContext<'_>,
        rng: &mut fastrand::Rng,
        events: &EventBus,
        actions: &mut Vec<EnemyAction>,
    ) {
        if enemy.state != EnemyState::Patrol && ctx.now - enemy.last_move > ctx.config.idle_timeout_ms {
            transition(enemy, EnemyState::Patrol, ctx.now, events);
            return;
        }

        let distance = enemy.distance_to(ctx.player);
        let visible = is_visible(enemy, ctx.player, ctx.grid, ctx.projection);
        let profile = enemy.profile();
        let next = match enemy.state {
            EnemyState::Patrol if visible => EnemyState::Chase,
            EnemyState::Chase if !visible && distance > profile.disengage_distance => EnemyState::Patrol,
            EnemyState::Chase if distance < enemy.attack_range => EnemyState::Attack,
            EnemyState::Attack if distance > enemy.attack_range * ATTACK_EXIT_FACTOR => EnemyState::Chase,
            EnemyState::Attack if enemy.health() < profile.flee_health => EnemyState::Flee,
            EnemyState::Flee if enemy.health() > profile.recover_health => EnemyState::Chase,
            state => state,
        };
        if next != enemy.state {
            transition(enemy, next, ctx.now, events);
        }

        match enemy.state {
            EnemyState::Patrol => self.solo_behavior(enemy, ctx, distance, rng, events),
            EnemyState::Chase => self.chase(enemy, ctx, rng),
            EnemyState::Attack => {
                if let Some(factor) = attack(enemy, ctx, distance, actions) {
                    self.path_to_player(enemy, ctx);
                    enemy.move_speed *= factor;
                }
            },
            EnemyState::Flee => flee(enemy, ctx, rng),
        }
    }

    /// Patrol: doze when nobody is around, otherwise wander or fade in place.
    fn solo_behavior(
        &self,
        enemy: &mut Enemy,
        ctx: &AiContext<'_>,
        player_distance: f32,
        rng: &mut fastrand::Rng,
        events: &EventBus,
    ) {
        let config = ctx.config;
        let crowded = self
            .enemies
            .iter()
            .any(|o| o.id != enemy.id && o.is_alive() && o.distance_to(enemy.position) <= config.solo_isolation_radius);
        let alone = !crowded && player_distance > config.solo_player_distance;

        if alone {
            enemy.halt();
            if ctx.now - enemy.last_idle_cue >= enemy.idle_cue_interval {
                enemy.last_idle_cue = ctx.now;
                events.publish(CombatEvent::EnemyCue {
                    entity: enemy.id,
                    cue: IdleCue::Sleep,
                });
            }
        } else if ctx.now - enemy.last_random_move >= config.random_walk_interval_ms {
            enemy.last_random_move = ctx.now;
            if rng.bool() {
                enemy.locomotion = Locomotion::Heading(Vec2::from_angle(rng.f32() * TAU));
                enemy.move_speed = enemy.speed * config.random_walk_speed_factor;
            } else {
                enemy.halt();
                events.publish(CombatEvent::EnemyCue {
                    entity: enemy.id,
                    cue: IdleCue::FadeBob,
                });
            }
        }
    }

    /// Chase: flank, wander toward random points, or path to the player.
    fn chase(&mut self, enemy: &mut Enemy, ctx: &AiContext<'_>, rng: &mut fastrand::Rng) {
        let config = ctx.config;
        let now = ctx.now;

        match enemy.archetype {
            Archetype::Fast if now - enemy.last_flank >= config.flank_interval_ms => {
                let toward = (ctx.player - enemy.position).normalize_or_zero();
                let side = if rng.bool() { 1.0 } else { -1.0 };
                let flank = ctx.player + toward.perp() * side * config.flank_distance;
                enemy.locomotion = Locomotion::Toward(flank);
                enemy.move_speed = enemy.speed * config.flank_speed_factor;
                enemy.last_flank = now;
                return;
            },
            Archetype::Random if !enemy.ranged && now - enemy.last_random_move >= config.random_target_interval_ms => {
                let offset = Vec2::from_angle(rng.f32() * TAU) * (rng.f32() * config.random_target_range);
                enemy.locomotion = Locomotion::Toward(enemy.position + offset);
                enemy.move_speed = enemy.speed;
                enemy.last_random_move = now;
                return;
            },
            _ => {},
        }

        // A flank point or random destination stays in effect until reached.
        let detour = matches!(enemy.archetype, Archetype::Fast | Archetype::Random)
            && matches!(enemy.locomotion, Locomotion::Toward(_));
        if !detour {
            self.path_to_player(enemy, ctx);
        }
    }

    fn path_to_player(&mut self, enemy: &mut Enemy, ctx: &AiContext<'_>) {
        let start = ctx.projection.world_to_tile(enemy.position);
        let goal = ctx.projection.world_to_tile(ctx.player);
        let path = self.pathfinder.find_path(ctx.grid, start, goal);

        enemy.move_speed = enemy.speed;
        if !path.is_empty() {
            enemy.locomotion = Locomotion::FollowPath(path.into());
        } else if start == goal {
            enemy.locomotion = Locomotion::Toward(ctx.player);
        } else {
            enemy.halt();
        }
    }

    /// Zeroes the velocity of every pair of overlapping enemies.
    fn resolve_contacts(&mut self, radius: f32) {
        let reach = radius * 2.0;
        for i in 0..self.enemies.len() {
            for j in (i + 1)..self.enemies.len() {
                let (a, b) = (&self.enemies[i], &self.enemies[j]);
                if a.is_alive() && b.is_alive() && a.position.distance(b.position) < reach {
                    self.enemies[i].velocity = Vec2::ZERO;
                    self.enemies[j].velocity = Vec2::ZERO;
                }
            }
        }
    }
}

fn transition(enemy: &mut Enemy, to: EnemyState, now: f64, events: &EventBus) {
    let from = enemy.state;
    enemy.state = to;
    enemy.last_move = now;
    if to == EnemyState::Patrol {
        enemy.halt();
    }
    debug!("Enemy {} {from:?} -> {to:?}", enemy.id);
    events.publish(CombatEvent::EnemyStateChanged {
        entity: enemy.id,
        from,
        to,
    });
}

/// Attacks when the cooldown allows and picks the attack stance. Returns the
/// speed factor when a melee enemy should keep pathing toward the player.
fn attack(enemy: &mut Enemy, ctx: &AiContext<'_>, distance: f32, actions: &mut Vec<EnemyAction>) -> Option<f32> {
    let heavy = enemy.archetype == Archetype::Heavy;

    if ctx.now - enemy.last_attack >= enemy.attack_cooldown_ms {
        enemy.last_attack = ctx.now;
        enemy.last_move = ctx.now;
        if enemy.ranged {
            let direction = (ctx.player - enemy.position).normalize_or_zero();
            actions.push(EnemyAction::Shoot {
                enemy: enemy.id,
                origin: enemy.position,
                direction: if direction == Vec2::ZERO { Vec2::X } else { direction },
                damage: enemy.damage,
            });
        } else {
            let factor = if heavy { HEAVY_DAMAGE_FACTOR } else { 1.0 };
            actions.push(EnemyAction::Strike {
                enemy: enemy.id,
                damage: enemy.damage * factor,
            });
        }
    }

    if enemy.ranged {
        let away = (enemy.position - ctx.player).normalize_or_zero();
        if distance < enemy.attack_range * RANGED_RETREAT_FACTOR && away != Vec2::ZERO {
            enemy.locomotion = Locomotion::Heading(away);
            enemy.move_speed = enemy.speed;
        } else {
            enemy.halt();
        }
        None
    } else if distance > enemy.attack_range * MELEE_APPROACH_FACTOR {
        let factor = if heavy { HEAVY_MOVE_FACTOR } else { 1.0 };
        Some(enemy.profile().approach_speed * factor)
    } else {
        enemy.halt();
        None
    }
}

fn flee(enemy: &mut Enemy, ctx: &AiContext<'_>, rng: &mut fastrand::Rng) {
    let mut away = (enemy.position - ctx.player).normalize_or_zero();
    if away == Vec2::ZERO {
        away = Vec2::from_angle(rng.f32() * TAU);
    }
    enemy.locomotion = Locomotion::Heading(away);
    enemy.move_speed = enemy.speed * ctx.config.flee_speed_factor * enemy.profile().flee_stride;
}

/// Points the velocity at the current movement target, popping reached waypoints.
fn steer(enemy: &mut Enemy, ctx: &AiContext<'_>) {
    let position = enemy.position;
    let reach = ctx.config.waypoint_reach;
    let projection = ctx.projection;

    let target = match &mut enemy.locomotion {
        Locomotion::Idle => None,
        Locomotion::Heading(direction) => Some(position + *direction),
        Locomotion::Toward(point) => (position.distance(*point) > reach).then_some(*point),
        Locomotion::FollowPath(path) => {
            while path
                .front()
                .is_some_and(|tile| position.distance(projection.tile_to_world(*tile)) <= reach)
            {
                path.pop_front();
            }
            path.front().map(|tile| projection.tile_to_world(*tile))
        },
    };

    match target {
        Some(target) => {
            let speed = enemy.move_speed * enemy.slow_multiplier(ctx.now, ctx.config.slow_factor);
            enemy.velocity = (target - position).normalize_or_zero() * speed;
        },
        None => enemy.halt(),
    }
}

/// Applies the velocity unless it would carry the enemy into a wall.
fn integrate(enemy: &mut Enemy, ctx: &AiContext<'_>) {
    if enemy.velocity == Vec2::ZERO || ctx.dt <= 0.0 {
        return;
    }
    let next = enemy.position + enemy.velocity * ctx.dt;
    if ctx.grid.is_passable(ctx.projection.world_to_tile(next)) {
        enemy.position = next;
        enemy.last_move = ctx.now;
    } else {
        enemy.halt();
    }
}

/// Recenters an enemy that ended up off the grid.
fn recover_bounds(enemy: &mut Enemy, ctx: &AiContext<'_>) {
    let tile = ctx.projection.world_to_tile(enemy.position);
    if !ctx.grid.in_bounds(tile) {
        let center = ctx.grid.center_tile();
        debug!("Enemy {} off grid at ({}, {}), recentered", enemy.id, tile.x, tile.y);
        enemy.position = ctx.projection.tile_to_world(center);
        enemy.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct World {
        grid: DungeonGrid,
        projection: IsoProjection,
        config: SimulationConfig,
        ids: IdAllocator,
        rng: fastrand::Rng,
        events: EventBus,
        manager: EnemyManager,
    }

    impl World {
        fn open(size: usize) -> Self {
            let row = ".".repeat(size);
            let lines: Vec<&str> = (0..size).map(|_| row.as_str()).collect();
            Self::with_grid(DungeonGrid::from_ascii(&lines).unwrap())
        }

        fn with_grid(grid: DungeonGrid) -> Self {
            Self {
                grid,
                projection: IsoProjection::default(),
                config: SimulationConfig::default(),
                ids: IdAllocator::new(),
                rng: fastrand::Rng::with_seed(11),
                events: EventBus::new(1 << 16),
                manager: EnemyManager::default(),
            }
        }

        fn ctx(&self, player: Vec2, now: f64, dt: f32) -> AiContext<'_> {
            AiContext {
                grid: &self.grid,
                projection: &self.projection,
                config: &self.config,
                player,
                now,
                dt,
            }
        }

        fn spawn(&mut self, tile: TileCoord, archetype: Archetype) -> EntityId {
            let ctx = AiContext {
                grid: &self.grid,
                projection: &self.projection,
                config: &self.config,
                player: Vec2::ZERO,
                now: 0.0,
                dt: 0.0,
            };
            self.manager
                .try_spawn(&ctx, &mut self.ids, &mut self.rng, tile, archetype)
                .unwrap()
        }

        fn step(&mut self, player: Vec2, now: f64, dt: f32) -> Vec<EnemyAction> {
            let ctx = AiContext {
                grid: &self.grid,
                projection: &self.projection,
                config: &self.config,
                player,
                now,
                dt,
            };
            self.manager.update(&ctx, &mut self.rng, &self.events)
        }

        fn tile(&self, x: i32, y: i32) -> Vec2 {
            self.projection.tile_to_world(TileCoord::new(x, y))
        }

        fn state(&self, id: EntityId) -> EnemyState {
            self.manager.get(id).unwrap().state
        }
    }

    #[test]
    fn test_spawn_validation() {
        let mut world = World::with_grid(DungeonGrid::from_ascii(&["..#"]).unwrap());
        let ctx = world.ctx(Vec2::ZERO, 0.0, 0.0);
        let mut ids = IdAllocator::new();
        let mut rng = fastrand::Rng::with_seed(1);
        let mut manager = EnemyManager::new(ArchetypeTable::empty(), Pathfinder::default());

        assert_eq!(
            manager.try_spawn(&ctx, &mut ids, &mut rng, TileCoord::new(2, 0), Archetype::Normal),
            Err(SpawnError::InvalidTile(TileCoord::new(2, 0)))
        );
        assert_eq!(
            manager.try_spawn(&ctx, &mut ids, &mut rng, TileCoord::new(0, 0), Archetype::Boss),
            Err(SpawnError::MissingStats(Archetype::Boss))
        );
        assert!(matches!(
            manager.try_spawn_named(&ctx, &mut ids, &mut rng, TileCoord::new(0, 0), "dragon"),
            Err(SpawnError::UnknownArchetype(_))
        ));
        assert!(manager.is_empty());

        world.spawn(TileCoord::new(0, 0), Archetype::Boss);
        assert_eq!(world.manager.len(), 1);
    }

    #[test]
    fn test_spawn_rolls_cue_interval() {
        let mut world = World::open(8);
        for _ in 0..10 {
            world.spawn(TileCoord::new(3, 3), Archetype::Normal);
        }
        assert!(world
            .manager
            .iter()
            .all(|e| (2500.0..=3500.0).contains(&e.idle_cue_interval) && e.state == EnemyState::Patrol));
    }

    #[test]
    fn test_patrol_to_chase_only_when_visible() {
        let mut world = World::open(20);
        let id = world.spawn(TileCoord::new(5, 5), Archetype::Normal);
        let far = world.tile(5 + 15, 5);
        world.step(far, 0.0, 0.016);
        assert_eq!(world.state(id), EnemyState::Patrol);

        // Standing on the player still only goes to chase, never straight to attack.
        let here = world.manager.get(id).unwrap().position;
        world.step(here, 300.0, 0.0);
        assert_eq!(world.state(id), EnemyState::Chase);
    }

    #[test]
    fn test_wall_keeps_enemy_on_patrol() {
        let lines = ["....#....", "....#....", "....#...."];
        let mut world = World::with_grid(DungeonGrid::from_ascii(&lines).unwrap());
        let id = world.spawn(TileCoord::new(1, 1), Archetype::Normal);
        let player = world.tile(7, 1);
        for tick in 0..5 {
            world.step(player, f64::from(tick) * 300.0, 0.0);
            assert_eq!(world.state(id), EnemyState::Patrol);
        }
    }

    #[test]
    fn test_ranged_cooldown_window() {
        for frame_ms in [5.0, 16.0, 50.0] {
            let mut world = World::open(24);
            let id = world.spawn(TileCoord::new(5, 5), Archetype::Marksman);
            world.manager.get_mut(id).unwrap().attack_cooldown_ms = 1500.0;
            let player = world.tile(9, 5);

            let mut shots = Vec::new();
            let mut now = 0.0;
            while now <= 6000.0 {
                for action in world.step(player, now, (frame_ms / 1000.0) as f32) {
                    assert!(matches!(action, EnemyAction::Shoot { enemy, .. } if enemy == id));
                    shots.push(now);
                }
                now += frame_ms;
            }
            assert!(!shots.is_empty(), "frame {frame_ms}");
            assert!(shots.len() <= 4, "frame {frame_ms}: {shots:?}");
            assert!(shots.windows(2).all(|w| w[1] - w[0] >= 1500.0), "frame {frame_ms}: {shots:?}");
        }
    }

    #[test]
    fn test_melee_strike_in_attack() {
        let mut world = World::open(12);
        let id = world.spawn(TileCoord::new(5, 5), Archetype::Heavy);
        let position = world.manager.get(id).unwrap().position;
        {
            let enemy = world.manager.get_mut(id).unwrap();
            enemy.state = EnemyState::Attack;
            enemy.last_attack = -10_000.0;
        }
        let actions = world.step(position + Vec2::new(10.0, 0.0), 0.0, 0.0);
        let damage = world.manager.get(id).unwrap().damage * HEAVY_DAMAGE_FACTOR;
        assert_eq!(actions, vec![EnemyAction::Strike { enemy: id, damage }]);

        // Cooldown blocks a second strike on the next tick.
        assert!(world.step(position, 300.0, 0.0).is_empty());
    }

    #[test]
    fn test_flee_and_recover() {
        let mut world = World::open(20);
        let id = world.spawn(TileCoord::new(8, 8), Archetype::Normal);
        let position = world.manager.get(id).unwrap().position;
        let player = position + Vec2::new(10.0, 0.0);
        {
            let enemy = world.manager.get_mut(id).unwrap();
            let flee_at = enemy.profile().flee_health;
            let to_remove = enemy.health() - flee_at + 1.0;
            enemy.apply_damage(to_remove, 0.0);
            enemy.state = EnemyState::Attack;
        }
        world.step(player, 0.0, 0.0);
        assert_eq!(world.state(id), EnemyState::Flee);
        assert!(world.manager.get(id).unwrap().velocity.x < 0.0);

        world.manager.get_mut(id).unwrap().heal(100.0);
        world.step(player, 300.0, 0.0);
        assert_eq!(world.state(id), EnemyState::Chase);
    }

    #[test]
    fn test_flee_regenerates() {
        let mut world = World::open(20);
        let id = world.spawn(TileCoord::new(8, 8), Archetype::Boss);
        {
            let enemy = world.manager.get_mut(id).unwrap();
            enemy.apply_damage(145.0, 0.0);
            enemy.state = EnemyState::Flee;
            enemy.last_move = 0.0;
        }
        let before = world.manager.get(id).unwrap().health();
        let player = world.tile(0, 0);
        world.step(player, 100.0, 1.0);
        let after = world.manager.get(id).unwrap().health();
        assert!((after - before - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_idle_timeout_forces_patrol() {
        let mut world = World::open(20);
        let id = world.spawn(TileCoord::new(3, 3), Archetype::Normal);
        {
            let enemy = world.manager.get_mut(id).unwrap();
            enemy.state = EnemyState::Chase;
            enemy.locomotion = Locomotion::FollowPath(vec![TileCoord::new(4, 3)].into());
            enemy.last_move = 0.0;
        }
        world.step(world.tile(3, 4), 5001.0, 0.0);
        let enemy = world.manager.get(id).unwrap();
        assert_eq!(enemy.state, EnemyState::Patrol);
        assert!(enemy.path().is_none());
    }

    #[test]
    fn test_chase_follows_path_toward_player() {
        let lines = [".........", "....#....", "....#....", "........."];
        let mut world = World::with_grid(DungeonGrid::from_ascii(&lines).unwrap());
        let id = world.spawn(TileCoord::new(1, 2), Archetype::Normal);
        world.manager.get_mut(id).unwrap().state = EnemyState::Chase;
        let player = world.tile(7, 2);
        let start = world.manager.get(id).unwrap().distance_to(player);

        let mut now = 0.0;
        for _ in 0..120 {
            world.step(player, now, 0.016);
            now += 16.0;
        }
        let enemy = world.manager.get(id).unwrap();
        assert!(enemy.distance_to(player) < start);
        let tile = world.projection.world_to_tile(enemy.position);
        assert!(world.grid.is_passable(tile));
    }

    #[test]
    fn test_bounds_recovery() {
        let mut world = World::open(10);
        let id = world.spawn(TileCoord::new(2, 2), Archetype::Normal);
        world.manager.get_mut(id).unwrap().position = Vec2::new(-5000.0, 9000.0);
        world.step(Vec2::splat(50_000.0), 0.0, 0.016);
        let enemy = world.manager.get(id).unwrap();
        assert_eq!(enemy.position, world.tile(5, 5));
        assert_eq!(enemy.velocity, Vec2::ZERO);
        assert!(enemy.path().is_none());
    }

    #[test]
    fn test_contact_zeroes_velocities() {
        let mut world = World::open(10);
        let a = world.spawn(TileCoord::new(4, 4), Archetype::Normal);
        let b = world.spawn(TileCoord::new(4, 4), Archetype::Normal);
        for (id, dir) in [(a, Vec2::X), (b, Vec2::NEG_X)] {
            let enemy = world.manager.get_mut(id).unwrap();
            enemy.locomotion = Locomotion::Heading(dir);
            enemy.move_speed = 50.0;
        }
        // The first update is a decision tick; the second is not, so the headings stay.
        world.step(world.tile(0, 0), 0.0, 0.0);
        world.manager.get_mut(a).unwrap().locomotion = Locomotion::Heading(Vec2::X);
        world.manager.get_mut(b).unwrap().locomotion = Locomotion::Heading(Vec2::NEG_X);
        world.step(world.tile(0, 0), 10.0, 0.01);
        assert_eq!(world.manager.get(a).unwrap().velocity, Vec2::ZERO);
        assert_eq!(world.manager.get(b).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn test_lonely_enemy_dozes() {
        let mut world = World::open(20);
        let id = world.spawn(TileCoord::new(2, 2), Archetype::Normal);
        let far = world.tile(18, 2);
        let mut now = 0.0;
        while now <= 8000.0 {
            world.step(far, now, 0.016);
            now += 100.0;
        }
        let cues = world
            .events
            .drain()
            .into_iter()
            .filter(|e| matches!(e, CombatEvent::EnemyCue { entity, cue: IdleCue::Sleep } if *entity == id))
            .count();
        assert!(cues >= 2);
        assert_eq!(world.manager.get(id).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn test_remove_destroyed() {
        let mut world = World::open(6);
        let a = world.spawn(TileCoord::new(1, 1), Archetype::Normal);
        let b = world.spawn(TileCoord::new(2, 2), Archetype::Normal);
        world.manager.get_mut(a).unwrap().mark_destroyed();
        assert_eq!(world.manager.remove_destroyed(), vec![a]);
        assert!(world.manager.get(a).is_none());
        assert!(world.manager.get(b).is_some());
    }

    #[test]
    fn test_fast_flanks_beside_the_player() {
        let mut world = World::open(30);
        let id = world.spawn(TileCoord::new(10, 10), Archetype::Fast);
        let position = world.manager.get(id).unwrap().position;
        {
            let enemy = world.manager.get_mut(id).unwrap();
            enemy.state = EnemyState::Chase;
            enemy.last_flank = -10_000.0;
        }
        let player = position + Vec2::new(100.0, 0.0);

        world.step(player, 0.0, 0.0);
        let enemy = world.manager.get(id).unwrap();
        let Locomotion::Toward(flank) = enemy.locomotion else {
            panic!("expected a flank point, got {:?}", enemy.locomotion);
        };
        assert!((flank.distance(player) - world.config.flank_distance).abs() < 1e-3);
        assert!((flank - player).dot(player - position).abs() < 1e-2);
        assert_eq!(enemy.move_speed, enemy.speed * world.config.flank_speed_factor);
        assert_eq!(enemy.last_flank, 0.0);

        // The flank point holds until the interval comes round again.
        world.step(player, 300.0, 0.0);
        let enemy = world.manager.get(id).unwrap();
        assert_eq!(enemy.locomotion, Locomotion::Toward(flank));
        assert_eq!(enemy.last_flank, 0.0);

        world.step(player, 2000.0, 0.0);
        assert_eq!(world.manager.get(id).unwrap().last_flank, 2000.0);
    }

    #[test]
    fn test_random_picks_a_new_point_every_second() {
        let mut world = World::open(30);
        let id = world.spawn(TileCoord::new(10, 10), Archetype::Random);
        let position = world.manager.get(id).unwrap().position;
        world.manager.get_mut(id).unwrap().state = EnemyState::Chase;
        let player = position + Vec2::new(150.0, 0.0);

        world.step(player, 0.0, 0.0);
        assert!(world.manager.get(id).unwrap().path().is_some());

        world.step(player, 1000.0, 0.0);
        let enemy = world.manager.get(id).unwrap();
        assert_eq!(enemy.last_random_move, 1000.0);
        match enemy.locomotion {
            Locomotion::Toward(point) => {
                assert!(point.distance(position) <= world.config.random_target_range + 1e-3);
            },
            // Landed within reach of its own position.
            Locomotion::Idle => {},
            ref other => panic!("expected a random point, got {other:?}"),
        }

        world.step(player, 1300.0, 0.0);
        assert_eq!(world.manager.get(id).unwrap().last_random_move, 1000.0);
        world.step(player, 2000.0, 0.0);
        assert_eq!(world.manager.get(id).unwrap().last_random_move, 2000.0);
    }

    #[test]
    fn test_marksman_backs_off_when_crowded() {
        let mut world = World::open(30);
        let id = world.spawn(TileCoord::new(10, 10), Archetype::Marksman);
        let position = world.manager.get(id).unwrap().position;
        {
            let enemy = world.manager.get_mut(id).unwrap();
            enemy.state = EnemyState::Attack;
            enemy.attack_range = 250.0;
        }

        world.step(position + Vec2::new(100.0, 0.0), 0.0, 0.0);
        let enemy = world.manager.get(id).unwrap();
        assert_eq!(enemy.state, EnemyState::Attack);
        assert!(enemy.velocity.x < 0.0);
        assert!((enemy.velocity.length() - enemy.speed).abs() < 1e-3);
        assert!(enemy.velocity.y.abs() < 1e-3);

        // Past half range it holds position and keeps shooting.
        world.step(position + Vec2::new(200.0, 0.0), 300.0, 0.0);
        let enemy = world.manager.get(id).unwrap();
        assert_eq!(enemy.state, EnemyState::Attack);
        assert_eq!(enemy.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_attack_gives_up_past_the_exit_margin() {
        let mut world = World::open(30);
        let id = world.spawn(TileCoord::new(10, 10), Archetype::Normal);
        let position = world.manager.get(id).unwrap().position;
        let range = {
            let enemy = world.manager.get_mut(id).unwrap();
            enemy.state = EnemyState::Attack;
            enemy.attack_range
        };

        world.step(position + Vec2::new(range * 1.05, 0.0), 0.0, 0.0);
        assert_eq!(world.state(id), EnemyState::Attack);

        world.step(position + Vec2::new(range * 1.2, 0.0), 300.0, 0.0);
        assert_eq!(world.state(id), EnemyState::Chase);
        let changed = world.events.drain().into_iter().any(|e| {
            matches!(e, CombatEvent::EnemyStateChanged { entity, from: EnemyState::Attack, to: EnemyState::Chase }
                if entity == id)
        });
        assert!(changed);
    }

    #[test]
    fn test_disengage_distance_depends_on_personality() {
        let cases = [
            (450.0, Personality::Aggressive, EnemyState::Chase),
            (450.0, Personality::Cautious, EnemyState::Patrol),
            (450.0, Personality::Reckless, EnemyState::Patrol),
            (360.0, Personality::Aggressive, EnemyState::Chase),
            (360.0, Personality::Cautious, EnemyState::Patrol),
            (360.0, Personality::Reckless, EnemyState::Chase),
        ];
        for (distance, personality, expected) in cases {
            let mut world = World::open(40);
            let id = world.spawn(TileCoord::new(10, 10), Archetype::Normal);
            let position = world.manager.get(id).unwrap().position;
            {
                let enemy = world.manager.get_mut(id).unwrap();
                enemy.state = EnemyState::Chase;
                enemy.personality = personality;
            }
            world.step(position + Vec2::new(distance, 0.0), 0.0, 0.0);
            assert_eq!(world.state(id), expected, "{personality:?} at {distance}");
        }
    }

    #[test]
    fn test_flee_stride_follows_personality() {
        for (personality, stride) in [(Personality::Aggressive, 1.0), (Personality::Cautious, 1.5)] {
            let mut world = World::open(20);
            let id = world.spawn(TileCoord::new(8, 8), Archetype::Normal);
            let position = world.manager.get(id).unwrap().position;
            {
                let enemy = world.manager.get_mut(id).unwrap();
                enemy.personality = personality;
                enemy.state = EnemyState::Flee;
                let to_remove = enemy.health() - 5.0;
                enemy.apply_damage(to_remove, 0.0);
            }
            world.step(position + Vec2::new(10.0, 0.0), 0.0, 0.0);
            let enemy = world.manager.get(id).unwrap();
            assert_eq!(enemy.state, EnemyState::Flee);
            let expected = enemy.speed * world.config.flee_speed_factor * stride;
            assert!((enemy.move_speed - expected).abs() < 1e-4, "{personality:?}");
            assert!((enemy.velocity.length() - expected).abs() < 1e-3, "{personality:?}");
        }
    }

    #[test]
    fn test_melee_attack_paths_in_at_approach_speed() {
        let cases = [
            (Archetype::Normal, Personality::Aggressive, 0.5),
            (Archetype::Normal, Personality::Cautious, 0.3),
            (Archetype::Heavy, Personality::Cautious, 0.3 * HEAVY_MOVE_FACTOR),
        ];
        for (archetype, personality, factor) in cases {
            let mut world = World::open(30);
            let id = world.spawn(TileCoord::new(10, 10), archetype);
            {
                let enemy = world.manager.get_mut(id).unwrap();
                enemy.state = EnemyState::Attack;
                enemy.personality = personality;
                enemy.attack_range = 40.0;
            }
            // One tile over: past 80% of range, inside the exit margin.
            let player = world.tile(11, 10);
            world.step(player, 0.0, 0.0);

            let enemy = world.manager.get(id).unwrap();
            assert_eq!(enemy.state, EnemyState::Attack, "{archetype}");
            assert_eq!(enemy.path().and_then(|p| p.back()), Some(&TileCoord::new(11, 10)), "{archetype}");
            assert!((enemy.move_speed - enemy.speed * factor).abs() < 1e-4, "{archetype} {personality:?}");
            assert!((enemy.velocity.length() - enemy.speed * factor).abs() < 1e-3, "{archetype} {personality:?}");
        }
    }
}
