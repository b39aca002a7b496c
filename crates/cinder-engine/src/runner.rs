//! Fixed-step headless driver with a scripted player.
//!
//! The player walks a looping route, shoots at the nearest enemy in range
//! and the run ends when the player falls, the dungeon is cleared, or the
//! time budget runs out.

use cinder_common::TileCoord;
use cinder_gameplay::{CombatEvent, Simulation};
use glam::Vec2;
use tracing::{debug, info};

/// Fixed frame length (ms).
pub const FRAME_MS: f64 = 16.0;
/// Player walking speed (units/s).
const PLAYER_SPEED: f32 = 120.0;
/// Distance at which the player opens fire.
const ENGAGE_RANGE: f32 = 350.0;
/// Distance at which a waypoint counts as reached.
const WAYPOINT_REACH: f32 = 4.0;

/// Event totals for the run summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventTally {
    /// Damage applications (both sides)
    pub damage: u32,
    /// Enemies destroyed
    pub kills: u32,
    /// Enemy state transitions
    pub transitions: u32,
    /// Explosions triggered
    pub explosions: u32,
    /// Hits taken by the player
    pub player_hits: u32,
    /// Rooms entered for the first time
    pub rooms: u32,
}

impl EventTally {
    fn record(&mut self, event: &CombatEvent) {
        match event {
            CombatEvent::DamageApplied { .. } => self.damage += 1,
            CombatEvent::EnemyDestroyed { .. } => self.kills += 1,
            CombatEvent::EnemyStateChanged { .. } => self.transitions += 1,
            CombatEvent::ExplosionTriggered { .. } => self.explosions += 1,
            CombatEvent::PlayerDamaged { .. } => self.player_hits += 1,
            _ => {},
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// Every enemy is dead
    Cleared,
    /// Player health reached zero
    PlayerDown,
    /// Time budget exhausted
    TimeUp,
}

/// Drives a [`Simulation`] at a fixed frame rate.
pub struct Runner {
    sim: Simulation,
    route: Vec<Vec2>,
    next_waypoint: usize,
    tally: EventTally,
    now: f64,
}

impl Runner {
    /// Creates a runner that walks `route` in a loop.
    pub fn new(sim: Simulation, route: &[TileCoord]) -> Self {
        let route = route.iter().map(|&tile| sim.projection().tile_to_world(tile)).collect();
        Self {
            sim,
            route,
            next_waypoint: 0,
            tally: EventTally::default(),
            now: 0.0,
        }
    }

    /// Runs until the run ends or `duration_ms` of simulated time passes.
    pub fn run(&mut self, duration_ms: f64) -> RunEnd {
        while self.now <= duration_ms {
            self.step();
            if !self.sim.player().is_alive() {
                return RunEnd::PlayerDown;
            }
            if self.sim.enemies().living_count() == 0 {
                return RunEnd::Cleared;
            }
            self.now += FRAME_MS;
        }
        RunEnd::TimeUp
    }

    fn step(&mut self) {
        self.walk();
        if self.sim.mark_room_visited().is_some() {
            self.tally.rooms += 1;
        }

        let origin = self.sim.player().position();
        let target = self
            .sim
            .enemies()
            .iter()
            .filter(|e| e.is_alive() && e.distance_to(origin) <= ENGAGE_RANGE)
            .min_by(|a, b| a.distance_to(origin).total_cmp(&b.distance_to(origin)))
            .map(|e| e.position);
        if let Some(target) = target {
            self.sim.fire(origin, target, self.now);
        }

        self.sim.update(self.now);
        for event in self.sim.events().drain() {
            self.tally.record(&event);
        }
    }

    fn walk(&mut self) {
        let Some(&goal) = self.route.get(self.next_waypoint) else {
            return;
        };
        let position = self.sim.player().position();
        let to_goal = goal - position;
        if to_goal.length() <= WAYPOINT_REACH {
            self.next_waypoint = (self.next_waypoint + 1) % self.route.len();
            return;
        }

        let stride = PLAYER_SPEED * (FRAME_MS / 1000.0) as f32;
        let next = position + to_goal.clamp_length_max(stride);
        let tile = self.sim.projection().world_to_tile(next);
        if self.sim.grid().is_passable(tile) {
            self.sim.player_mut().set_position(next);
        } else {
            debug!("Route blocked at ({}, {}), skipping waypoint", tile.x, tile.y);
            self.next_waypoint = (self.next_waypoint + 1) % self.route.len();
        }
    }

    /// Logs the run summary.
    pub fn log_summary(&self, end: RunEnd) {
        let stats = self.sim.stats();
        info!("Run ended: {end:?} after {:.1}s", self.now / 1000.0);
        info!(
            "Kills: {} ({} XP), shots fired: {}, explosions: {}",
            stats.kills, stats.xp, stats.shots_fired, stats.explosions
        );
        info!(
            "Damage dealt: {:.0}, taken: {:.0}, crits: {}, deflections: {}",
            stats.damage_dealt, stats.damage_taken, stats.critical_hits, stats.deflections
        );
        info!(
            "Player health: {:.0}/{:.0}, enemies left: {}, rooms entered: {}",
            self.sim.player().health(),
            self.sim.player().max_health(),
            self.sim.enemies().living_count(),
            self.tally.rooms
        );
        debug!(
            "Events: {} damage, {} kills, {} transitions, {} explosions, {} player hits",
            self.tally.damage, self.tally.kills, self.tally.transitions, self.tally.explosions, self.tally.player_hits
        );
    }

    /// Event totals so far.
    #[allow(dead_code)]
    pub fn tally(&self) -> &EventTally {
        &self.tally
    }

    /// The driven simulation.
    #[allow(dead_code)]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }
}
