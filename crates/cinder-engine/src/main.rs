//! # Cinder Engine
//!
//! Headless runner for the Cinder combat simulation.
//!
//! Usage: `cinder [config.toml] [archetypes.json]`
//!
//! Loads the simulation config (defaults if the file is missing), builds the
//! demo dungeon, equips a starting loadout and drives the simulation at a
//! fixed frame rate, logging a summary at the end.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod arena;
mod runner;

use anyhow::{Context, Result};
use cinder_common::{IsoProjection, TileCoord};
use cinder_gameplay::{ArchetypeTable, Simulation, SimulationConfig, SkillOutcome};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Config file read when no path is given.
const DEFAULT_CONFIG_PATH: &str = "cinder.toml";
/// Simulated time budget for one run (ms).
const RUN_DURATION_MS: f64 = 120_000.0;

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("cinder=info".parse()?))
        .init();

    info!("Cinder starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let mut config = SimulationConfig::load_from(&config_path);
    config.validate();

    let grid = arena::build().context("building demo dungeon")?;
    let mut sim = Simulation::new(config, grid, IsoProjection::default());

    if let Some(path) = args.next() {
        let table = ArchetypeTable::load_from(&path).with_context(|| format!("loading archetypes from {path}"))?;
        sim = sim.with_archetypes(table);
        info!("Loaded archetypes from {path}");
    }

    let spawned = arena::SPAWNS
        .iter()
        .filter_map(|&(name, x, y)| sim.spawn_enemy_named(TileCoord::new(x, y), name))
        .count();
    info!("Spawned {spawned}/{} enemies", arena::SPAWNS.len());

    for effect in arena::loadout() {
        if let SkillOutcome::PassThrough(effect) = sim.apply_skill_effect(&effect) {
            warn!("Item effect {} has no weapon counterpart", effect.kind);
        }
    }

    let route: Vec<TileCoord> = arena::TOUR.iter().map(|&(x, y)| TileCoord::new(x, y)).collect();
    let mut runner = runner::Runner::new(sim, &route);
    let end = runner.run(RUN_DURATION_MS);
    runner.log_summary(end);

    info!("Cinder shutdown complete");
    Ok(())
}
