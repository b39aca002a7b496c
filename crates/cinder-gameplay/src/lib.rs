//! # Cinder Gameplay
//!
//! Combat simulation core for Cinder, a top-down isometric roguelite.
//!
//! This crate owns everything that decides what happens in a fight:
//! - Dungeon grid and tile queries
//! - Cached Dijkstra pathfinding
//! - Enemy perception (range, cone, line of sight)
//! - Enemy archetypes, personalities and the behavior state machine
//! - Weapon stats, skill effects and secondary weapons
//! - Projectiles, ordnance and fire patches
//! - Damage, explosion and chain resolution
//! - Deferred actions and the combat event bus
//!
//! Rendering, audio, input and UI live with collaborators that drain the
//! [`EventBus`] each frame.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod combat;
pub mod config;
pub mod enemy;
pub mod enemy_ai;
pub mod events;
pub mod grid;
pub mod ordnance;
pub mod pathfinding;
pub mod perception;
pub mod player;
pub mod projectile;
pub mod schedule;
pub mod simulation;
pub mod stats;
pub mod weapon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::combat::*;
    pub use crate::config::*;
    pub use crate::enemy::*;
    pub use crate::enemy_ai::*;
    pub use crate::events::*;
    pub use crate::grid::*;
    pub use crate::ordnance::*;
    pub use crate::pathfinding::*;
    pub use crate::perception::*;
    pub use crate::player::*;
    pub use crate::projectile::*;
    pub use crate::schedule::*;
    pub use crate::simulation::*;
    pub use crate::stats::*;
    pub use crate::weapon::*;
}

pub use prelude::*;
