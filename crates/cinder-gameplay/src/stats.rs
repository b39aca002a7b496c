//! Run statistics collected by the simulation.

use serde::{Deserialize, Serialize};

/// Counters for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStats {
    /// Enemies destroyed
    pub kills: u32,
    /// Experience granted
    pub xp: u64,
    /// Player projectiles fired
    pub shots_fired: u64,
    /// Explosions resolved (including chains)
    pub explosions: u32,
    /// Total damage dealt to enemies
    pub damage_dealt: f32,
    /// Total damage the player took
    pub damage_taken: f32,
    /// Critical hits landed
    pub critical_hits: u32,
    /// Enemy bullets reflected
    pub deflections: u32,
}

impl SimulationStats {
    /// Records a kill and its experience.
    pub fn record_kill(&mut self, xp: u32) {
        self.kills += 1;
        self.xp += u64::from(xp);
    }
}
