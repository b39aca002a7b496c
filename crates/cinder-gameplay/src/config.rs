//! Simulation tuning configuration.
//!
//! Every tunable constant of the combat core lives here. Configuration can be
//! loaded from and saved to a TOML file; missing keys fall back to defaults.

use cinder_common::CinderError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Configuration load/save errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid TOML for this schema
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Serialization failed
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for CinderError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Io(io) => Self::Io(io),
            other => Self::Config(other.to_string()),
        }
    }
}

/// Tuning parameters for the combat simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // === Determinism ===
    /// Seed for the simulation RNG
    pub seed: u64,

    // === AI ===
    /// Interval between AI decision ticks (ms)
    pub ai_tick_ms: f64,
    /// Time without movement before an enemy is forced back to patrol (ms)
    pub idle_timeout_ms: f64,
    /// Distance at which a waypoint counts as reached
    pub waypoint_reach: f32,
    /// Collision radius of an enemy
    pub enemy_radius: f32,
    /// Collision radius of the player
    pub player_radius: f32,
    /// No other enemy within this radius counts as "alone"
    pub solo_isolation_radius: f32,
    /// Player farther than this lets a lone enemy doze
    pub solo_player_distance: f32,
    /// Lower bound of the idle cue interval (ms)
    pub idle_cue_min_ms: f64,
    /// Upper bound of the idle cue interval (ms)
    pub idle_cue_max_ms: f64,
    /// Interval between patrol random walks (ms)
    pub random_walk_interval_ms: f64,
    /// Speed factor for patrol random walks
    pub random_walk_speed_factor: f32,
    /// Interval between flank point picks for fast enemies (ms)
    pub flank_interval_ms: f64,
    /// Sideways offset of a flank point
    pub flank_distance: f32,
    /// Speed factor while flanking
    pub flank_speed_factor: f32,
    /// Interval between random destination picks (ms)
    pub random_target_interval_ms: f64,
    /// Maximum distance of a random destination
    pub random_target_range: f32,
    /// Speed factor while fleeing
    pub flee_speed_factor: f32,
    /// Health regenerated per second while fleeing
    pub flee_regen_per_second: f32,
    /// Duration of the on-hit slow (ms)
    pub slow_duration_ms: f64,
    /// Movement factor while slowed
    pub slow_factor: f32,
    /// How long a health bar stays visible after a hit (ms)
    pub health_bar_visible_ms: f64,

    // === Projectiles ===
    /// Projectile lifetime (ms)
    pub projectile_lifetime_ms: f64,
    /// Maximum travel distance from the spawn point
    pub projectile_max_distance: f32,
    /// Collision radius of a projectile
    pub projectile_radius: f32,
    /// Angular gap between spread shots (radians)
    pub spread_angle: f32,
    /// Search radius for homing and redirects
    pub homing_radius: f32,
    /// Velocity interpolation factor per frame for homing
    pub homing_turn_rate: f32,
    /// Speed of enemy bullets
    pub enemy_bullet_speed: f32,

    // === Explosions ===
    /// Radius of on-hit and chain explosions
    pub explosion_radius: f32,
    /// Radius factor applied to each chained explosion
    pub chain_radius_factor: f32,
    /// Maximum chain hops after the originating blast
    pub max_chain_depth: u32,
    /// Gap between multi-explosion blasts (ms)
    pub multi_explosion_stagger_ms: f64,

    // === Plumbing ===
    /// Event bus capacity
    pub event_capacity: usize,
    /// Pathfinder goal-field cache size
    pub path_cache_size: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED_C1DE,

            ai_tick_ms: 300.0,
            idle_timeout_ms: 5000.0,
            waypoint_reach: 5.0,
            enemy_radius: 12.0,
            player_radius: 12.0,
            solo_isolation_radius: 200.0,
            solo_player_distance: 400.0,
            idle_cue_min_ms: 2500.0,
            idle_cue_max_ms: 3500.0,
            random_walk_interval_ms: 1500.0,
            random_walk_speed_factor: 0.3,
            flank_interval_ms: 2000.0,
            flank_distance: 100.0,
            flank_speed_factor: 1.2,
            random_target_interval_ms: 1000.0,
            random_target_range: 100.0,
            flee_speed_factor: 1.5,
            flee_regen_per_second: 1.0,
            slow_duration_ms: 2000.0,
            slow_factor: 0.5,
            health_bar_visible_ms: 3000.0,

            projectile_lifetime_ms: 2000.0,
            projectile_max_distance: 500.0,
            projectile_radius: 6.0,
            spread_angle: 0.15,
            homing_radius: 300.0,
            homing_turn_rate: 0.1,
            enemy_bullet_speed: 200.0,

            explosion_radius: 60.0,
            chain_radius_factor: 0.8,
            max_chain_depth: 1,
            multi_explosion_stagger_ms: 200.0,

            event_capacity: 4096,
            path_cache_size: 16,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a path.
    /// Returns defaults if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match Self::try_load_from(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to load config file: {e}");
                Self::default()
            },
        }
    }

    /// Load configuration from a path, surfacing errors.
    pub fn try_load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text and validate it.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        let mut config: Self = toml::from_str(contents)?;
        config.validate();
        Ok(config)
    }

    /// Save configuration to a path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp values into sensible ranges.
    pub fn validate(&mut self) {
        self.ai_tick_ms = self.ai_tick_ms.clamp(16.0, 5000.0);
        self.idle_timeout_ms = self.idle_timeout_ms.max(self.ai_tick_ms);
        self.waypoint_reach = self.waypoint_reach.clamp(0.5, 64.0);
        if self.idle_cue_max_ms < self.idle_cue_min_ms {
            std::mem::swap(&mut self.idle_cue_min_ms, &mut self.idle_cue_max_ms);
        }
        self.slow_factor = self.slow_factor.clamp(0.0, 1.0);
        self.homing_turn_rate = self.homing_turn_rate.clamp(0.0, 1.0);
        self.chain_radius_factor = self.chain_radius_factor.clamp(0.0, 1.0);
        self.max_chain_depth = self.max_chain_depth.min(8);
        self.projectile_lifetime_ms = self.projectile_lifetime_ms.max(1.0);
        self.event_capacity = self.event_capacity.max(16);
        self.path_cache_size = self.path_cache_size.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_tuning() {
        let config = SimulationConfig::default();
        assert_eq!(config.ai_tick_ms, 300.0);
        assert_eq!(config.idle_timeout_ms, 5000.0);
        assert_eq!(config.projectile_lifetime_ms, 2000.0);
        assert_eq!(config.projectile_max_distance, 500.0);
        assert_eq!(config.max_chain_depth, 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SimulationConfig::from_toml("seed = 7\nmax_chain_depth = 3\n").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_chain_depth, 3);
        assert_eq!(config.ai_tick_ms, 300.0);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            SimulationConfig::from_toml("seed = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = SimulationConfig {
            ai_tick_ms: 0.0,
            max_chain_depth: 100,
            idle_cue_min_ms: 4000.0,
            idle_cue_max_ms: 1000.0,
            ..SimulationConfig::default()
        };
        config.validate();
        assert_eq!(config.ai_tick_ms, 16.0);
        assert_eq!(config.max_chain_depth, 8);
        assert!(config.idle_cue_min_ms <= config.idle_cue_max_ms);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = SimulationConfig::load_from("/nonexistent/cinder/config.toml");
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SimulationConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(SimulationConfig::from_toml(&text).unwrap(), config);
    }
}
