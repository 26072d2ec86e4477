//! Engine Configuration
//!
//! Validated tuning for the simulation and the difficulty layer. Built once
//! at startup (usually from JSON) and passed by reference.

use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::difficulty::adaptive::AdaptiveConfig;
use crate::difficulty::near_miss::NearMissConfig;
use crate::difficulty::outcome::OutcomeConfig;
use crate::game::booster::BoosterConfig;
use crate::game::item::ItemCatalog;
use crate::game::level::LevelLimits;

/// Per-level simulation tuning not carried by `LevelDef`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Belt queue capacity.
    pub queue_capacity: usize,
    /// Belt length in units; items reaching the end drop into pockets.
    pub belt_length: f64,
    /// Apply gravity after each clear.
    pub settle: bool,
    /// Item capabilities.
    pub catalog: ItemCatalog,
    /// Booster tuning.
    pub booster: BoosterConfig,
    /// Level field ranges for validation, generation and adaptive clamping.
    pub limits: LevelLimits,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 8,
            belt_length: 10.0,
            settle: true,
            catalog: ItemCatalog::default(),
            booster: BoosterConfig::default(),
            limits: LevelLimits::default(),
        }
    }
}

/// Complete engine tuning.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulation tuning.
    pub simulation: SimulationConfig,
    /// Outcome tracker tuning.
    pub outcome: OutcomeConfig,
    /// Near-miss detector tuning.
    pub near_miss: NearMissConfig,
    /// Adaptive coordinator tuning.
    pub adaptive: AdaptiveConfig,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON did not match the schema.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid {field}: {reason}")]
    Invalid {
        /// Offending field path.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn check_bounds<T: PartialOrd + std::fmt::Display>(field: &'static str, (lo, hi): (T, T), min: T) -> Result<(), ConfigError> {
    if lo < min || lo > hi {
        return Err(invalid(field, format!("bad range ({lo}, {hi}), lower bound must be at least {min}")));
    }
    Ok(())
}

fn check_range(field: &'static str, (lo, hi): (f64, f64)) -> Result<(), ConfigError> {
    if !lo.is_finite() || !hi.is_finite() || lo > hi {
        return Err(invalid(field, format!("bad range ({lo}, {hi})")));
    }
    Ok(())
}

impl EngineConfig {
    /// Parse and validate JSON. Missing sections take defaults.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), "Engine config loaded");
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.queue_capacity == 0 {
            return Err(invalid("simulation.queue_capacity", "must be at least 1"));
        }
        if !positive(sim.belt_length) {
            return Err(invalid("simulation.belt_length", "must be positive"));
        }
        let scale = sim.booster.slow_motion_scale;
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(invalid("simulation.booster.slow_motion_scale", "must be in (0, 1]"));
        }
        if !positive(sim.booster.slow_motion_duration) {
            return Err(invalid("simulation.booster.slow_motion_duration", "must be positive"));
        }
        if sim.catalog.obstacle < 0 {
            return Err(invalid("simulation.catalog.obstacle", "must be a non-negative id"));
        }

        let l = &sim.limits;
        check_bounds("simulation.limits.board_width", l.board_width, 1)?;
        check_bounds("simulation.limits.board_height", l.board_height, 1)?;
        check_bounds("simulation.limits.min_cluster", l.min_cluster, 1)?;
        check_range("simulation.limits.spawn_interval", l.spawn_interval)?;
        if l.spawn_interval.0 <= 0.0 {
            return Err(invalid("simulation.limits.spawn_interval", "must stay positive"));
        }
        check_range("simulation.limits.conveyor_speed", l.conveyor_speed)?;
        if l.conveyor_speed.0 <= 0.0 {
            return Err(invalid("simulation.limits.conveyor_speed", "must stay positive"));
        }
        check_bounds("simulation.limits.target_progress", l.target_progress, 1)?;
        check_bounds("simulation.limits.max_spawn", l.max_spawn, 1)?;
        check_bounds("simulation.limits.item_type_count", l.item_type_count, 1)?;
        check_range("simulation.limits.obstacle_density", l.obstacle_density)?;
        if l.obstacle_density.0 < 0.0 || l.obstacle_density.1 > 1.0 {
            return Err(invalid("simulation.limits.obstacle_density", "must be within [0, 1]"));
        }
        check_bounds("simulation.limits.pocket_count", l.pocket_count, 1)?;
        check_bounds("simulation.limits.pocket_capacity", l.pocket_capacity, 1)?;

        let o = &self.outcome;
        if o.window_size == 0 {
            return Err(invalid("outcome.window_size", "must be at least 1"));
        }
        check_range("outcome.min_difficulty", (o.min_difficulty, o.max_difficulty))?;
        if o.base_difficulty < o.min_difficulty || o.base_difficulty > o.max_difficulty {
            return Err(invalid("outcome.base_difficulty", "outside min..max"));
        }
        if o.difficulty_step.is_nan() || o.difficulty_step < 0.0 {
            return Err(invalid("outcome.difficulty_step", "must be non-negative"));
        }
        if o.low_win_rate > o.high_win_rate {
            return Err(invalid("outcome.low_win_rate", "above high_win_rate"));
        }

        let n = &self.near_miss;
        if !(n.epsilon >= 0.0 && n.near_miss_distance > n.epsilon) {
            return Err(invalid("near_miss.near_miss_distance", "must exceed epsilon"));
        }
        if !positive(n.time_window) {
            return Err(invalid("near_miss.time_window", "must be positive"));
        }
        if n.streak_clear_below > n.streak_count {
            return Err(invalid("near_miss.streak_clear_below", "above streak_count"));
        }

        let a = &self.adaptive;
        if !positive(a.cadence) {
            return Err(invalid("adaptive.cadence", "must be positive"));
        }
        if !(0.0..=1.0).contains(&a.smoothing) {
            return Err(invalid("adaptive.smoothing", "must be in [0, 1]"));
        }
        if !(a.spike_relief > 0.0 && a.spike_relief <= 1.0) {
            return Err(invalid("adaptive.spike_relief", "must be in (0, 1]"));
        }
        check_range("adaptive.belt_speed_range", a.belt_speed_range)?;
        check_range("adaptive.spawn_rate_range", a.spawn_rate_range)?;
        check_range("adaptive.obstacle_range", a.obstacle_range)?;
        if a.spawn_rate_range.0 <= 0.0 {
            return Err(invalid("adaptive.spawn_rate_range", "must stay positive"));
        }
        if !(a.tension_max >= 0.0 && a.tension_max <= 1.0) {
            return Err(invalid("adaptive.tension_max", "must be in [0, 1]"));
        }

        Ok(())
    }
}

// ===== TESTS =====
