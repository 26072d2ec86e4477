//! Adaptive Coordinator
//!
//! Turns the outcome tracker's multiplier and the near-miss rate into
//! smoothed pacing multipliers. Runs on its own cadence, gated by an
//! elapsed-time accumulator on the session thread.
//!
//! The simulation never reads the coordinator directly. A level receives an
//! [`AdaptiveSnapshot`] at start and keeps it for the whole attempt, so a
//! replay carrying the snapshot reproduces the same spawn draws.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::near_miss::NearMissDetector;
use super::outcome::OutcomeTracker;

/// Coordinator tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Adaptive mode on/off. Off pins every multiplier to neutral.
    pub enabled: bool,
    /// Seconds between evaluations.
    pub cadence: f64,
    /// Fraction of the gap to target closed per evaluation, 0..=1.
    pub smoothing: f64,
    /// Near misses per minute above which targets are eased.
    pub penalty_rate: f64,
    /// Target scale while the near-miss penalty is active.
    pub penalty_scale: f64,
    /// Immediate scale applied on a spike, bypassing smoothing.
    pub spike_relief: f64,
    /// Belt speed multiplier range.
    pub belt_speed_range: (f64, f64),
    /// Spawn rate multiplier range.
    pub spawn_rate_range: (f64, f64),
    /// Obstacle density multiplier range.
    pub obstacle_range: (f64, f64),
    /// Bound on the absolute spawn tension bias.
    pub tension_max: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cadence: 2.0,
            smoothing: 0.25,
            penalty_rate: 6.0,
            penalty_scale: 0.85,
            spike_relief: 0.75,
            belt_speed_range: (0.6, 1.5),
            spawn_rate_range: (0.6, 1.5),
            obstacle_range: (0.0, 1.5),
            tension_max: 0.5,
        }
    }
}

/// Multipliers frozen at level start.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveSnapshot {
    /// Conveyor speed multiplier.
    pub belt_speed: f64,
    /// Spawn rate multiplier (divides the spawn interval).
    pub spawn_rate: f64,
    /// Obstacle density multiplier.
    pub obstacle_density: f64,
    /// Weight bias for item types one cell short of a cluster.
    /// Positive helps the player, negative withholds.
    pub tension_bias: f64,
    /// Outcome multiplier the snapshot was taken from.
    pub difficulty_multiplier: f64,
}

impl AdaptiveSnapshot {
    /// No adjustment.
    pub const NEUTRAL: AdaptiveSnapshot = AdaptiveSnapshot {
        belt_speed: 1.0,
        spawn_rate: 1.0,
        obstacle_density: 1.0,
        tension_bias: 0.0,
        difficulty_multiplier: 1.0,
    };
}

impl Default for AdaptiveSnapshot {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Smoothed pacing multipliers persisted across levels.
#[derive(Clone, Debug)]
pub struct AdaptiveCoordinator {
    config: AdaptiveConfig,
    belt_speed: f64,
    spawn_rate: f64,
    obstacle_density: f64,
    accumulator: f64,
    penalty_active: bool,
    last_difficulty: f64,
}

impl AdaptiveCoordinator {
    /// Create at neutral multipliers.
    pub fn new(config: AdaptiveConfig) -> Self {
        Self {
            config,
            belt_speed: 1.0,
            spawn_rate: 1.0,
            obstacle_density: 1.0,
            accumulator: 0.0,
            penalty_active: false,
            last_difficulty: 1.0,
        }
    }

    /// Advance the cadence clock. Returns true when an evaluation ran.
    pub fn update(&mut self, dt: f64, outcome: &OutcomeTracker, near_miss: &NearMissDetector) -> bool {
        if !self.config.enabled {
            return false;
        }
        self.accumulator += dt;
        if self.accumulator < self.config.cadence {
            return false;
        }
        self.accumulator -= self.config.cadence;
        self.evaluate(outcome.difficulty_multiplier(), near_miss.near_miss_rate_per_minute());
        true
    }

    /// One cadence step with explicit inputs.
    pub fn evaluate(&mut self, difficulty: f64, near_miss_rate: f64) {
        let c = &self.config;
        let mut belt = 0.5 + 0.5 * difficulty;
        let mut spawn = 0.4 + 0.6 * difficulty;
        let mut obstacle = difficulty * difficulty;

        self.penalty_active = near_miss_rate > c.penalty_rate;
        if self.penalty_active {
            belt *= c.penalty_scale;
            spawn *= c.penalty_scale;
            obstacle *= c.penalty_scale;
        }

        let belt = clamp_range(belt, c.belt_speed_range);
        let spawn = clamp_range(spawn, c.spawn_rate_range);
        let obstacle = clamp_range(obstacle, c.obstacle_range);

        let s = c.smoothing.clamp(0.0, 1.0);
        self.belt_speed += (belt - self.belt_speed) * s;
        self.spawn_rate += (spawn - self.spawn_rate) * s;
        self.obstacle_density += (obstacle - self.obstacle_density) * s;
        self.last_difficulty = difficulty;

        debug!(
            difficulty,
            near_miss_rate,
            belt = self.belt_speed,
            spawn = self.spawn_rate,
            obstacle = self.obstacle_density,
            penalty = self.penalty_active,
            "Adaptive cadence"
        );
    }

    /// React to a spike signal. Entering a spike cuts every multiplier at
    /// once; leaving it hands control back to the smoothed path.
    pub fn on_spike(&mut self, entered: bool) {
        if !self.config.enabled || !entered {
            return;
        }
        let c = &self.config;
        self.belt_speed = clamp_range(self.belt_speed * c.spike_relief, c.belt_speed_range);
        self.spawn_rate = clamp_range(self.spawn_rate * c.spike_relief, c.spawn_rate_range);
        self.obstacle_density = clamp_range(self.obstacle_density * c.spike_relief, c.obstacle_range);
        info!(
            belt = self.belt_speed,
            spawn = self.spawn_rate,
            obstacle = self.obstacle_density,
            "Spike relief applied"
        );
    }

    /// Toggle adaptive mode. Disabling resets to neutral.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
        if !enabled {
            self.belt_speed = 1.0;
            self.spawn_rate = 1.0;
            self.obstacle_density = 1.0;
            self.accumulator = 0.0;
            self.penalty_active = false;
            self.last_difficulty = 1.0;
        }
    }

    /// True while adaptive mode is on.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Values to freeze into the next level.
    pub fn snapshot(&self) -> AdaptiveSnapshot {
        if !self.config.enabled {
            return AdaptiveSnapshot::NEUTRAL;
        }
        let mut bias = (1.0 - self.last_difficulty) * 0.5;
        if self.penalty_active {
            bias += 0.25;
        }
        AdaptiveSnapshot {
            belt_speed: self.belt_speed,
            spawn_rate: self.spawn_rate,
            obstacle_density: self.obstacle_density,
            tension_bias: bias.clamp(-self.config.tension_max, self.config.tension_max),
            difficulty_multiplier: self.last_difficulty,
        }
    }

    /// Mean of the three multipliers. Presentation only.
    pub fn combined_difficulty_factor(&self) -> f64 {
        (self.belt_speed + self.spawn_rate + self.obstacle_density) / 3.0
    }

    /// Current belt speed multiplier.
    pub fn belt_speed(&self) -> f64 {
        self.belt_speed
    }

    /// Current spawn rate multiplier.
    pub fn spawn_rate(&self) -> f64 {
        self.spawn_rate
    }

    /// Current obstacle density multiplier.
    pub fn obstacle_density(&self) -> f64 {
        self.obstacle_density
    }

    /// True if the last evaluation eased off for near misses.
    pub fn penalty_active(&self) -> bool {
        self.penalty_active
    }

    /// Tuning in use.
    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }
}

fn clamp_range(value: f64, (lo, hi): (f64, f64)) -> f64 {
    value.clamp(lo, hi)
}

// ===== TESTS =====
