//! Level Definitions
//!
//! `LevelDef` is the read-only configuration a level runs with. The only
//! sanctioned adjustment after creation is [`LevelDef::with_adaptive`],
//! applied once at level start from a frozen adaptive snapshot.

use serde::{Deserialize, Serialize};

use crate::core::rng::Seed;
use crate::difficulty::adaptive::AdaptiveSnapshot;

/// Level rhythm flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelFlags {
    /// Deliberately hard level.
    pub is_spike: bool,
    /// Breather after a spike.
    pub is_recovery: bool,
    /// Milestone level.
    pub is_anchor: bool,
    /// Level where a continue offer is expected.
    pub monetization_anchor: bool,
}

/// Level configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelDef {
    /// Level identifier.
    pub level_id: u32,
    /// RNG seed.
    pub seed: Seed,
    /// Board columns.
    pub board_width: i32,
    /// Board rows.
    pub board_height: i32,
    /// Minimum cluster size (at least 1).
    pub min_cluster: usize,
    /// Seconds between spawns (> 0).
    pub spawn_interval: f64,
    /// Belt units per second (> 0).
    pub conveyor_speed: f64,
    /// Cells to clear to win (> 0).
    pub target_progress: u32,
    /// Items spawned before the feed stops.
    pub max_spawn: u32,
    /// Distinct item types.
    pub item_type_count: u32,
    /// Fraction of board cells pre-filled with obstacles.
    pub obstacle_density: f64,
    /// Pocket count.
    pub pocket_count: usize,
    /// Items per pocket.
    pub pocket_capacity: usize,
    /// Rhythm flags.
    pub flags: LevelFlags,
    /// Intended win rate, 0..=1.
    pub target_win_rate: f64,
}

impl Default for LevelDef {
    fn default() -> Self {
        Self {
            level_id: 1,
            seed: 0,
            board_width: 6,
            board_height: 8,
            min_cluster: 3,
            spawn_interval: 1.5,
            conveyor_speed: 1.0,
            target_progress: 15,
            max_spawn: 60,
            item_type_count: 4,
            obstacle_density: 0.0,
            pocket_count: 3,
            pocket_capacity: 4,
            flags: LevelFlags::default(),
            target_win_rate: 0.6,
        }
    }
}

/// Valid ranges for every `LevelDef` field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelLimits {
    /// Board width range.
    pub board_width: (i32, i32),
    /// Board height range.
    pub board_height: (i32, i32),
    /// Minimum cluster range.
    pub min_cluster: (usize, usize),
    /// Spawn interval range (seconds).
    pub spawn_interval: (f64, f64),
    /// Conveyor speed range.
    pub conveyor_speed: (f64, f64),
    /// Target progress range.
    pub target_progress: (u32, u32),
    /// Spawn cap range.
    pub max_spawn: (u32, u32),
    /// Item type count range.
    pub item_type_count: (u32, u32),
    /// Obstacle density range.
    pub obstacle_density: (f64, f64),
    /// Pocket count range.
    pub pocket_count: (usize, usize),
    /// Pocket capacity range.
    pub pocket_capacity: (usize, usize),
}

impl Default for LevelLimits {
    fn default() -> Self {
        Self {
            board_width: (3, 12),
            board_height: (3, 16),
            min_cluster: (1, 6),
            spawn_interval: (0.2, 10.0),
            conveyor_speed: (0.1, 10.0),
            target_progress: (1, 500),
            max_spawn: (1, 2000),
            item_type_count: (1, 8),
            obstacle_density: (0.0, 0.5),
            pocket_count: (1, 8),
            pocket_capacity: (1, 10),
        }
    }
}

impl LevelLimits {
    /// Copy of `def` with every field clamped into range.
    pub fn clamp(&self, def: &LevelDef) -> LevelDef {
        LevelDef {
            level_id: def.level_id,
            seed: def.seed,
            board_width: def.board_width.clamp(self.board_width.0, self.board_width.1),
            board_height: def.board_height.clamp(self.board_height.0, self.board_height.1),
            min_cluster: def.min_cluster.clamp(self.min_cluster.0, self.min_cluster.1),
            spawn_interval: clamp_f64(def.spawn_interval, self.spawn_interval),
            conveyor_speed: clamp_f64(def.conveyor_speed, self.conveyor_speed),
            target_progress: def.target_progress.clamp(self.target_progress.0, self.target_progress.1),
            max_spawn: def.max_spawn.clamp(self.max_spawn.0, self.max_spawn.1),
            item_type_count: def.item_type_count.clamp(self.item_type_count.0, self.item_type_count.1),
            obstacle_density: clamp_f64(def.obstacle_density, self.obstacle_density),
            pocket_count: def.pocket_count.clamp(self.pocket_count.0, self.pocket_count.1),
            pocket_capacity: def.pocket_capacity.clamp(self.pocket_capacity.0, self.pocket_capacity.1),
            flags: def.flags,
            target_win_rate: clamp_f64(def.target_win_rate, (0.0, 1.0)),
        }
    }
}

/// Clamp that maps NaN to the lower bound.
fn clamp_f64(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

impl LevelDef {
    /// Total board cells, saturating for absurd dimensions.
    pub fn cell_count(&self) -> usize {
        let width = self.board_width.max(0) as usize;
        let height = self.board_height.max(0) as usize;
        width.saturating_mul(height)
    }

    /// Number of obstacles seeded at level start.
    pub fn obstacle_count(&self) -> usize {
        let wanted = (self.cell_count() as f64 * self.obstacle_density.max(0.0)).round() as usize;
        wanted.min(self.cell_count())
    }

    /// Apply a frozen adaptive snapshot to the pacing fields.
    ///
    /// Spawn interval is divided by the spawn-rate multiplier, conveyor
    /// speed and obstacle density are multiplied. Results are clamped to
    /// `limits`.
    pub fn with_adaptive(&self, snapshot: &AdaptiveSnapshot, limits: &LevelLimits) -> LevelDef {
        let mut adjusted = self.clone();
        if snapshot.spawn_rate > 0.0 {
            adjusted.spawn_interval = self.spawn_interval / snapshot.spawn_rate;
        }
        adjusted.conveyor_speed = self.conveyor_speed * snapshot.belt_speed;
        adjusted.obstacle_density = self.obstacle_density * snapshot.obstacle_density;
        limits.clamp(&adjusted)
    }

    /// Parse from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp() {
        let def = LevelDef {
            board_width: 40,
            min_cluster: 0,
            spawn_interval: f64::NAN,
            target_win_rate: 1.4,
            ..LevelDef::default()
        };
        let clamped = LevelLimits::default().clamp(&def);
        assert_eq!(clamped.board_width, 12);
        assert_eq!(clamped.min_cluster, 1);
        assert_eq!(clamped.spawn_interval, 0.2);
        assert_eq!(clamped.target_win_rate, 1.0);
        assert_eq!(clamped.board_height, def.board_height);
    }

    #[test]
    fn test_with_adaptive() {
        let def = LevelDef {
            obstacle_density: 0.1,
            ..LevelDef::default()
        };
        let neutral = def.with_adaptive(&AdaptiveSnapshot::NEUTRAL, &LevelLimits::default());
        assert_eq!(neutral, def);

        let snapshot = AdaptiveSnapshot {
            spawn_rate: 1.5,
            belt_speed: 0.5,
            obstacle_density: 2.0,
            ..AdaptiveSnapshot::NEUTRAL
        };
        let adjusted = def.with_adaptive(&snapshot, &LevelLimits::default());
        assert_eq!(adjusted.spawn_interval, 1.0);
        assert_eq!(adjusted.conveyor_speed, 0.5);
        assert_eq!(adjusted.obstacle_density, 0.2);
        assert_eq!(adjusted.seed, def.seed);
    }

    #[test]
    fn test_obstacle_count() {
        let def = LevelDef {
            board_width: 5,
            board_height: 4,
            obstacle_density: 0.1,
            ..LevelDef::default()
        };
        assert_eq!(def.obstacle_count(), 2);
    }

    #[test]
    fn test_json_roundtrip_with_defaults() {
        let def = LevelDef::from_json(r#"{"level_id": 7, "seed": -3}"#).unwrap();
        assert_eq!(def.level_id, 7);
        assert_eq!(def.seed, -3);
        assert_eq!(def.min_cluster, 3);
        let back = LevelDef::from_json(&def.to_json().unwrap()).unwrap();
        assert_eq!(back, def);
    }
}
