//! Level Builder
//!
//! Procedural level parameters from a difficulty multiplier and a level
//! number. Every pacing formula is monotonic: more difficulty or a later
//! level never produces a slower or easier level before rhythm flags apply.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::hash::hash_with_domain;
use crate::core::rng::Seed;
use crate::game::level::{LevelDef, LevelFlags, LevelLimits};

/// Domain separator for level seed derivation.
const LEVEL_SEED_DOMAIN: &[u8] = b"POCKET_CASCADE_LEVEL_SEED_V1";

/// Seconds between spawns at intensity 1.
pub const BASE_SPAWN_INTERVAL: f64 = 2.0;

/// Belt speed at intensity 1.
pub const BASE_CONVEYOR_SPEED: f64 = 0.8;

/// Cells to clear at intensity 1.
pub const BASE_TARGET_PROGRESS: f64 = 12.0;

/// Per-level intensity growth, capped at [`LEVEL_RAMP_CAP`] levels.
const LEVEL_RAMP: f64 = 0.01;
const LEVEL_RAMP_CAP: u32 = 200;

/// Spikes run this much hotter.
const SPIKE_INTENSITY: f64 = 1.25;
/// Recoveries run this much cooler.
const RECOVERY_INTENSITY: f64 = 0.8;
/// Monetization anchors run this much hotter.
const MONETIZATION_INTENSITY: f64 = 1.15;

/// Spawn budget per cell of target progress.
const SPAWN_PER_TARGET: f64 = 3.0;
/// Fixed spawn slack on top of the budget.
const SPAWN_SLACK: u32 = 10;

/// A generated level and whether clamping changed any value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedLevel {
    /// The level, already within the generation limits.
    pub def: LevelDef,
    /// True if a formula produced an out-of-range value that was clamped.
    pub adjusted: bool,
}

/// Derive a level seed from the level number (SHA-256, first four bytes).
pub fn derive_level_seed(level_number: u32) -> Seed {
    let hash = hash_with_domain(LEVEL_SEED_DOMAIN, &level_number.to_le_bytes());
    Seed::from_le_bytes([hash[0], hash[1], hash[2], hash[3]])
}

/// Rhythm flags for a 1-based level number.
///
/// Every 10th level is a spike and the one after it a recovery. Every 5th
/// is an anchor. Levels 19, 39, 59... are monetization anchors.
pub fn rhythm_flags(level_number: u32) -> LevelFlags {
    LevelFlags {
        is_spike: level_number > 0 && level_number % 10 == 0,
        is_recovery: level_number > 10 && level_number % 10 == 1,
        is_anchor: level_number > 0 && level_number % 5 == 0,
        monetization_anchor: level_number % 20 == 19,
    }
}

fn intended_win_rate(flags: &LevelFlags) -> f64 {
    if flags.monetization_anchor {
        0.35
    } else if flags.is_spike {
        0.4
    } else if flags.is_recovery {
        0.85
    } else if flags.is_anchor {
        0.6
    } else {
        0.7
    }
}

/// Combined pacing intensity before rhythm flags.
pub fn base_intensity(difficulty: f64, level_number: u32) -> f64 {
    let difficulty = if difficulty.is_finite() { difficulty.max(0.0) } else { 1.0 };
    let ramp = level_number.saturating_sub(1).min(LEVEL_RAMP_CAP) as f64 * LEVEL_RAMP;
    difficulty * (1.0 + ramp)
}

/// Generate a level within [`LevelLimits::default`].
///
/// A missing seed is derived from the level number, so the same inputs
/// always yield the same level.
pub fn generate_level(difficulty: f64, level_number: u32, seed: Option<Seed>) -> GeneratedLevel {
    generate_level_with(difficulty, level_number, seed, &LevelLimits::default())
}

/// Generate a level clamped into explicit limits.
pub fn generate_level_with(
    difficulty: f64,
    level_number: u32,
    seed: Option<Seed>,
    limits: &LevelLimits,
) -> GeneratedLevel {
    let flags = rhythm_flags(level_number);
    let mut intensity = base_intensity(difficulty, level_number);
    if flags.is_spike {
        intensity *= SPIKE_INTENSITY;
    }
    if flags.is_recovery {
        intensity *= RECOVERY_INTENSITY;
    }
    if flags.monetization_anchor {
        intensity *= MONETIZATION_INTENSITY;
    }

    let target_progress = (BASE_TARGET_PROGRESS * intensity).round().max(0.0) as u32;
    let max_spawn = ((target_progress as f64 * SPAWN_PER_TARGET).ceil() as u32).saturating_add(SPAWN_SLACK);
    let spawn_interval = if intensity > 0.0 {
        BASE_SPAWN_INTERVAL / intensity
    } else {
        f64::INFINITY
    };

    let raw = LevelDef {
        level_id: level_number,
        seed: seed.unwrap_or_else(|| derive_level_seed(level_number)),
        spawn_interval,
        conveyor_speed: BASE_CONVEYOR_SPEED * intensity,
        target_progress,
        max_spawn,
        item_type_count: 3 + level_number.saturating_sub(1) / 15,
        obstacle_density: ((intensity - 1.0) * 0.1).max(0.0),
        flags,
        target_win_rate: intended_win_rate(&flags),
        ..LevelDef::default()
    };

    let def = limits.clamp(&raw);
    let adjusted = def != raw;
    if adjusted {
        debug!(level = level_number, difficulty, "Generated level clamped into range");
    }

    GeneratedLevel { def, adjusted }
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seed_derivation() {
        assert_eq!(derive_level_seed(7), derive_level_seed(7));
        assert_ne!(derive_level_seed(7), derive_level_seed(8));

        let level = generate_level(1.0, 7, None);
        assert_eq!(level.def.seed, derive_level_seed(7));
        assert_eq!(generate_level(1.0, 7, Some(-5)).def.seed, -5);
    }

    #[test]
    fn test_rhythm_flags() {
        assert_eq!(rhythm_flags(3), LevelFlags::default());
        assert!(rhythm_flags(5).is_anchor && !rhythm_flags(5).is_spike);

        let ten = rhythm_flags(10);
        assert!(ten.is_spike && ten.is_anchor && !ten.is_recovery);
        assert!(rhythm_flags(11).is_recovery);
        assert!(!rhythm_flags(1).is_recovery);
        assert!(rhythm_flags(19).monetization_anchor);
        assert!(rhythm_flags(39).monetization_anchor);
        assert!(!rhythm_flags(20).monetization_anchor);
    }

    #[test]
    fn test_neutral_level_one() {
        let level = generate_level(1.0, 1, Some(0));
        assert!(!level.adjusted);
        assert_eq!(level.def.spawn_interval, 2.0);
        assert_eq!(level.def.conveyor_speed, 0.8);
        assert_eq!(level.def.target_progress, 12);
        assert_eq!(level.def.max_spawn, 46);
        assert_eq!(level.def.obstacle_density, 0.0);
        assert_eq!(level.def.item_type_count, 3);
    }

    #[test]
    fn test_extreme_difficulty_is_clamped_not_rejected() {
        let level = generate_level(50.0, 1, Some(1));
        assert!(level.adjusted);
        assert_eq!(level.def.spawn_interval, 0.2);
        assert_eq!(level.def.conveyor_speed, 10.0);
        assert_eq!(level.def.obstacle_density, 0.5);

        let zero = generate_level(0.0, 1, Some(1));
        assert!(zero.adjusted);
        assert_eq!(zero.def.target_progress, 1);
        assert_eq!(zero.def.spawn_interval, 10.0);
    }

    #[test]
    fn test_custom_limits_clamp_generation() {
        let limits = LevelLimits {
            target_progress: (1, 10),
            conveyor_speed: (0.1, 0.5),
            ..LevelLimits::default()
        };
        let level = generate_level_with(1.0, 1, Some(0), &limits);
        assert!(level.adjusted);
        assert_eq!(level.def.target_progress, 10);
        assert_eq!(level.def.conveyor_speed, 0.5);
        assert_eq!(level.def.spawn_interval, 2.0);
    }

    #[test]
    fn test_spike_harder_than_neighbours() {
        let before = generate_level(1.0, 9, Some(0)).def;
        let spike = generate_level(1.0, 10, Some(0)).def;
        let after = generate_level(1.0, 11, Some(0)).def;
        assert!(spike.target_progress > before.target_progress);
        assert!(after.target_progress < spike.target_progress);
        assert!(spike.target_win_rate < after.target_win_rate);
    }

    proptest! {
        #[test]
        fn prop_monotonic_in_difficulty(a in 0.3f64..3.0, b in 0.3f64..3.0, level in 1u32..300) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let easy = generate_level(lo, level, Some(0)).def;
            let hard = generate_level(hi, level, Some(0)).def;
            prop_assert!(hard.spawn_interval <= easy.spawn_interval);
            prop_assert!(hard.conveyor_speed >= easy.conveyor_speed);
            prop_assert!(hard.target_progress >= easy.target_progress);
            prop_assert!(hard.max_spawn >= easy.max_spawn);
        }

        #[test]
        fn prop_always_within_limits(difficulty in -5.0f64..100.0, level in 0u32..10_000) {
            let def = generate_level(difficulty, level, None).def;
            prop_assert_eq!(LevelLimits::default().clamp(&def), def);
        }
    }
}
