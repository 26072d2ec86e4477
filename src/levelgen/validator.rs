//! Level Validator
//!
//! Range checks (hard errors) plus an advisory solvability and difficulty
//! estimate. Only errors block a level; the heuristics never do.

use serde::{Deserialize, Serialize};

use crate::game::level::{LevelDef, LevelLimits};

/// Outcome of validating a level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// No hard errors.
    pub is_valid: bool,
    /// Heuristic: the spawn budget covers the moves needed.
    pub is_solvable: bool,
    /// Heuristic placement count to reach the target.
    pub min_moves_required: u32,
    /// 1 (trivial) to 10 (brutal).
    pub difficulty_rating: u8,
    /// Blocking problems.
    pub errors: Vec<String>,
    /// Advisory notes.
    pub warnings: Vec<String>,
}

/// Rating factor weights; they sum to 1.
const WEIGHT_SPAWN: f64 = 0.25;
const WEIGHT_BELT: f64 = 0.2;
const WEIGHT_TARGET: f64 = 0.2;
const WEIGHT_MOVES: f64 = 0.2;
const WEIGHT_POCKETS: f64 = 0.15;

/// Rating reduction for spikes, which are meant to feel survivable.
const SPIKE_REDUCTION: f64 = 1.0;
/// Rating reduction for monetization anchors.
const MONETIZATION_REDUCTION: f64 = 0.5;

/// Ratings at or above this draw a warning.
const HARD_RATING: u8 = 9;

fn check_int<T: PartialOrd + std::fmt::Display>(errors: &mut Vec<String>, name: &str, value: T, (lo, hi): (T, T)) {
    if value < lo || value > hi {
        errors.push(format!("{name} {value} outside {lo}..={hi}"));
    }
}

fn check_float(errors: &mut Vec<String>, name: &str, value: f64, (lo, hi): (f64, f64)) {
    if !value.is_finite() || value < lo || value > hi {
        errors.push(format!("{name} {value} outside {lo}..={hi}"));
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Heuristic minimum placements: one per cleared cell, rounded up to whole
/// clusters, inflated when items arrive faster than one per second.
pub fn estimate_min_moves(def: &LevelDef) -> u32 {
    let cluster = def.min_cluster.max(1) as f64;
    let clusters = (def.target_progress as f64 / cluster).ceil();
    let pace = if def.spawn_interval > 0.0 {
        def.conveyor_speed / def.spawn_interval
    } else {
        0.0
    };
    let pace_factor = 1.0 + 0.1 * (pace - 1.0).max(0.0);
    (clusters * cluster * pace_factor).ceil() as u32
}

/// Weighted 1-10 rating.
pub fn rate_difficulty(def: &LevelDef, min_moves: u32) -> u8 {
    let spawn = unit((3.0 - def.spawn_interval) / 2.8);
    let belt = unit((def.conveyor_speed - 0.5) / 2.5);
    let target = unit(def.target_progress as f64 / 60.0);
    let moves = if def.max_spawn == 0 {
        1.0
    } else {
        unit(min_moves as f64 / def.max_spawn as f64)
    };
    let slots = def.pocket_count.saturating_mul(def.pocket_capacity) as f64;
    let pockets = 1.0 - unit((slots - 4.0) / 20.0);

    let score = spawn * WEIGHT_SPAWN
        + belt * WEIGHT_BELT
        + target * WEIGHT_TARGET
        + moves * WEIGHT_MOVES
        + pockets * WEIGHT_POCKETS;

    let mut rating = 1.0 + 9.0 * score;
    if def.flags.is_spike {
        rating -= SPIKE_REDUCTION;
    }
    if def.flags.monetization_anchor {
        rating -= MONETIZATION_REDUCTION;
    }
    rating.round().clamp(1.0, 10.0) as u8
}

/// Validate a level against [`LevelLimits::default`].
pub fn validate_level(def: &LevelDef) -> ValidationResult {
    validate_level_with(def, &LevelLimits::default())
}

/// Validate a level against explicit limits.
pub fn validate_level_with(def: &LevelDef, limits: &LevelLimits) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_int(&mut errors, "board_width", def.board_width, limits.board_width);
    check_int(&mut errors, "board_height", def.board_height, limits.board_height);
    check_int(&mut errors, "min_cluster", def.min_cluster, limits.min_cluster);
    check_float(&mut errors, "spawn_interval", def.spawn_interval, limits.spawn_interval);
    check_float(&mut errors, "conveyor_speed", def.conveyor_speed, limits.conveyor_speed);
    check_int(&mut errors, "target_progress", def.target_progress, limits.target_progress);
    check_int(&mut errors, "max_spawn", def.max_spawn, limits.max_spawn);
    check_int(&mut errors, "item_type_count", def.item_type_count, limits.item_type_count);
    check_float(&mut errors, "obstacle_density", def.obstacle_density, limits.obstacle_density);
    check_int(&mut errors, "pocket_count", def.pocket_count, limits.pocket_count);
    check_int(&mut errors, "pocket_capacity", def.pocket_capacity, limits.pocket_capacity);
    check_float(&mut errors, "target_win_rate", def.target_win_rate, (0.0, 1.0));

    // Heuristics assume in-range fields.
    if !errors.is_empty() {
        return ValidationResult {
            errors,
            ..ValidationResult::default()
        };
    }

    let open_cells = def.cell_count().saturating_sub(def.obstacle_count());
    if open_cells < def.min_cluster {
        errors.push(format!(
            "min_cluster {} exceeds {} open cells",
            def.min_cluster, open_cells
        ));
    }

    let min_moves_required = estimate_min_moves(def);
    let is_solvable = errors.is_empty() && def.max_spawn >= min_moves_required;
    if errors.is_empty() && !is_solvable {
        warnings.push(format!(
            "max_spawn {} below estimated {} moves",
            def.max_spawn, min_moves_required
        ));
    }

    let difficulty_rating = rate_difficulty(def, min_moves_required);
    if difficulty_rating >= HARD_RATING {
        warnings.push(format!("difficulty rating {difficulty_rating} is very high"));
    }
    if def.flags.is_spike && def.flags.is_recovery {
        warnings.push("level flagged both spike and recovery".to_string());
    }
    if def.target_win_rate < 0.2 {
        warnings.push(format!("target_win_rate {} is very low", def.target_win_rate));
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        is_solvable,
        min_moves_required,
        difficulty_rating,
        errors,
        warnings,
    }
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::level::LevelFlags;
    use crate::levelgen::builder::generate_level;
    use proptest::prelude::*;

    #[test]
    fn test_default_level_is_valid() {
        let result = validate_level(&LevelDef::default());
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.is_solvable);
        assert_eq!(result.min_moves_required, 15);
        assert!((1..=10).contains(&result.difficulty_rating));
    }

    #[test]
    fn test_range_errors_block() {
        let def = LevelDef {
            board_width: 1,
            spawn_interval: 0.0,
            target_win_rate: f64::NAN,
            ..LevelDef::default()
        };
        let result = validate_level(&def);
        assert!(!result.is_valid);
        assert!(!result.is_solvable);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors[0].starts_with("board_width"));
        assert_eq!(result.difficulty_rating, 0);
    }

    #[test]
    fn test_huge_board_is_an_error_not_a_panic() {
        let def = LevelDef {
            board_width: 65_536,
            board_height: 65_536,
            ..LevelDef::default()
        };
        assert_eq!(def.cell_count(), 1usize << 32);
        let result = validate_level(&def);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_huge_pockets_are_an_error_not_a_panic() {
        let def = LevelDef {
            pocket_count: usize::MAX / 2,
            pocket_capacity: 4,
            ..LevelDef::default()
        };
        let result = validate_level(&def);
        assert!(!result.is_valid);
        assert!(result.errors[0].starts_with("pocket_count"));

        // The rating saturates instead of overflowing.
        let rating = rate_difficulty(&def, 10);
        assert!((1..=10).contains(&rating));
    }

    #[test]
    fn test_unsolvable_is_only_a_warning() {
        let def = LevelDef {
            target_progress: 30,
            max_spawn: 10,
            ..LevelDef::default()
        };
        let result = validate_level(&def);
        assert!(result.is_valid);
        assert!(!result.is_solvable);
        assert!(result.warnings.iter().any(|w| w.contains("max_spawn")));
    }

    #[test]
    fn test_moves_heuristic() {
        let def = LevelDef {
            target_progress: 10,
            min_cluster: 3,
            spawn_interval: 1.0,
            conveyor_speed: 1.0,
            ..LevelDef::default()
        };
        // 4 clusters of 3
        assert_eq!(estimate_min_moves(&def), 12);

        let fast = LevelDef {
            spawn_interval: 0.5,
            conveyor_speed: 2.0,
            ..def
        };
        // pace 4 inflates by 30%
        assert_eq!(estimate_min_moves(&fast), 16);
    }

    #[test]
    fn test_spike_rating_reduction() {
        let def = LevelDef {
            spawn_interval: 0.5,
            conveyor_speed: 2.0,
            target_progress: 40,
            ..LevelDef::default()
        };
        let plain = validate_level(&def).difficulty_rating;
        let spike = validate_level(&LevelDef {
            flags: LevelFlags {
                is_spike: true,
                ..LevelFlags::default()
            },
            ..def
        })
        .difficulty_rating;
        assert_eq!(spike, plain - 1);
    }

    proptest! {
        #[test]
        fn prop_generated_levels_validate(difficulty in 0.3f64..3.0, level in 1u32..500) {
            let generated = generate_level(difficulty, level, None);
            let result = validate_level(&generated.def);
            prop_assert!(result.is_valid, "{:?}", result.errors);
            prop_assert!((1..=10).contains(&result.difficulty_rating));
        }
    }
}
