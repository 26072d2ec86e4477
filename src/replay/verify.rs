//! Replay Verification
//!
//! Verify a level attempt by deterministic re-simulation from its record.

use tracing::{info, warn};

use crate::core::hash::StateHash;
use crate::game::events::LevelFailReason;
use crate::game::input::TapInput;
use crate::game::state::{LevelPhase, LevelState};
use crate::game::tick::tick;
use crate::replay::record::{ReplayRecord, REPLAY_VERSION};

/// Errors that can occur with replays.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Record written by an unsupported format version.
    #[error("Version mismatch: expected {expected}, got {got}")]
    VersionMismatch {
        /// Supported version.
        expected: u8,
        /// Record version.
        got: u8,
    },

    /// Record seed disagrees with its level.
    #[error("Seed mismatch: level has {expected}, record has {got}")]
    SeedMismatch {
        /// Level seed.
        expected: i32,
        /// Record seed.
        got: i32,
    },

    /// Input arrays differ in length or go backwards.
    #[error("Malformed inputs: {ticks} timestamps for {taps} taps")]
    MalformedInputs {
        /// Timestamp count.
        ticks: usize,
        /// Tap count.
        taps: usize,
    },

    /// Checkpoint hash mismatch.
    #[error("Checkpoint mismatch at tick {tick}")]
    CheckpointMismatch {
        /// Tick where mismatch occurred.
        tick: u32,
    },

    /// Re-simulation ended at a different tick.
    #[error("Level ended at tick {computed}, record says {expected}")]
    EndTickMismatch {
        /// Recorded end tick.
        expected: u32,
        /// Re-simulated end tick.
        computed: u32,
    },

    /// Re-simulation reached a different outcome.
    #[error("Outcome mismatch: expected {expected:?}, got {computed:?}")]
    OutcomeMismatch {
        /// Recorded outcome.
        expected: LevelPhase,
        /// Re-simulated outcome.
        computed: LevelPhase,
    },

    /// Final state hash mismatch.
    #[error("Final state hash mismatch: expected {}, got {}", hex::encode(expected), hex::encode(computed))]
    FinalStateMismatch {
        /// Recorded hash.
        expected: StateHash,
        /// Re-simulated hash.
        computed: StateHash,
    },

    /// JSON codec failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary codec failure.
    #[error("Binary decode error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// A verified replay.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayVerification {
    /// Final state hash (from replay).
    pub final_hash: StateHash,
    /// Ticks simulated.
    pub end_tick: u32,
    /// Outcome reached.
    pub outcome: LevelPhase,
    /// Checkpoints that matched.
    pub checkpoints_verified: usize,
}

/// Verify a record by full replay.
///
/// Rebuilds the level with the frozen snapshot, applies each tap on its
/// tick, and compares checkpoints, end tick, outcome and final hash. An
/// abandoned record is closed the same way after its last tick.
pub fn verify_replay(record: &ReplayRecord) -> Result<ReplayVerification, ReplayError> {
    if record.version != REPLAY_VERSION {
        return Err(ReplayError::VersionMismatch {
            expected: REPLAY_VERSION,
            got: record.version,
        });
    }
    if record.seed != record.level.seed {
        return Err(ReplayError::SeedMismatch {
            expected: record.level.seed,
            got: record.seed,
        });
    }
    let inputs = record.input_log().ok_or(ReplayError::MalformedInputs {
        ticks: record.input_timestamps.len(),
        taps: record.tap_targets.len(),
    })?;

    // 1. Reconstruct initial state
    let mut state = LevelState::new(&record.level, record.snapshot, &record.simulation);
    let mut checkpoints = record.checkpoints.iter().peekable();
    let mut checkpoints_verified = 0;

    // 2. Replay tick by tick with checkpoint verification
    while state.tick < record.end_tick && !state.is_ended() {
        let taps: Vec<TapInput> = inputs.inputs_at(state.tick + 1).collect();
        tick(&mut state, &taps);

        while let Some(checkpoint) = checkpoints.next_if(|c| c.tick <= state.tick) {
            if checkpoint.tick != state.tick || checkpoint.state_hash != state.compute_hash() {
                warn!(tick = checkpoint.tick, "Replay checkpoint mismatch");
                return Err(ReplayError::CheckpointMismatch { tick: checkpoint.tick });
            }
            checkpoints_verified += 1;
        }
    }

    // Abandoning happens outside the tick loop.
    let abandoned = LevelPhase::Failed(LevelFailReason::Abandoned);
    if record.outcome == abandoned && !state.is_ended() {
        state.finish(abandoned);
    }

    // 3. Compare the end
    if state.tick != record.end_tick {
        return Err(ReplayError::EndTickMismatch {
            expected: record.end_tick,
            computed: state.tick,
        });
    }
    if state.phase != record.outcome {
        return Err(ReplayError::OutcomeMismatch {
            expected: record.outcome,
            computed: state.phase,
        });
    }
    let final_hash = state.compute_hash();
    if final_hash != record.final_state_hash {
        warn!(
            expected = %hex::encode(record.final_state_hash),
            computed = %hex::encode(final_hash),
            "Replay final hash mismatch"
        );
        return Err(ReplayError::FinalStateMismatch {
            expected: record.final_state_hash,
            computed: final_hash,
        });
    }

    info!(
        level = record.level.level_id,
        ticks = state.tick,
        inputs = record.input_count(),
        hash = %hex::encode(&final_hash[..8]),
        "Replay verified"
    );

    Ok(ReplayVerification {
        final_hash,
        end_tick: state.tick,
        outcome: state.phase,
        checkpoints_verified,
    })
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::difficulty::adaptive::AdaptiveSnapshot;
    use crate::game::board::GridPos;
    use crate::game::level::LevelDef;
    use crate::replay::record::ReplayRecorder;

    fn record_run(snapshot: AdaptiveSnapshot, ticks: u32) -> ReplayRecord {
        let sim = SimulationConfig::default();
        let level = LevelDef {
            seed: 1234,
            spawn_interval: 0.4,
            obstacle_density: 0.1,
            ..LevelDef::default()
        };
        let mut state = LevelState::new(&level, snapshot, &sim);
        let mut recorder = ReplayRecorder::new(&state, &sim);
        let mut column = 0;
        for _ in 0..ticks {
            let mut taps = Vec::new();
            if !state.feed.queue().is_empty() && state.tick % 20 == 0 {
                let target = (0..6)
                    .map(|i| (column + i) % 6)
                    .find_map(|x| (0..8).map(|y| GridPos::new(x, y)).find(|p| state.board.is_empty(p.x, p.y)));
                if let Some(pos) = target {
                    taps.push(TapInput::PlaceFromQueue { queue_index: 0, pos });
                    column = (column + 1) % 6;
                }
            }
            for tap in &taps {
                recorder.record_input(state.tick + 1, *tap);
            }
            tick(&mut state, &taps);
            recorder.observe(&state);
            if state.is_ended() {
                break;
            }
        }
        recorder.finish(&state)
    }

    #[test]
    fn test_verify_roundtrip() {
        let record = record_run(AdaptiveSnapshot::NEUTRAL, 1500);
        let verified = verify_replay(&record).unwrap();
        assert_eq!(verified.final_hash, record.final_state_hash);
        assert_eq!(verified.end_tick, record.end_tick);
        assert_eq!(verified.checkpoints_verified, record.checkpoints.len());

        let decoded = ReplayRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert!(verify_replay(&decoded).is_ok());
    }

    #[test]
    fn test_snapshot_is_part_of_the_record() {
        let snapshot = AdaptiveSnapshot {
            belt_speed: 1.3,
            spawn_rate: 1.2,
            tension_bias: 0.3,
            ..AdaptiveSnapshot::NEUTRAL
        };
        let record = record_run(snapshot, 900);
        assert!(verify_replay(&record).is_ok());

        let mut tampered = record.clone();
        tampered.snapshot = AdaptiveSnapshot::NEUTRAL;
        assert!(verify_replay(&tampered).is_err());
    }

    #[test]
    fn test_tampered_records_fail() {
        let record = record_run(AdaptiveSnapshot::NEUTRAL, 700);

        let mut bad = record.clone();
        bad.version = 9;
        assert!(matches!(verify_replay(&bad), Err(ReplayError::VersionMismatch { got: 9, .. })));

        let mut bad = record.clone();
        bad.seed += 1;
        assert!(matches!(verify_replay(&bad), Err(ReplayError::SeedMismatch { .. })));

        let mut bad = record.clone();
        bad.input_timestamps.pop();
        assert!(matches!(verify_replay(&bad), Err(ReplayError::MalformedInputs { .. })));

        let mut bad = record.clone();
        bad.final_state_hash[0] ^= 0xff;
        let err = verify_replay(&bad).unwrap_err();
        assert!(matches!(err, ReplayError::FinalStateMismatch { .. }));
        assert!(err.to_string().contains("hash mismatch"));

        let mut bad = record;
        if let Some(checkpoint) = bad.checkpoints.first_mut() {
            checkpoint.state_hash = [0; 32];
            assert!(matches!(verify_replay(&bad), Err(ReplayError::CheckpointMismatch { tick: 600 })));
        }
    }
}
