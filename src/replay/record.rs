//! Replay Recording
//!
//! Everything needed to reproduce one level attempt: the level, its seed,
//! the adaptive snapshot frozen at level start, simulation tuning and the
//! tick-stamped taps. Checkpoint hashes allow partial verification.

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::core::hash::StateHash;
use crate::core::rng::Seed;
use crate::difficulty::adaptive::AdaptiveSnapshot;
use crate::game::input::{InputLog, TapInput};
use crate::game::level::LevelDef;
use crate::game::state::{LevelPhase, LevelState};
use crate::replay::verify::ReplayError;

/// Current replay format version.
pub const REPLAY_VERSION: u8 = 1;

/// Checkpoint interval in ticks (every 10 seconds at 60Hz).
pub const CHECKPOINT_INTERVAL: u32 = 600;

/// State hash at a given tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCheckpoint {
    /// Tick number.
    pub tick: u32,
    /// State hash after this tick.
    pub state_hash: StateHash,
    /// RNG state after this tick.
    pub rng_state: [u64; 2],
}

/// Complete record of one level attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// Format version.
    pub version: u8,

    /// Level as supplied (before the snapshot was applied).
    pub level: LevelDef,

    /// RNG seed. Must match `level.seed`.
    pub seed: Seed,

    /// Adaptive values frozen at level start.
    pub snapshot: AdaptiveSnapshot,

    /// Simulation tuning the attempt ran with.
    pub simulation: SimulationConfig,

    /// Tick each tap was applied on, non-decreasing.
    pub input_timestamps: Vec<u32>,

    /// Taps, parallel to `input_timestamps`.
    pub tap_targets: Vec<TapInput>,

    /// Periodic state hashes.
    pub checkpoints: Vec<StateCheckpoint>,

    /// Last simulated tick.
    pub end_tick: u32,

    /// Phase at `end_tick`.
    pub outcome: LevelPhase,

    /// State hash at `end_tick`.
    pub final_state_hash: StateHash,
}

impl ReplayRecord {
    /// Rebuild the input log. `None` if the arrays disagree.
    pub fn input_log(&self) -> Option<InputLog> {
        InputLog::from_parts(&self.input_timestamps, &self.tap_targets)
    }

    /// Tap count.
    pub fn input_count(&self) -> usize {
        self.tap_targets.len()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(s: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Serialize to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReplayError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ReplayError> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Builds a [`ReplayRecord`] while a level is played.
#[derive(Clone, Debug)]
pub struct ReplayRecorder {
    level: LevelDef,
    snapshot: AdaptiveSnapshot,
    simulation: SimulationConfig,
    inputs: InputLog,
    checkpoints: Vec<StateCheckpoint>,
}

impl ReplayRecorder {
    /// Start recording the attempt `state` was just created for.
    pub fn new(state: &LevelState, simulation: &SimulationConfig) -> Self {
        Self {
            level: state.level.clone(),
            snapshot: state.snapshot,
            simulation: simulation.clone(),
            inputs: InputLog::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Record a tap applied on `tick`.
    pub fn record_input(&mut self, tick: u32, input: TapInput) -> bool {
        self.inputs.record(tick, input)
    }

    /// Call after every tick; stores a checkpoint on the interval.
    pub fn observe(&mut self, state: &LevelState) {
        let seen = self.checkpoints.last().is_some_and(|c| c.tick >= state.tick);
        if state.tick > 0 && state.tick % CHECKPOINT_INTERVAL == 0 && !seen {
            self.checkpoints.push(StateCheckpoint {
                tick: state.tick,
                state_hash: state.compute_hash(),
                rng_state: state.rng.state(),
            });
        }
    }

    /// Inputs recorded so far.
    pub fn inputs(&self) -> &InputLog {
        &self.inputs
    }

    /// Seal the record against the attempt's current state.
    pub fn finish(&self, state: &LevelState) -> ReplayRecord {
        ReplayRecord {
            version: REPLAY_VERSION,
            level: self.level.clone(),
            seed: self.level.seed,
            snapshot: self.snapshot,
            simulation: self.simulation.clone(),
            input_timestamps: self.inputs.ticks(),
            tap_targets: self.inputs.taps(),
            checkpoints: self.checkpoints.clone(),
            end_tick: state.tick,
            outcome: state.phase,
            final_state_hash: state.compute_hash(),
        }
    }
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::GridPos;
    use crate::game::tick::tick;

    fn play(ticks: u32) -> (LevelState, ReplayRecorder) {
        let sim = SimulationConfig::default();
        let level = LevelDef {
            seed: 99,
            spawn_interval: 0.5,
            ..LevelDef::default()
        };
        let mut state = LevelState::new(&level, AdaptiveSnapshot::NEUTRAL, &sim);
        let mut recorder = ReplayRecorder::new(&state, &sim);
        for _ in 0..ticks {
            let mut taps = Vec::new();
            if state.tick % 45 == 40 && !state.feed.queue().is_empty() {
                taps.push(TapInput::PlaceFromQueue {
                    queue_index: 0,
                    pos: GridPos::new((state.tick / 45 % 6) as i32, 0),
                });
            }
            for tap in &taps {
                recorder.record_input(state.tick + 1, *tap);
            }
            tick(&mut state, &taps);
            recorder.observe(&state);
        }
        (state, recorder)
    }

    #[test]
    fn test_recorder_captures_inputs_and_checkpoints() {
        let (state, recorder) = play(1300);
        let record = recorder.finish(&state);
        assert_eq!(record.version, REPLAY_VERSION);
        assert_eq!(record.seed, 99);
        assert_eq!(record.end_tick, state.tick);
        assert_eq!(record.input_timestamps.len(), record.tap_targets.len());
        assert!(record.input_count() > 0);
        assert_eq!(record.final_state_hash, state.compute_hash());
        let ticks: Vec<u32> = record.checkpoints.iter().map(|c| c.tick).collect();
        assert!(ticks.iter().all(|t| t % CHECKPOINT_INTERVAL == 0));
        assert!(record.input_log().is_some());
    }

    #[test]
    fn test_codecs() {
        let (state, recorder) = play(200);
        let record = recorder.finish(&state);

        let json = record.to_json().unwrap();
        assert_eq!(ReplayRecord::from_json(&json).unwrap(), record);

        let bytes = record.to_bytes().unwrap();
        assert_eq!(ReplayRecord::from_bytes(&bytes).unwrap(), record);

        assert!(matches!(ReplayRecord::from_bytes(&[1, 2, 3]), Err(ReplayError::Bincode(_))));
        assert!(matches!(ReplayRecord::from_json("{}"), Err(ReplayError::Json(_))));
    }
}
