//! Replay Module
//!
//! Records level attempts and verifies them by deterministic replay.
//!
//! ## Flow
//!
//! 1. `ReplayRecorder` is created when a level starts
//! 2. Every applied tap is recorded with its tick
//! 3. Checkpoint hashes are stored every `CHECKPOINT_INTERVAL` ticks
//! 4. `finish()` seals the record with the outcome and final hash
//! 5. `verify_replay()` re-simulates and compares hashes

pub mod record;
pub mod verify;

pub use record::{ReplayRecord, ReplayRecorder, StateCheckpoint, CHECKPOINT_INTERVAL, REPLAY_VERSION};
pub use verify::{verify_replay, ReplayError, ReplayVerification};
