//! Core deterministic primitives.
//!
//! Everything here is replay-safe: no wall-clock reads, no hash-ordered
//! iteration, no platform-dependent randomness.

pub mod rng;
pub mod vec2;
pub mod hash;
pub mod schedule;

// Re-export core types
pub use rng::{Seed, SeededRandom};
pub use vec2::Vec2;
pub use hash::{compute_state_hash, StateDigest, StateHash, StateHasher};
pub use schedule::{Scheduler, TaskId};
