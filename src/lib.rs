//! # Pocket Cascade
//!
//! Deterministic simulation core for Pocket Cascade, a cluster-clearing
//! puzzle fed by a conveyor, with session-level adaptive difficulty.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      POCKET CASCADE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - SplitMix64-seeded Xorshift128+ PRNG       │
//! │  ├── vec2.rs     - 2D positions for near-miss geometry       │
//! │  ├── hash.rs     - State hashing for verification            │
//! │  └── schedule.rs - Expiry-ordered task queue                 │
//! │                                                              │
//! │  game/           - Level simulation (deterministic)          │
//! │  ├── board.rs    - Grid, cluster search, settling            │
//! │  ├── resolve.rs  - Chain reactions                           │
//! │  ├── pocket.rs   - Bounded holding stacks                    │
//! │  ├── conveyor.rs - Spawner, belt queue, routing              │
//! │  ├── state.rs    - Level attempt state                       │
//! │  ├── tick.rs     - Authoritative simulation loop             │
//! │  └── events.rs   - Events and observer bus                   │
//! │                                                              │
//! │  difficulty/     - Cross-level feedback                      │
//! │  ├── outcome.rs  - Win/loss window, spike/recovery           │
//! │  ├── near_miss.rs- Near-miss events and streaks              │
//! │  └── adaptive.rs - Smoothed multipliers, frozen snapshots    │
//! │                                                              │
//! │  levelgen/       - Level generation and validation           │
//! │  replay/         - Replay records and verification           │
//! │  session.rs      - Play session context                      │
//! │  config.rs       - Engine configuration                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - No HashMap (uses BTreeMap/BTreeSet for sorted iteration)
//! - No system time dependencies (fixed 1/60 s tick)
//! - All randomness from seeded Xorshift128+
//! - Adaptive difficulty is frozen into a snapshot at level start and
//!   stored with the replay
//!
//! Given an identical level, snapshot and input log, a level attempt
//! produces **identical results** and the same state hash.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod difficulty;
pub mod game;
pub mod levelgen;
pub mod replay;
pub mod session;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig, SimulationConfig};
pub use core::rng::{Seed, SeededRandom};
pub use core::vec2::Vec2;
pub use difficulty::{AdaptiveCoordinator, AdaptiveSnapshot, NearMissDetector, OutcomeTracker};
pub use game::board::{ClusterBoard, GridPos};
pub use game::events::{GameEvent, GameEventData};
pub use game::input::TapInput;
pub use game::level::LevelDef;
pub use game::state::{LevelPhase, LevelState};
pub use levelgen::{generate_level, validate_level};
pub use replay::{verify_replay, ReplayRecord};
pub use session::{PlaySession, SessionError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// Seconds per tick.
pub const TICK_DT: f64 = 1.0 / TICK_RATE as f64;
