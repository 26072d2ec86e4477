//! Difficulty Feedback
//!
//! Cross-level observers that outlive a single level attempt:
//!
//! - `outcome`: win/loss window, streaks, difficulty multiplier
//! - `near_miss`: proximity events, streaks, rate
//! - `adaptive`: smoothed pacing multipliers and the frozen level snapshot

pub mod adaptive;
pub mod near_miss;
pub mod outcome;

pub use adaptive::{AdaptiveConfig, AdaptiveCoordinator, AdaptiveSnapshot};
pub use near_miss::{NearMissConfig, NearMissDetector, NearMissEvent, NearMissSignal};
pub use outcome::{OutcomeConfig, OutcomeSignal, OutcomeTracker};
