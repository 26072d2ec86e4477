//! Player Input
//!
//! Taps are the only player-driven state change. Each one is recorded with
//! the tick it was applied on, which is all a replay needs besides the seed
//! and the frozen adaptive snapshot.

use serde::{Deserialize, Serialize};

use crate::game::board::GridPos;

// =============================================================================
// INPUT TYPES
// =============================================================================

/// One player action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TapInput {
    /// Move a belt item into a pocket.
    Route {
        /// Belt index, 0 = oldest.
        queue_index: usize,
        /// Target pocket.
        pocket_index: usize,
    },
    /// Place the top item of a pocket on the board.
    PlaceFromPocket {
        /// Source pocket.
        pocket_index: usize,
        /// Target cell.
        pos: GridPos,
    },
    /// Place a belt item straight on the board.
    PlaceFromQueue {
        /// Belt index, 0 = oldest.
        queue_index: usize,
        /// Target cell.
        pos: GridPos,
    },
    /// Send a pocket's top item back to the belt.
    UndoToConveyor {
        /// Source pocket.
        pocket_index: usize,
    },
    /// Start the slow-motion booster.
    SlowMotion,
}

impl TapInput {
    /// Board cell this input targets, if any.
    pub fn target_cell(&self) -> Option<GridPos> {
        match *self {
            TapInput::PlaceFromPocket { pos, .. } | TapInput::PlaceFromQueue { pos, .. } => Some(pos),
            _ => None,
        }
    }
}

/// Input stamped with the tick it applies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedInput {
    /// Level tick.
    pub tick: u32,
    /// The action.
    pub input: TapInput,
}

impl TimedInput {
    /// Create a stamped input.
    pub fn new(tick: u32, input: TapInput) -> Self {
        Self { tick, input }
    }
}

// =============================================================================
// INPUT LOG
// =============================================================================

/// Ordered record of every input applied during one level attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLog {
    entries: Vec<TimedInput>,
}

impl InputLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from parallel tick/target arrays. `None` if lengths differ or
    /// ticks go backwards.
    pub fn from_parts(ticks: &[u32], taps: &[TapInput]) -> Option<Self> {
        if ticks.len() != taps.len() || ticks.windows(2).any(|w| w[0] > w[1]) {
            return None;
        }
        Some(Self {
            entries: ticks
                .iter()
                .zip(taps)
                .map(|(&tick, &input)| TimedInput::new(tick, input))
                .collect(),
        })
    }

    /// Append an input. Entries older than the last one are ignored.
    pub fn record(&mut self, tick: u32, input: TapInput) -> bool {
        if self.entries.last().is_some_and(|last| last.tick > tick) {
            return false;
        }
        self.entries.push(TimedInput::new(tick, input));
        true
    }

    /// Inputs applied on `tick`, in recorded order.
    pub fn inputs_at(&self, tick: u32) -> impl Iterator<Item = TapInput> + '_ {
        let start = self.entries.partition_point(|e| e.tick < tick);
        let end = self.entries.partition_point(|e| e.tick <= tick);
        self.entries[start..end].iter().map(|e| e.input)
    }

    /// Every entry, oldest first.
    pub fn entries(&self) -> &[TimedInput] {
        &self.entries
    }

    /// Tick of each entry.
    pub fn ticks(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.tick).collect()
    }

    /// Action of each entry.
    pub fn taps(&self) -> Vec<TapInput> {
        self.entries.iter().map(|e| e.input).collect()
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ===== TESTS =====
