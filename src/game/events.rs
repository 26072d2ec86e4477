//! Game Events
//!
//! One-way observations emitted by the simulation and the difficulty layer.
//! Consumers subscribe through [`EventBus`]; the core never waits on them.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Deserialize, Serialize};

use crate::difficulty::near_miss::NearMissEvent;
use crate::game::board::GridPos;
use crate::game::booster::BoosterKind;
use crate::game::item::ItemType;

/// Why a level attempt ended in failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelFailReason {
    /// An item had nowhere to go: every pocket was full.
    PocketOverflow,
    /// Spawning finished with nothing left to place and the target unmet.
    OutOfItems,
    /// No empty cell left to place on.
    BoardFull,
    /// The player quit or restarted.
    Abandoned,
}

/// Event payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Level attempt began.
    LevelStarted {
        level_id: u32,
        seed: i32,
    },

    /// Level attempt failed.
    LevelFailed {
        level_id: u32,
        reason: LevelFailReason,
    },

    /// Target progress reached.
    LevelWon {
        level_id: u32,
        progress: u32,
    },

    /// Conveyor emitted an item.
    ItemSpawned {
        item: ItemType,
    },

    /// Item moved from the belt into a pocket.
    ItemRouted {
        item: ItemType,
        pocket: usize,
    },

    /// Item written to the board.
    ItemPlaced {
        item: ItemType,
        pos: GridPos,
    },

    /// Qualifying cluster, cells in search order.
    ClusterFound {
        item: ItemType,
        cells: Vec<GridPos>,
    },

    /// A placement's chain finished.
    ChainResolved {
        depth: u32,
        cleared: usize,
    },

    /// Near miss recorded.
    NearMiss(NearMissEvent),

    /// Near-miss streak started or ended.
    NearMissStreak {
        active: bool,
    },

    /// Outcome multiplier changed.
    DifficultyChanged {
        multiplier: f64,
    },

    /// Spike entered (true) or cleared (false).
    SpikeDetected {
        spiking: bool,
    },

    /// Adaptive cadence ran.
    MultipliersAdjusted {
        belt_speed: f64,
        spawn_rate: f64,
        obstacle_density: f64,
    },

    /// Booster started.
    BoosterStarted {
        kind: BoosterKind,
    },

    /// Booster expired or was force-ended.
    BoosterEnded {
        kind: BoosterKind,
    },
}

/// An event stamped with the level tick it happened on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Level tick (0 for session-level events between levels).
    pub tick: u32,

    /// Payload
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Level failed event.
    pub fn level_failed(tick: u32, level_id: u32, reason: LevelFailReason) -> Self {
        Self::new(tick, GameEventData::LevelFailed { level_id, reason })
    }

    /// Cluster found event.
    pub fn cluster_found(tick: u32, item: ItemType, cells: Vec<GridPos>) -> Self {
        Self::new(tick, GameEventData::ClusterFound { item, cells })
    }

    /// True for level won/failed.
    pub fn ends_level(&self) -> bool {
        matches!(
            self.data,
            GameEventData::LevelWon { .. } | GameEventData::LevelFailed { .. }
        )
    }
}

// =============================================================================
// OBSERVERS
// =============================================================================

/// Receiver of published events.
pub trait EventObserver {
    /// Called once per published event, in publish order.
    fn on_event(&mut self, event: &GameEvent);
}

impl<F> EventObserver for F
where
    F: FnMut(&GameEvent),
{
    fn on_event(&mut self, event: &GameEvent) {
        self(event)
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous publish/subscribe channel.
///
/// Observers are called in subscription order. Unsubscribing takes effect
/// for the next publish.
#[derive(Default)]
pub struct EventBus {
    observers: BTreeMap<SubscriptionId, Box<dyn EventObserver>>,
    next_id: u64,
}

impl EventBus {
    /// Create a bus with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn subscribe(&mut self, observer: impl EventObserver + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.insert(id, Box::new(observer));
        id
    }

    /// Remove an observer. False if the id is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.remove(&id).is_some()
    }

    /// Deliver one event to every observer.
    pub fn publish(&mut self, event: &GameEvent) {
        for observer in self.observers.values_mut() {
            observer.on_event(event);
        }
    }

    /// Deliver events in order.
    pub fn publish_all<'a>(&mut self, events: impl IntoIterator<Item = &'a GameEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Number of observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// True with no observers.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

// ===== TESTS =====
