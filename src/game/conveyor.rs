//! Conveyor Feed
//!
//! Timed, weighted item spawning onto a bounded belt queue, belt movement,
//! and routing from the belt into pockets.

use std::collections::{BTreeSet, VecDeque};
use serde::{Deserialize, Serialize};

use crate::core::hash::{StateDigest, StateHasher};
use crate::core::rng::SeededRandom;
use crate::game::board::ClusterBoard;
use crate::game::item::ItemType;
use crate::game::pocket::PocketBank;

/// An item riding the belt.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConveyorItem {
    /// Item type.
    pub item: ItemType,
    /// Distance travelled along the belt.
    pub position: f64,
}

/// Bounded FIFO of belt items. Index 0 is the oldest (closest to the end).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConveyorQueue {
    items: VecDeque<ConveyorItem>,
    capacity: usize,
}

impl ConveyorQueue {
    /// Create an empty queue.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append at the belt start. False when full.
    pub fn push(&mut self, item: ItemType) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push_back(ConveyorItem {
            item,
            position: 0.0,
        });
        true
    }

    /// Reinsert an entry at `index` (clamped to the queue length).
    pub fn insert(&mut self, index: usize, entry: ConveyorItem) -> bool {
        if self.is_full() {
            return false;
        }
        let index = index.min(self.items.len());
        self.items.insert(index, entry);
        true
    }

    /// Remove the entry at `index`.
    pub fn remove(&mut self, index: usize) -> Option<ConveyorItem> {
        self.items.remove(index)
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&ConveyorItem> {
        self.items.get(index)
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ConveyorItem> {
        self.items.iter()
    }

    /// Pending entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True at capacity.
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Maximum entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Move every item `distance` along a belt of `belt_length`, returning
    /// items that reached the end in arrival order.
    pub fn advance(&mut self, distance: f64, belt_length: f64) -> Vec<ItemType> {
        for entry in self.items.iter_mut() {
            entry.position = (entry.position + distance).min(belt_length);
        }
        let mut arrived = Vec::new();
        while let Some(front) = self.items.front() {
            if front.position < belt_length {
                break;
            }
            if let Some(entry) = self.items.pop_front() {
                arrived.push(entry.item);
            }
        }
        arrived
    }
}

/// Relative spawn weight per item type (index = type id).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnWeights {
    weights: Vec<f64>,
}

impl SpawnWeights {
    /// Equal weight for types `0..count`.
    pub fn uniform(count: usize) -> Self {
        Self {
            weights: vec![1.0; count],
        }
    }

    /// Explicit weights.
    pub fn from_weights(weights: Vec<f64>) -> Self {
        Self { weights }
    }

    /// Weight of a type, 0 if unknown.
    pub fn weight(&self, item: ItemType) -> f64 {
        usize::try_from(item)
            .ok()
            .and_then(|i| self.weights.get(i).copied())
            .unwrap_or(0.0)
    }

    /// Replace a type's weight. Negative and non-finite values become 0.
    pub fn set_weight(&mut self, item: ItemType, weight: f64) -> bool {
        let Some(slot) = usize::try_from(item).ok().and_then(|i| self.weights.get_mut(i)) else {
            return false;
        };
        *slot = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        true
    }

    /// Raw table.
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// Table with `boosted` types scaled by `1 + bias` (bias in `[-1, 1]`).
    pub fn biased(&self, boosted: &BTreeSet<ItemType>, bias: f64) -> Vec<f64> {
        let factor = 1.0 + bias.clamp(-1.0, 1.0);
        self.weights
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                if boosted.contains(&(i as ItemType)) {
                    (w * factor).max(0.0)
                } else {
                    w
                }
            })
            .collect()
    }
}

/// Result of routing a belt item into the pockets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteOutcome {
    /// Item landed in this pocket.
    Routed {
        /// Receiving pocket.
        pocket: usize,
    },
    /// Bad queue/pocket index or empty queue. Nothing changed.
    Rejected,
    /// Every pocket is full. The item stays on the belt; level fails.
    Overflow,
}

impl RouteOutcome {
    /// True for [`RouteOutcome::Routed`].
    pub fn is_routed(self) -> bool {
        matches!(self, RouteOutcome::Routed { .. })
    }
}

/// Spawn and belt parameters for one level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedParams {
    /// Seconds between spawns.
    pub spawn_interval: f64,
    /// Belt units per second.
    pub belt_speed: f64,
    /// Belt length in units; items reaching it drop into pockets.
    pub belt_length: f64,
    /// Queue capacity.
    pub queue_capacity: usize,
    /// Spawns before the feed stops.
    pub max_spawn: u32,
    /// Distinct item types spawned.
    pub item_type_count: u32,
    /// Frozen near-miss bias for one-short types.
    pub tension_bias: f64,
}

/// Timed emitter feeding the belt queue.
#[derive(Clone, Debug)]
pub struct ConveyorFeed {
    queue: ConveyorQueue,
    weights: SpawnWeights,
    spawn_interval: f64,
    belt_speed: f64,
    belt_length: f64,
    timer: f64,
    total_spawned: u32,
    max_spawn: u32,
    tension_bias: f64,
}

impl ConveyorFeed {
    /// Create a feed with uniform weights over the configured item types.
    pub fn new(params: &FeedParams) -> Self {
        Self {
            queue: ConveyorQueue::new(params.queue_capacity),
            weights: SpawnWeights::uniform(params.item_type_count as usize),
            spawn_interval: params.spawn_interval,
            belt_speed: params.belt_speed,
            belt_length: params.belt_length,
            timer: 0.0,
            total_spawned: 0,
            max_spawn: params.max_spawn,
            tension_bias: params.tension_bias,
        }
    }

    /// Advance the spawn timer and emit at most one item.
    ///
    /// A full queue defers the spawn without drawing from the RNG.
    pub fn update(&mut self, dt: f64, rng: &mut SeededRandom, board: &ClusterBoard) -> Option<ItemType> {
        if self.is_exhausted() {
            return None;
        }
        self.timer += dt;
        if self.timer < self.spawn_interval || self.queue.is_full() {
            return None;
        }

        let item = self.draw(rng, board)?;
        self.queue.push(item);
        self.timer = 0.0;
        self.total_spawned += 1;
        Some(item)
    }

    fn draw(&self, rng: &mut SeededRandom, board: &ClusterBoard) -> Option<ItemType> {
        if self.tension_bias != 0.0 {
            let short = board.one_short_types();
            if !short.is_empty() {
                let biased = self.weights.biased(&short, self.tension_bias);
                if biased.iter().any(|w| *w > 0.0) {
                    return rng.choose_weighted(&biased).map(|i| i as ItemType);
                }
            }
        }
        rng.choose_weighted(self.weights.as_slice()).map(|i| i as ItemType)
    }

    /// Move the belt; returns items that fell off the end.
    pub fn advance_belt(&mut self, dt: f64) -> Vec<ItemType> {
        self.queue.advance(self.belt_speed * dt, self.belt_length)
    }

    /// Route a belt item into a pocket.
    ///
    /// A full target pocket falls back to the first pocket with room. When
    /// every pocket is full the item is put back where it was.
    pub fn route_to_pocket(
        &mut self,
        queue_index: usize,
        pocket_index: usize,
        bank: &mut PocketBank,
    ) -> RouteOutcome {
        if pocket_index >= bank.len() {
            return RouteOutcome::Rejected;
        }
        let Some(entry) = self.queue.remove(queue_index) else {
            return RouteOutcome::Rejected;
        };

        if bank.try_add_item_at(pocket_index, entry.item) {
            return RouteOutcome::Routed {
                pocket: pocket_index,
            };
        }
        match bank.add_item(entry.item) {
            Some(pocket) => RouteOutcome::Routed { pocket },
            None => {
                self.queue.insert(queue_index, entry);
                RouteOutcome::Overflow
            }
        }
    }

    /// Take a belt item for direct placement.
    pub fn take(&mut self, queue_index: usize) -> Option<ConveyorItem> {
        self.queue.remove(queue_index)
    }

    /// Put a taken item back at its index.
    pub fn restore(&mut self, queue_index: usize, entry: ConveyorItem) -> bool {
        self.queue.insert(queue_index, entry)
    }

    /// True once `max_spawn` items have been emitted.
    pub fn is_exhausted(&self) -> bool {
        self.total_spawned >= self.max_spawn
    }

    /// Items emitted so far.
    pub fn total_spawned(&self) -> u32 {
        self.total_spawned
    }

    /// Spawn cap.
    pub fn max_spawn(&self) -> u32 {
        self.max_spawn
    }

    /// Belt queue.
    pub fn queue(&self) -> &ConveyorQueue {
        &self.queue
    }

    /// Mutable belt queue (undo-to-conveyor).
    pub fn queue_mut(&mut self) -> &mut ConveyorQueue {
        &mut self.queue
    }

    /// Spawn weight table.
    pub fn weights(&self) -> &SpawnWeights {
        &self.weights
    }

    /// Mutable spawn weight table.
    pub fn weights_mut(&mut self) -> &mut SpawnWeights {
        &mut self.weights
    }

    /// Seconds between spawns.
    pub fn spawn_interval(&self) -> f64 {
        self.spawn_interval
    }

    /// Belt units per second.
    pub fn belt_speed(&self) -> f64 {
        self.belt_speed
    }
}

impl StateDigest for ConveyorFeed {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.update_f64(self.timer);
        hasher.update_u32(self.total_spawned);
        hasher.update_usize(self.queue.len());
        for entry in self.queue.iter() {
            hasher.update_i32(entry.item);
            hasher.update_f64(entry.position);
        }
    }
}
