//! Pockets
//!
//! A fixed set of bounded LIFO stacks that hold items routed off the
//! conveyor. Every pocket full at once is the overflow fail condition.

use serde::{Deserialize, Serialize};

use crate::core::hash::{StateDigest, StateHasher};
use crate::game::conveyor::ConveyorQueue;
use crate::game::item::ItemType;

/// One bounded LIFO stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pocket {
    /// Pocket index within the bank.
    pub id: usize,
    /// Maximum number of items.
    pub capacity: usize,
    items: Vec<ItemType>,
}

impl Pocket {
    /// Create an empty pocket.
    pub fn new(id: usize, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Push onto the stack. False when full.
    pub fn push(&mut self, item: ItemType) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Pop the top item.
    pub fn pop(&mut self) -> Option<ItemType> {
        self.items.pop()
    }

    /// Top item without removing it.
    pub fn peek(&self) -> Option<ItemType> {
        self.items.last().copied()
    }

    /// True when at capacity.
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// True when holding nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Remaining room.
    pub fn free_slots(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
    }

    /// Stack contents, bottom first.
    pub fn items(&self) -> &[ItemType] {
        &self.items
    }
}

/// The pocket set for one level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PocketBank {
    pockets: Vec<Pocket>,
}

impl PocketBank {
    /// Create `count` empty pockets of equal capacity.
    pub fn new(count: usize, capacity: usize) -> Self {
        Self {
            pockets: (0..count).map(|id| Pocket::new(id, capacity)).collect(),
        }
    }

    /// Put an item into the first pocket with room, scanning in index order.
    ///
    /// Returns false only when every pocket is full.
    pub fn try_add_item(&mut self, item: ItemType) -> bool {
        self.add_item(item).is_some()
    }

    /// Like [`try_add_item`](Self::try_add_item) but reports which pocket took it.
    pub fn add_item(&mut self, item: ItemType) -> Option<usize> {
        let pocket = self.pockets.iter_mut().find(|p| !p.is_full())?;
        pocket.push(item);
        Some(pocket.id)
    }

    /// Put an item into a specific pocket. False when full or out of range.
    pub fn try_add_item_at(&mut self, pocket_index: usize, item: ItemType) -> bool {
        self.pockets
            .get_mut(pocket_index)
            .is_some_and(|p| p.push(item))
    }

    /// Top item of a pocket.
    pub fn peek_top(&self, pocket_index: usize) -> Option<ItemType> {
        self.pockets.get(pocket_index)?.peek()
    }

    /// Remove and return the top item of a pocket.
    pub fn pop_top(&mut self, pocket_index: usize) -> Option<ItemType> {
        self.pockets.get_mut(pocket_index)?.pop()
    }

    /// Move a pocket's top item back onto the conveyor.
    ///
    /// Fails without mutating anything when the pocket is empty or the
    /// queue is at capacity.
    pub fn reenqueue(&mut self, pocket_index: usize, queue: &mut ConveyorQueue) -> bool {
        if queue.is_full() || self.peek_top(pocket_index).is_none() {
            return false;
        }
        match self.pop_top(pocket_index) {
            Some(item) => queue.push(item),
            None => false,
        }
    }

    /// True when no pocket has room.
    pub fn is_all_full(&self) -> bool {
        self.pockets.iter().all(Pocket::is_full)
    }

    /// True when every pocket is empty.
    pub fn is_all_empty(&self) -> bool {
        self.pockets.iter().all(Pocket::is_empty)
    }

    /// Items across all pockets.
    pub fn total_items(&self) -> usize {
        self.pockets.iter().map(Pocket::len).sum()
    }

    /// Combined capacity.
    pub fn total_capacity(&self) -> usize {
        self.pockets.iter().map(|p| p.capacity).sum()
    }

    /// Fraction of total capacity in use, 0 for an empty bank.
    pub fn fill_ratio(&self) -> f64 {
        let capacity = self.total_capacity();
        if capacity == 0 {
            return 0.0;
        }
        self.total_items() as f64 / capacity as f64
    }

    /// All pockets in index order.
    pub fn pockets(&self) -> &[Pocket] {
        &self.pockets
    }

    /// Number of pockets.
    pub fn len(&self) -> usize {
        self.pockets.len()
    }

    /// True when the bank has no pockets.
    pub fn is_empty(&self) -> bool {
        self.pockets.is_empty()
    }

    /// Empty every pocket.
    pub fn clear(&mut self) {
        for pocket in &mut self.pockets {
            pocket.items.clear();
        }
    }
}

impl StateDigest for PocketBank {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.update_usize(self.pockets.len());
        for pocket in &self.pockets {
            hasher.update_usize(pocket.capacity);
            hasher.update_usize(pocket.items.len());
            for &item in &pocket.items {
                hasher.update_i32(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pocket_overflow() {
        let mut bank = PocketBank::new(1, 3);
        assert!(bank.try_add_item(1));
        assert!(bank.try_add_item(2));
        assert!(bank.try_add_item(3));
        assert!(!bank.try_add_item(4));

        assert_eq!(bank.total_items(), 3);
        assert_eq!(bank.pockets()[0].items(), &[1, 2, 3]);
        assert!(bank.is_all_full());
    }

    #[test]
    fn test_fills_in_index_order() {
        let mut bank = PocketBank::new(3, 1);
        assert_eq!(bank.add_item(5), Some(0));
        assert_eq!(bank.add_item(6), Some(1));
        bank.pop_top(0);
        assert_eq!(bank.add_item(7), Some(0));
        assert_eq!(bank.add_item(8), Some(2));
        assert_eq!(bank.add_item(9), None);
    }

    #[test]
    fn test_lifo() {
        let mut bank = PocketBank::new(2, 4);
        assert!(bank.try_add_item_at(1, 10));
        assert!(bank.try_add_item_at(1, 11));
        assert!(!bank.try_add_item_at(7, 12));
        assert_eq!(bank.peek_top(1), Some(11));
        assert_eq!(bank.pop_top(1), Some(11));
        assert_eq!(bank.pop_top(1), Some(10));
        assert_eq!(bank.pop_top(1), None);
        assert_eq!(bank.peek_top(9), None);
    }

    #[test]
    fn test_reenqueue_back_pressure() {
        let mut bank = PocketBank::new(1, 2);
        bank.try_add_item(3);
        bank.try_add_item(4);

        let mut queue = ConveyorQueue::new(1);
        assert!(bank.reenqueue(0, &mut queue));
        assert_eq!(queue.get(0).map(|c| c.item), Some(4));

        // Queue is now full: nothing moves.
        assert!(!bank.reenqueue(0, &mut queue));
        assert_eq!(bank.total_items(), 1);
        assert_eq!(queue.len(), 1);

        let mut roomy = ConveyorQueue::new(4);
        assert!(!bank.reenqueue(5, &mut roomy));
    }

    #[test]
    fn test_fill_ratio() {
        let mut bank = PocketBank::new(2, 2);
        assert_eq!(bank.fill_ratio(), 0.0);
        bank.try_add_item(1);
        assert_eq!(bank.fill_ratio(), 0.25);
        assert_eq!(PocketBank::new(0, 3).fill_ratio(), 0.0);
        bank.clear();
        assert!(bank.is_all_empty());
    }
}
