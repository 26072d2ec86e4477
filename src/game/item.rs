//! Item Types and Capabilities
//!
//! Items are plain integer type ids on the board. Per-type behaviour is
//! resolved once from an [`ItemCatalog`] instead of per-item dispatch.

use serde::{Deserialize, Serialize};

/// Item type id. [`EMPTY`] marks an empty board cell.
pub type ItemType = i32;

/// Empty cell marker.
pub const EMPTY: ItemType = -1;

/// Default id used for obstacle cells.
pub const OBSTACLE_TYPE: ItemType = 100;

/// Behaviour capability of an item type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Clusters with same-type neighbours.
    Standard,
    /// Clusters like `Standard`, and detonates when an adjacent cluster clears.
    ChainReactable,
    /// Never clusters. Cracks when an adjacent cluster clears.
    Obstacle,
}

/// Maps item type ids to their capability set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemCatalog {
    /// Type ids that detonate next to a clearing cluster.
    pub chain_reactable: Vec<ItemType>,
    /// Type id placed as obstacle.
    pub obstacle: ItemType,
}

impl Default for ItemCatalog {
    fn default() -> Self {
        Self {
            chain_reactable: Vec::new(),
            obstacle: OBSTACLE_TYPE,
        }
    }
}

impl ItemCatalog {
    /// Capability of `item`, `None` for [`EMPTY`] or negative ids.
    pub fn kind(&self, item: ItemType) -> Option<ItemKind> {
        if item < 0 {
            None
        } else if item == self.obstacle {
            Some(ItemKind::Obstacle)
        } else if self.chain_reactable.contains(&item) {
            Some(ItemKind::ChainReactable)
        } else {
            Some(ItemKind::Standard)
        }
    }

    /// True if `item` takes part in connectivity search.
    #[inline]
    pub fn clusters(&self, item: ItemType) -> bool {
        matches!(
            self.kind(item),
            Some(ItemKind::Standard) | Some(ItemKind::ChainReactable)
        )
    }
}
