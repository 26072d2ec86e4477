//! Chain Resolution
//!
//! The board only finds and removes clusters. This module owns the loop
//! that turns one placement into a chain reaction: remove the qualifying
//! clusters, set off chain-reactable neighbours, crack obstacles, settle,
//! then recheck every touched cell until no cluster qualifies.

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};

use crate::core::vec2::Vec2;
use crate::game::board::{Cluster, ClusterBoard, GridPos};
use crate::game::item::{ItemKind, ItemType};

/// Outcome of one placement and everything it set off.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveReport {
    /// Where the item was placed.
    pub origin: GridPos,
    /// Placed item type.
    pub item: ItemType,
    /// Removed clusters in resolution order.
    pub clusters: Vec<Cluster>,
    /// Waves resolved. 0 when the placement formed nothing.
    pub chain_depth: u32,
    /// Item cells cleared, detonations included.
    pub cleared: usize,
    /// Chain-reactable items set off by a neighbouring clear.
    pub detonated: usize,
    /// Obstacles cracked.
    pub obstacles_cleared: usize,
}

impl ResolveReport {
    /// True if the placement cleared at least one cluster.
    pub fn cleared_anything(&self) -> bool {
        self.chain_depth > 0
    }

    /// Board cells emptied by the chain: items, detonations and cracked
    /// obstacles. This is what counts toward level progress.
    pub fn cells_cleared(&self) -> usize {
        self.cleared + self.obstacles_cleared
    }
}

/// Place `item` at `pos` and resolve the full chain.
///
/// Off-board placement writes nothing and returns an empty report. With
/// `settle` set, items fall toward `y = 0` after each wave and moved cells
/// are rechecked.
pub fn place_and_resolve(board: &mut ClusterBoard, pos: GridPos, item: ItemType, settle: bool) -> ResolveReport {
    let mut report = ResolveReport {
        origin: pos,
        item,
        ..ResolveReport::default()
    };

    let mut wave: Vec<Cluster> = board.place(pos.x, pos.y, item).into_iter().collect();

    while !wave.is_empty() {
        report.chain_depth += 1;

        let mut removed = BTreeSet::new();
        for cluster in &wave {
            report.cleared += board.remove_cluster(&cluster.cells);
            removed.extend(cluster.cells.iter().copied());
        }

        let mut touched = BTreeSet::new();
        for cell in &removed {
            for next in cell.neighbors() {
                if board.in_bounds(next.x, next.y) && !removed.contains(&next) {
                    touched.insert(next);
                }
            }
        }

        // Detonations spread through adjacent chain-reactable items.
        let mut frontier: Vec<GridPos> = touched.iter().copied().collect();
        let mut i = 0;
        while i < frontier.len() {
            let cell = frontier[i];
            i += 1;
            match board.kind_at(cell) {
                Some(ItemKind::ChainReactable) => {
                    board.clear_cell(cell);
                    report.cleared += 1;
                    report.detonated += 1;
                    for next in cell.neighbors() {
                        if board.in_bounds(next.x, next.y) && touched.insert(next) {
                            frontier.push(next);
                        }
                    }
                }
                Some(ItemKind::Obstacle) => {
                    board.clear_cell(cell);
                    report.obstacles_cleared += 1;
                }
                _ => {}
            }
        }

        if settle {
            touched.extend(board.settle());
        }
        report.clusters.append(&mut wave);

        let mut claimed = BTreeSet::new();
        for cell in &touched {
            if claimed.contains(cell) {
                continue;
            }
            if let Some(cluster) = board.recheck(cell.x, cell.y) {
                claimed.extend(cluster.cells.iter().copied());
                wave.push(cluster);
            }
        }
    }

    report
}

/// Same-type cells outside the group at `pos`, as near-miss probe targets.
pub fn near_miss_targets(board: &ClusterBoard, pos: GridPos) -> Vec<Vec2> {
    let group = board.scan_cluster(pos.x, pos.y);
    if group.is_empty() {
        return Vec::new();
    }
    board
        .positions_of(group.item)
        .into_iter()
        .filter(|cell| !group.contains(*cell))
        .map(GridPos::to_vec2)
        .collect()
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::item::{ItemCatalog, EMPTY, OBSTACLE_TYPE};
    use proptest::prelude::*;

    fn board(w: i32, h: i32) -> ClusterBoard {
        ClusterBoard::new(w, h, 3, ItemCatalog::default())
    }

    #[test]
    fn test_l_tromino() {
        let mut b = board(6, 8);
        assert!(!place_and_resolve(&mut b, GridPos::new(0, 0), 1, true).cleared_anything());
        assert!(!place_and_resolve(&mut b, GridPos::new(0, 1), 1, true).cleared_anything());
        b.take_found();

        let report = place_and_resolve(&mut b, GridPos::new(1, 0), 1, true);
        assert_eq!(report.chain_depth, 1);
        assert_eq!(report.cleared, 3);
        assert_eq!(
            report.clusters[0].cells,
            vec![GridPos::new(1, 0), GridPos::new(0, 0), GridPos::new(0, 1)]
        );
        assert_eq!(b.take_found(), report.clusters);
        assert_eq!(b.item_count(), 0);
    }

    fn cascade_board() -> ClusterBoard {
        // row 2: _ _ 2
        // row 1: 2 2 _
        // row 0: 1 1 _
        let mut b = board(3, 3);
        b.set(0, 0, 1);
        b.set(1, 0, 1);
        b.set(0, 1, 2);
        b.set(1, 1, 2);
        b.set(2, 2, 2);
        b
    }

    #[test]
    fn test_settle_exposes_second_wave() {
        let mut b = cascade_board();
        let report = place_and_resolve(&mut b, GridPos::new(2, 0), 1, true);
        assert_eq!(report.chain_depth, 2);
        assert_eq!(report.cleared, 6);
        assert_eq!(report.clusters.len(), 2);
        assert_eq!(report.clusters[1].item, 2);
        assert_eq!(b.item_count(), 0);
        assert_eq!(b.take_found().len(), 2);
    }

    #[test]
    fn test_no_settle_stops_after_first_wave() {
        let mut b = cascade_board();
        let report = place_and_resolve(&mut b, GridPos::new(2, 0), 1, false);
        assert_eq!(report.chain_depth, 1);
        assert_eq!(report.cleared, 3);
        assert_eq!(b.item_count(), 3);
    }

    #[test]
    fn test_chain_reactable_detonates() {
        let catalog = ItemCatalog {
            chain_reactable: vec![5],
            ..ItemCatalog::default()
        };
        let mut b = ClusterBoard::new(6, 1, 3, catalog);
        b.set(0, 0, 1);
        b.set(1, 0, 1);
        b.set(3, 0, 5);
        b.set(4, 0, 5);
        let report = place_and_resolve(&mut b, GridPos::new(2, 0), 1, false);
        assert_eq!(report.detonated, 2);
        assert_eq!(report.cleared, 5);
        assert_eq!(b.item_count(), 0);
    }

    #[test]
    fn test_obstacle_cracks() {
        let mut b = board(5, 1);
        b.set(0, 0, 1);
        b.set(1, 0, 1);
        b.set(3, 0, OBSTACLE_TYPE);
        b.set(4, 0, OBSTACLE_TYPE);
        let report = place_and_resolve(&mut b, GridPos::new(2, 0), 1, false);
        assert_eq!(report.obstacles_cleared, 1);
        assert_eq!(report.cleared, 3);
        assert_eq!(report.cells_cleared(), 4);
        assert_eq!(b.get(4, 0), OBSTACLE_TYPE);
    }

    #[test]
    fn test_off_board_is_noop() {
        let mut b = board(3, 3);
        let report = place_and_resolve(&mut b, GridPos::new(-1, 0), 1, true);
        assert!(!report.cleared_anything());
        assert_eq!(b.item_count(), 0);
    }

    #[test]
    fn test_near_miss_targets() {
        let mut b = board(4, 4);
        b.set(0, 0, 2);
        b.set(1, 1, 2);
        b.set(3, 3, 2);
        b.set(2, 2, 3);
        let targets = near_miss_targets(&b, GridPos::new(0, 0));
        assert_eq!(targets, vec![Vec2::from_cell(1, 1), Vec2::from_cell(3, 3)]);
        assert!(near_miss_targets(&b, GridPos::new(0, 3)).is_empty());
    }

    proptest! {
        #[test]
        fn prop_resolution_is_deterministic(
            cells in proptest::collection::vec(-1i32..3, 36),
            x in 0i32..6,
            y in 0i32..6,
            item in 0i32..3,
        ) {
            let mut a = board(6, 6);
            for (i, &c) in cells.iter().enumerate() {
                a.set(i as i32 % 6, i as i32 / 6, c);
            }
            a.set(x, y, EMPTY);
            let mut b = a.clone();

            let ra = place_and_resolve(&mut a, GridPos::new(x, y), item, true);
            let rb = place_and_resolve(&mut b, GridPos::new(x, y), item, true);
            prop_assert_eq!(&ra, &rb);
            prop_assert_eq!(a.cells(), b.cells());
            let cluster_cells: usize = ra.clusters.iter().map(Cluster::len).sum();
            prop_assert_eq!(ra.cleared, cluster_cells + ra.detonated);
        }
    }
}
