//! Cluster Board
//!
//! Fixed-size grid of item type ids with breadth-first cluster search.
//!
//! ## Determinism
//!
//! Neighbour enumeration always follows [`DIRECTIONS`] (up, down, left,
//! right), so the member order of a found cluster depends only on the board
//! contents and the search origin.
//!
//! ## Failure semantics
//!
//! Out-of-range coordinates are never faults: reads return [`EMPTY`], writes
//! are no-ops and searches come back empty.

use std::collections::{BTreeSet, VecDeque};
use serde::{Deserialize, Serialize};

use crate::core::hash::{StateDigest, StateHasher};
use crate::core::vec2::Vec2;
use crate::game::item::{ItemCatalog, ItemKind, ItemType, EMPTY};

/// Neighbour offsets in search order: up, down, left, right.
pub const DIRECTIONS: [(i32, i32); 4] = [(0, 1), (0, -1), (-1, 0), (1, 0)];

/// Grid coordinate. `y` grows upward; gravity pulls toward `y = 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl GridPos {
    /// Create a coordinate.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coordinate shifted by an offset.
    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// The four neighbours in [`DIRECTIONS`] order (may be off-board).
    pub fn neighbors(self) -> [GridPos; 4] {
        DIRECTIONS.map(|(dx, dy)| self.offset(dx, dy))
    }

    /// Cell centre as a position.
    #[inline]
    pub fn to_vec2(self) -> Vec2 {
        Vec2::from_cell(self.x, self.y)
    }
}

/// Same-type, 4-connected cells in BFS discovery order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Shared item type.
    pub item: ItemType,
    /// Member cells, search origin first.
    pub cells: Vec<GridPos>,
}

impl Cluster {
    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True if no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Membership test.
    pub fn contains(&self, pos: GridPos) -> bool {
        self.cells.contains(&pos)
    }
}

/// Width x height grid owned by one level.
#[derive(Clone, Debug)]
pub struct ClusterBoard {
    width: i32,
    height: i32,
    min_cluster: usize,
    cells: Vec<ItemType>,
    catalog: ItemCatalog,
    found: Vec<Cluster>,
}

impl ClusterBoard {
    /// Create an empty board. `min_cluster` below 1 is raised to 1 and
    /// negative dimensions are treated as 0.
    pub fn new(width: i32, height: i32, min_cluster: usize, catalog: ItemCatalog) -> Self {
        let mut board = Self {
            width: 0,
            height: 0,
            min_cluster: 1,
            cells: Vec::new(),
            catalog,
            found: Vec::new(),
        };
        board.initialize(width, height, min_cluster);
        board
    }

    /// Clear and reallocate the grid.
    pub fn initialize(&mut self, width: i32, height: i32, min_cluster: usize) {
        self.width = width.max(0);
        self.height = height.max(0);
        self.min_cluster = min_cluster.max(1);
        self.cells = vec![EMPTY; (self.width * self.height) as usize];
        self.found.clear();
    }

    /// Board width.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Board height.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Minimum size for a cluster to qualify.
    pub fn min_cluster(&self) -> usize {
        self.min_cluster
    }

    /// Catalog used to resolve item kinds.
    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }

    /// Raw cells, row-major from `y = 0`.
    pub fn cells(&self) -> &[ItemType] {
        &self.cells
    }

    /// Bounds check.
    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some((y * self.width + x) as usize)
        } else {
            None
        }
    }

    /// Item at a cell, [`EMPTY`] when vacant or off-board.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> ItemType {
        self.index(x, y).map_or(EMPTY, |i| self.cells[i])
    }

    /// Kind of the item at a cell.
    pub fn kind_at(&self, pos: GridPos) -> Option<ItemKind> {
        self.catalog.kind(self.get(pos.x, pos.y))
    }

    /// Write a cell without searching. Returns false off-board.
    pub fn set(&mut self, x: i32, y: i32, item: ItemType) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.cells[i] = item;
                true
            }
            None => false,
        }
    }

    /// Place an item and search for a cluster from it.
    ///
    /// Returns the cluster size when it reaches `min_cluster` (recording a
    /// cluster-found observation), otherwise 0. Off-board is a no-op.
    pub fn place_item(&mut self, x: i32, y: i32, item: ItemType) -> usize {
        self.place(x, y, item).map_or(0, |cluster| cluster.len())
    }

    /// Like [`place_item`](Self::place_item) but returns the qualifying cluster.
    pub fn place(&mut self, x: i32, y: i32, item: ItemType) -> Option<Cluster> {
        if !self.set(x, y, item) {
            return None;
        }
        self.recheck(x, y)
    }

    /// Search from an existing cell without writing it.
    ///
    /// Records an observation and returns the cluster if it qualifies.
    pub fn recheck(&mut self, x: i32, y: i32) -> Option<Cluster> {
        let cluster = self.scan_cluster(x, y);
        if cluster.is_empty() || cluster.len() < self.min_cluster {
            return None;
        }
        self.found.push(cluster.clone());
        Some(cluster)
    }

    /// Breadth-first search over same-type 4-connected cells.
    ///
    /// Returns every connected cell regardless of `min_cluster`. Empty,
    /// obstacle and off-board origins produce an empty cluster.
    pub fn scan_cluster(&self, x: i32, y: i32) -> Cluster {
        let item = self.get(x, y);
        let mut cluster = Cluster {
            item,
            cells: Vec::new(),
        };
        let Some(start) = self.index(x, y) else {
            return cluster;
        };
        if !self.catalog.clusters(item) {
            return cluster;
        }

        let mut visited = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();
        visited[start] = true;
        queue.push_back(GridPos::new(x, y));

        while let Some(pos) = queue.pop_front() {
            cluster.cells.push(pos);
            for next in pos.neighbors() {
                let Some(i) = self.index(next.x, next.y) else {
                    continue;
                };
                if visited[i] || self.cells[i] != item {
                    continue;
                }
                visited[i] = true;
                queue.push_back(next);
            }
        }

        cluster
    }

    /// Clear listed cells. Off-board entries are ignored.
    ///
    /// Returns how many non-empty cells were cleared. Chain continuation is
    /// the caller's job (see `game::resolve`).
    pub fn remove_cluster(&mut self, cells: &[GridPos]) -> usize {
        let mut cleared = 0;
        for pos in cells {
            if self.clear_cell(*pos) != EMPTY {
                cleared += 1;
            }
        }
        cleared
    }

    /// Empty a single cell, returning what was there.
    pub fn clear_cell(&mut self, pos: GridPos) -> ItemType {
        match self.index(pos.x, pos.y) {
            Some(i) => std::mem::replace(&mut self.cells[i], EMPTY),
            None => EMPTY,
        }
    }

    /// Drop every item toward `y = 0`, closing gaps within each column.
    ///
    /// Returns the destination of every item that moved, ordered by column
    /// then row.
    pub fn settle(&mut self) -> Vec<GridPos> {
        let mut moved = Vec::new();
        for x in 0..self.width {
            let mut write_y = 0;
            for read_y in 0..self.height {
                let item = self.get(x, read_y);
                if item == EMPTY {
                    continue;
                }
                if read_y != write_y {
                    self.set(x, write_y, item);
                    self.set(x, read_y, EMPTY);
                    moved.push(GridPos::new(x, write_y));
                }
                write_y += 1;
            }
        }
        moved
    }

    /// True if the cell is on-board and vacant.
    pub fn is_empty(&self, x: i32, y: i32) -> bool {
        self.in_bounds(x, y) && self.get(x, y) == EMPTY
    }

    /// Vacant cells in row-major order from `y = 0`.
    pub fn empty_positions(&self) -> Vec<GridPos> {
        self.positions_where(|item| item == EMPTY)
    }

    /// Cells holding exactly `item`, row-major order.
    pub fn positions_of(&self, item: ItemType) -> Vec<GridPos> {
        self.positions_where(|cell| cell == item)
    }

    fn positions_where(&self, pred: impl Fn(ItemType) -> bool) -> Vec<GridPos> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if pred(self.get(x, y)) {
                    out.push(GridPos::new(x, y));
                }
            }
        }
        out
    }

    /// Number of occupied cells (obstacles included).
    pub fn item_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != EMPTY).count()
    }

    /// Total cell count.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Item types with a group exactly one cell short of qualifying.
    pub fn one_short_types(&self) -> BTreeSet<ItemType> {
        let mut types = BTreeSet::new();
        if self.min_cluster < 2 {
            return types;
        }
        let mut seen = vec![false; self.cells.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let Some(i) = self.index(x, y) else {
                    continue;
                };
                if seen[i] || !self.catalog.clusters(self.cells[i]) {
                    continue;
                }
                let group = self.scan_cluster(x, y);
                for pos in &group.cells {
                    if let Some(j) = self.index(pos.x, pos.y) {
                        seen[j] = true;
                    }
                }
                if group.len() + 1 == self.min_cluster {
                    types.insert(group.item);
                }
            }
        }
        types
    }

    /// Drain cluster-found observations recorded since the last call.
    pub fn take_found(&mut self) -> Vec<Cluster> {
        std::mem::take(&mut self.found)
    }
}

impl StateDigest for ClusterBoard {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.update_i32(self.width);
        hasher.update_i32(self.height);
        hasher.update_usize(self.min_cluster);
        for &cell in &self.cells {
            hasher.update_i32(cell);
        }
    }
}
