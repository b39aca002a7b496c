//! Shortest walkable routes over the static dungeon grid.
//!
//! Paths come from a cost field solved outward from the destination
//! (Dijkstra, 8-connected, uniform step cost). Every enemy chasing the player
//! asks for a route to the same tile, so one solve serves them all; the
//! [`Pathfinder`] keeps solved fields keyed by goal for that reason.

use ahash::AHashMap;
use cinder_common::TileCoord;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::grid::DungeonGrid;

const UNREACHABLE: u32 = u32::MAX;

/// Default number of goal fields kept before the cache is flushed.
pub const DEFAULT_FIELD_CACHE: usize = 16;

/// Step costs from every tile to one goal tile.
#[derive(Debug, Clone)]
pub struct DistanceField {
    goal: TileCoord,
    width: usize,
    costs: Vec<u32>,
}

impl DistanceField {
    /// Solves the field for `goal`. A goal outside the grid or on a wall
    /// yields a field where nothing is reachable.
    #[must_use]
    pub fn solve(grid: &DungeonGrid, goal: TileCoord) -> Self {
        let width = grid.width();
        let mut field = Self {
            goal,
            width,
            costs: vec![UNREACHABLE; width * grid.height()],
        };
        if !grid.is_passable(goal) {
            return field;
        }

        let mut open = BinaryHeap::new();
        field.set(goal, 0);
        open.push(Reverse((0u32, goal.y, goal.x)));

        while let Some(Reverse((cost, y, x))) = open.pop() {
            let tile = TileCoord::new(x, y);
            if cost > field.cost(tile).unwrap_or(UNREACHABLE) {
                continue;
            }
            for next in walkable_neighbors(grid, tile) {
                let next_cost = cost + 1;
                if next_cost < field.cost(next).unwrap_or(UNREACHABLE) {
                    field.set(next, next_cost);
                    open.push(Reverse((next_cost, next.y, next.x)));
                }
            }
        }

        field
    }

    /// Goal tile this field was solved for.
    #[must_use]
    pub const fn goal(&self) -> TileCoord {
        self.goal
    }

    /// Steps from `tile` to the goal, `None` if unreachable.
    #[must_use]
    pub fn cost(&self, tile: TileCoord) -> Option<u32> {
        if tile.x < 0 || tile.y < 0 || tile.x as usize >= self.width {
            return None;
        }
        self.costs
            .get(tile.y as usize * self.width + tile.x as usize)
            .copied()
            .filter(|&c| c != UNREACHABLE)
    }

    fn set(&mut self, tile: TileCoord, cost: u32) {
        let idx = tile.y as usize * self.width + tile.x as usize;
        if let Some(slot) = self.costs.get_mut(idx) {
            *slot = cost;
        }
    }

    /// Walks downhill from `start`. The result excludes `start` and ends on
    /// the goal; it is empty when `start == goal` or no route exists.
    #[must_use]
    pub fn path_from(&self, grid: &DungeonGrid, start: TileCoord) -> Vec<TileCoord> {
        let mut current_cost = match self.cost(start) {
            Some(c) if grid.is_passable(start) => c,
            _ => return Vec::new(),
        };

        let mut path = Vec::with_capacity(current_cost as usize);
        let mut current = start;
        while current_cost > 0 {
            let next = walkable_neighbors(grid, current)
                .filter_map(|n| self.cost(n).map(|c| (c, n)))
                .min_by_key(|&(c, _)| c);
            match next {
                Some((cost, tile)) if cost < current_cost => {
                    path.push(tile);
                    current = tile;
                    current_cost = cost;
                },
                _ => return Vec::new(),
            }
        }
        path
    }
}

/// Neighbors reachable in one step. Diagonal steps may not cut a wall corner.
fn walkable_neighbors(
    grid: &DungeonGrid,
    tile: TileCoord,
) -> impl Iterator<Item = TileCoord> + '_ {
    TileCoord::NEIGHBORS_8
        .iter()
        .filter(move |&&(dx, dy)| {
            let next = tile.offset(dx, dy);
            if !grid.is_passable(next) {
                return false;
            }
            dx == 0
                || dy == 0
                || (grid.is_passable(tile.offset(dx, 0)) && grid.is_passable(tile.offset(0, dy)))
        })
        .map(move |&(dx, dy)| tile.offset(dx, dy))
}

/// Uncached single query.
#[must_use]
pub fn find_path(grid: &DungeonGrid, start: TileCoord, goal: TileCoord) -> Vec<TileCoord> {
    if start == goal || !grid.is_passable(start) || !grid.is_passable(goal) {
        return Vec::new();
    }
    DistanceField::solve(grid, goal).path_from(grid, start)
}

/// Path queries with goal-keyed field reuse.
///
/// The grid is immutable for a level; call [`Pathfinder::clear`] when a new
/// level is loaded.
#[derive(Debug)]
pub struct Pathfinder {
    fields: AHashMap<TileCoord, DistanceField>,
    capacity: usize,
    solves: u64,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new(DEFAULT_FIELD_CACHE)
    }
}

impl Pathfinder {
    /// Creates a pathfinder keeping at most `capacity` solved fields.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            fields: AHashMap::new(),
            capacity: capacity.max(1),
            solves: 0,
        }
    }

    /// Ordered route from `start` to `goal`, excluding `start`.
    ///
    /// Empty when the tiles are equal, either one is outside the grid or on
    /// a wall, or no route exists.
    pub fn find_path(
        &mut self,
        grid: &DungeonGrid,
        start: TileCoord,
        goal: TileCoord,
    ) -> Vec<TileCoord> {
        if start == goal || !grid.is_passable(start) || !grid.is_passable(goal) {
            return Vec::new();
        }

        if !self.fields.contains_key(&goal) {
            if self.fields.len() >= self.capacity {
                self.fields.clear();
            }
            self.solves += 1;
            self.fields.insert(goal, DistanceField::solve(grid, goal));
        }

        self.fields
            .get(&goal)
            .map(|field| field.path_from(grid, start))
            .unwrap_or_default()
    }

    /// Number of field solves performed (cache misses).
    #[must_use]
    pub const fn solves(&self) -> u64 {
        self.solves
    }

    /// Drops every cached field.
    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn open_room() -> DungeonGrid {
        DungeonGrid::from_ascii(&[
            "########",
            "#......#",
            "#......#",
            "#......#",
            "########",
        ])
        .unwrap()
    }

    #[test]
    fn test_self_path_is_empty() {
        let grid = open_room();
        let t = TileCoord::new(2, 2);
        assert!(find_path(&grid, t, t).is_empty());
    }

    #[test]
    fn test_path_excludes_start_and_ends_at_goal() {
        let grid = open_room();
        let start = TileCoord::new(1, 1);
        let goal = TileCoord::new(6, 3);
        let path = find_path(&grid, start, goal);

        assert!(!path.contains(&start));
        assert_eq!(path.last(), Some(&goal));
        // Diagonals cost the same as straight steps.
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn test_wall_separated_is_empty() {
        let grid = DungeonGrid::from_ascii(&[
            "#######",
            "#..#..#",
            "#..#..#",
            "#..#..#",
            "#######",
        ])
        .unwrap();
        assert!(find_path(&grid, TileCoord::new(1, 2), TileCoord::new(5, 2)).is_empty());
    }

    #[test]
    fn test_invalid_endpoints_are_empty() {
        let grid = open_room();
        assert!(find_path(&grid, TileCoord::new(0, 0), TileCoord::new(2, 2)).is_empty());
        assert!(find_path(&grid, TileCoord::new(2, 2), TileCoord::new(40, 2)).is_empty());
        assert!(find_path(&grid, TileCoord::new(-3, 2), TileCoord::new(2, 2)).is_empty());
    }

    #[test]
    fn test_no_corner_cutting() {
        let grid = DungeonGrid::from_ascii(&[
            "#####",
            "#.#.#",
            "#...#",
            "#####",
        ])
        .unwrap();
        let path = find_path(&grid, TileCoord::new(1, 1), TileCoord::new(3, 1));
        // Both diagonals would squeeze past the wall at (2, 1).
        assert_eq!(
            path,
            vec![
                TileCoord::new(1, 2),
                TileCoord::new(2, 2),
                TileCoord::new(3, 2),
                TileCoord::new(3, 1),
            ]
        );
    }

    #[test]
    fn test_pathfinder_reuses_goal_field() {
        let grid = open_room();
        let mut finder = Pathfinder::default();
        let goal = TileCoord::new(6, 3);

        let a = finder.find_path(&grid, TileCoord::new(1, 1), goal);
        let b = finder.find_path(&grid, TileCoord::new(1, 3), goal);

        assert!(!a.is_empty());
        assert!(!b.is_empty());
        assert_eq!(finder.solves(), 1);
    }

    proptest! {
        #[test]
        fn prop_self_path_always_empty(x in -2i32..10, y in -2i32..7) {
            let grid = open_room();
            let t = TileCoord::new(x, y);
            prop_assert!(find_path(&grid, t, t).is_empty());
        }

        #[test]
        fn prop_paths_are_connected(sx in 1i32..7, sy in 1i32..4, gx in 1i32..7, gy in 1i32..4) {
            let grid = open_room();
            let start = TileCoord::new(sx, sy);
            let path = find_path(&grid, start, TileCoord::new(gx, gy));
            let mut prev = start;
            for step in path {
                prop_assert!(grid.is_passable(step));
                prop_assert!(prev.is_adjacent_8(step));
                prev = step;
            }
        }
    }
}
