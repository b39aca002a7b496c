//! Read-only view of the generated dungeon.
//!
//! The dungeon generator hands the core a passability grid, a room list and a
//! door list. Cells never change during a level; only room metadata (the
//! visited flag) is updated.

use cinder_common::{CinderError, TileCoord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cell value for a walkable tile.
pub const CELL_FLOOR: u8 = 0;
/// Cell value for a wall tile.
pub const CELL_WALL: u8 = 1;

/// Errors raised while building a grid from generator output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GridError {
    /// No rows or zero-width rows
    #[error("grid is empty")]
    Empty,
    /// Row length differs from the first row
    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged {
        /// Offending row
        row: usize,
        /// Width of the first row
        expected: usize,
        /// Width of the offending row
        found: usize,
    },
    /// Cell holds something other than floor or wall
    #[error("invalid cell value {value} at ({x}, {y})")]
    InvalidCell {
        /// Column
        x: usize,
        /// Row
        y: usize,
        /// Raw value
        value: u8,
    },
}

/// Result type for grid construction.
pub type GridResult<T> = Result<T, GridError>;

impl From<GridError> for CinderError {
    fn from(e: GridError) -> Self {
        Self::Grid(e.to_string())
    }
}

/// Axis-aligned room rectangle in tile space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Stable room id
    pub id: u32,
    /// Left column
    pub x: i32,
    /// Top row
    pub y: i32,
    /// Width in tiles
    pub width: i32,
    /// Height in tiles
    pub height: i32,
    /// Whether the player has entered the room
    pub visited: bool,
}

impl Room {
    /// Creates an unvisited room.
    #[must_use]
    pub const fn new(id: u32, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            id,
            x,
            y,
            width,
            height,
            visited: false,
        }
    }

    /// Checks whether a tile lies inside the room.
    #[must_use]
    pub fn contains(&self, tile: TileCoord) -> bool {
        tile.x >= self.x
            && tile.x < self.x + self.width
            && tile.y >= self.y
            && tile.y < self.y + self.height
    }

    /// Center tile of the room.
    #[must_use]
    pub fn center(&self) -> TileCoord {
        TileCoord::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Door tile belonging to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    /// Door position
    pub tile: TileCoord,
    /// Owning room
    pub room_id: u32,
}

/// Static passability grid plus room and door metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DungeonGrid {
    width: usize,
    height: usize,
    cells: Vec<u8>,
    rooms: Vec<Room>,
    doors: Vec<Door>,
}

impl DungeonGrid {
    /// Builds a grid from generator rows (`0` = floor, `1` = wall).
    pub fn from_rows(rows: &[Vec<u8>]) -> GridResult<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 {
            return Err(GridError::Empty);
        }

        let mut cells = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(GridError::Ragged {
                    row: y,
                    expected: width,
                    found: row.len(),
                });
            }
            for (x, &value) in row.iter().enumerate() {
                if value != CELL_FLOOR && value != CELL_WALL {
                    return Err(GridError::InvalidCell { x, y, value });
                }
                cells.push(value);
            }
        }

        Ok(Self {
            width,
            height: rows.len(),
            cells,
            rooms: Vec::new(),
            doors: Vec::new(),
        })
    }

    /// Builds a grid from ASCII art: `#` is a wall, anything else is floor.
    pub fn from_ascii(lines: &[&str]) -> GridResult<Self> {
        let rows: Vec<Vec<u8>> = lines
            .iter()
            .map(|line| {
                line.chars()
                    .map(|c| if c == '#' { CELL_WALL } else { CELL_FLOOR })
                    .collect()
            })
            .collect();
        Self::from_rows(&rows)
    }

    /// Attaches the generator's room list.
    #[must_use]
    pub fn with_rooms(mut self, rooms: Vec<Room>) -> Self {
        self.rooms = rooms;
        self
    }

    /// Attaches the generator's door list.
    #[must_use]
    pub fn with_doors(mut self, doors: Vec<Door>) -> Self {
        self.doors = doors;
        self
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Checks whether a tile lies inside the grid.
    #[must_use]
    pub fn in_bounds(&self, tile: TileCoord) -> bool {
        tile.x >= 0 && tile.y >= 0 && (tile.x as usize) < self.width && (tile.y as usize) < self.height
    }

    fn index(&self, tile: TileCoord) -> Option<usize> {
        self.in_bounds(tile)
            .then(|| tile.y as usize * self.width + tile.x as usize)
    }

    /// Walkable check. Out-of-bounds tiles are never walkable.
    #[must_use]
    pub fn is_passable(&self, tile: TileCoord) -> bool {
        self.index(tile)
            .and_then(|i| self.cells.get(i))
            .is_some_and(|&cell| cell == CELL_FLOOR)
    }

    /// Wall check. Out-of-bounds tiles count as walls.
    #[must_use]
    pub fn is_wall(&self, tile: TileCoord) -> bool {
        !self.is_passable(tile)
    }

    /// The grid's center tile (bounds-recovery target).
    #[must_use]
    pub fn center_tile(&self) -> TileCoord {
        TileCoord::new((self.width / 2) as i32, (self.height / 2) as i32)
    }

    /// All rooms.
    #[must_use]
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// All doors.
    #[must_use]
    pub fn doors(&self) -> &[Door] {
        &self.doors
    }

    /// Doors owned by a room.
    pub fn doors_of(&self, room_id: u32) -> impl Iterator<Item = &Door> {
        self.doors.iter().filter(move |d| d.room_id == room_id)
    }

    /// Room containing a tile, if any.
    #[must_use]
    pub fn room_at(&self, tile: TileCoord) -> Option<&Room> {
        self.rooms.iter().find(|r| r.contains(tile))
    }

    /// Marks a room as visited. Returns `true` on the first visit.
    pub fn mark_room_visited(&mut self, room_id: u32) -> bool {
        match self.rooms.iter_mut().find(|r| r.id == room_id) {
            Some(room) if !room.visited => {
                room.visited = true;
                true
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ascii() {
        let grid = DungeonGrid::from_ascii(&["###", "#.#", "###"]).unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 3);
        assert!(grid.is_passable(TileCoord::new(1, 1)));
        assert!(grid.is_wall(TileCoord::new(0, 0)));
    }

    #[test]
    fn test_out_of_bounds_fails_closed() {
        let grid = DungeonGrid::from_ascii(&["..", ".."]).unwrap();
        assert!(!grid.is_passable(TileCoord::new(-1, 0)));
        assert!(grid.is_wall(TileCoord::new(2, 0)));
        assert!(!grid.in_bounds(TileCoord::new(0, 2)));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = DungeonGrid::from_rows(&[vec![0, 0], vec![0]]).unwrap_err();
        assert_eq!(
            err,
            GridError::Ragged {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_invalid_cell_rejected() {
        let err = DungeonGrid::from_rows(&[vec![0, 7]]).unwrap_err();
        assert!(matches!(err, GridError::InvalidCell { x: 1, y: 0, value: 7 }));
        assert_eq!(DungeonGrid::from_rows(&[]).unwrap_err(), GridError::Empty);
    }

    #[test]
    fn test_rooms_and_doors() {
        let mut grid = DungeonGrid::from_ascii(&["......", "......", "......"])
            .unwrap()
            .with_rooms(vec![Room::new(4, 0, 0, 3, 3)])
            .with_doors(vec![Door {
                tile: TileCoord::new(3, 1),
                room_id: 4,
            }]);

        assert_eq!(grid.room_at(TileCoord::new(1, 1)).map(|r| r.id), Some(4));
        assert!(grid.room_at(TileCoord::new(5, 1)).is_none());
        assert_eq!(grid.doors_of(4).count(), 1);
        assert!(grid.mark_room_visited(4));
        assert!(!grid.mark_room_visited(4));
        assert!(!grid.mark_room_visited(99));
    }
}
