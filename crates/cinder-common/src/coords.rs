//! Coordinate types for tiles and the isometric world projection.
//!
//! Dungeon cells are addressed by [`TileCoord`]. Actors live in continuous
//! world space ([`glam::Vec2`]); [`IsoProjection`] maps between the two.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Tile coordinate in the dungeon grid (column `x`, row `y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column index
    pub x: i32,
    /// Row index
    pub y: i32,
}

impl TileCoord {
    /// The eight neighbor offsets, orthogonal first.
    pub const NEIGHBORS_8: [(i32, i32); 8] = [
        (1, 0),
        (-1, 0),
        (0, 1),
        (0, -1),
        (1, 1),
        (1, -1),
        (-1, 1),
        (-1, -1),
    ];

    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this coordinate shifted by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Chebyshev distance (number of 8-directional steps ignoring walls).
    #[must_use]
    pub fn chebyshev(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Checks whether `other` is one 8-directional step away.
    #[must_use]
    pub fn is_adjacent_8(self, other: Self) -> bool {
        self != other && self.chebyshev(other) == 1
    }
}

/// Axis-aligned rectangle in world space (camera bounds, room footprints).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Rect {
    /// Creates a new rectangle.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of the given size centered on `center`.
    #[must_use]
    pub fn centered(center: Vec2, width: f32, height: f32) -> Self {
        Self::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }

    /// Checks whether a point lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// Isometric projection between tile and world coordinates.
///
/// A tile `(tx, ty)` covers a diamond whose top corner sits at
/// `origin + ((tx - ty) * w/2, (tx + ty) * h/2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsoProjection {
    /// Diamond width in world units
    pub tile_width: f32,
    /// Diamond height in world units
    pub tile_height: f32,
    /// World position of tile (0, 0)'s top corner
    pub origin: Vec2,
}

impl Default for IsoProjection {
    fn default() -> Self {
        Self::new(64.0, 32.0)
    }
}

impl IsoProjection {
    /// Creates a projection with the origin at world zero.
    #[must_use]
    pub const fn new(tile_width: f32, tile_height: f32) -> Self {
        Self {
            tile_width,
            tile_height,
            origin: Vec2::ZERO,
        }
    }

    /// Sets the world origin.
    #[must_use]
    pub const fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    /// World position of a tile's center.
    #[must_use]
    pub fn tile_to_world(&self, tile: TileCoord) -> Vec2 {
        self.fractional_to_world(tile.x as f32 + 0.5, tile.y as f32 + 0.5)
    }

    /// World position of a fractional tile coordinate.
    #[must_use]
    pub fn fractional_to_world(&self, tx: f32, ty: f32) -> Vec2 {
        let half_w = self.tile_width / 2.0;
        let half_h = self.tile_height / 2.0;
        self.origin + Vec2::new((tx - ty) * half_w, (tx + ty) * half_h)
    }

    /// Tile containing a world position.
    #[must_use]
    pub fn world_to_tile(&self, pos: Vec2) -> TileCoord {
        let frac = self.world_to_fractional(pos);
        TileCoord::new(frac.x.floor() as i32, frac.y.floor() as i32)
    }

    /// Fractional tile coordinate of a world position.
    #[must_use]
    pub fn world_to_fractional(&self, pos: Vec2) -> Vec2 {
        let local = pos - self.origin;
        let a = local.x / (self.tile_width / 2.0);
        let b = local.y / (self.tile_height / 2.0);
        Vec2::new((a + b) / 2.0, (b - a) / 2.0)
    }

    /// World-space unit normal of a tile edge given its tile-space normal.
    ///
    /// Normals transform with the inverse transpose of the projection, so an
    /// edge crossed along tile `x` maps to `(h, w)` and along `y` to `(-h, w)`.
    #[must_use]
    pub fn edge_normal(&self, tile_normal: Vec2) -> Vec2 {
        let x_axis = Vec2::new(self.tile_height, self.tile_width);
        let y_axis = Vec2::new(-self.tile_height, self.tile_width);
        (x_axis * tile_normal.x + y_axis * tile_normal.y).normalize_or_zero()
    }

    /// Sampling distance that never skips over a whole tile along a ray.
    #[must_use]
    pub fn sample_step(&self) -> f32 {
        (self.tile_width / 2.0).min(self.tile_height / 2.0).max(1.0)
    }
}
