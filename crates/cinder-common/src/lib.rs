//! # Cinder Common
//!
//! Common types shared by the Cinder simulation crates:
//! - Tile coordinates and the isometric world/tile projection
//! - Entity IDs and a deterministic ID allocator
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_round_trip_center() {
        let proj = IsoProjection::default();
        let tile = TileCoord::new(7, 3);
        assert_eq!(proj.world_to_tile(proj.tile_to_world(tile)), tile);
    }

    #[test]
    fn test_id_allocation_is_sequential() {
        let mut ids = IdAllocator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert_eq!(b.raw(), a.raw() + 1);
    }
}
