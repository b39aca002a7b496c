//! ID types for simulation entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an entity in the simulation (enemy, projectile, ordnance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Null/invalid entity ID.
    pub const NULL: Self = Self(0);

    /// Creates an entity ID from a raw value (for deserialization and tests).
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks if this is a valid (non-null) entity ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out entity IDs in a reproducible order.
///
/// Each simulation owns its own allocator so two runs with the same inputs
/// assign the same IDs.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    /// Creates an allocator whose first ID is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns a fresh ID.
    pub fn next_id(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }
}
