//! Typed combat events for UI, audio and HUD collaborators.
//!
//! The core publishes into an [`EventBus`]; collaborators drain it once per
//! frame. Publishing never blocks and never depends on anyone listening.

use cinder_common::EntityId;
use crossbeam_channel::{bounded, Receiver, Sender};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::enemy::{Archetype, EnemyState};

/// Who received damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageTarget {
    /// An enemy
    Enemy(EntityId),
    /// The local player
    Player,
}

/// Idle animation cue for a patrolling enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdleCue {
    /// Bob with a sleep indicator while alone
    Sleep,
    /// Brief fade in place
    FadeBob,
}

/// Why a projectile went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileEnd {
    /// Hit a wall with no bounces left
    Wall,
    /// Lifetime elapsed
    Expired,
    /// Flew past its maximum travel distance
    OutOfRange,
    /// Spent on a target
    Hit,
}

/// Events published by the simulation core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Damage landed (drives floating damage numbers)
    DamageApplied {
        /// Receiver
        target: DamageTarget,
        /// Amount actually subtracted
        amount: f32,
        /// Where the number should appear
        position: Vec2,
        /// Simulation time in milliseconds
        time: f64,
        /// Critical hit flag
        critical: bool,
    },
    /// An enemy's health changed (drives health bars)
    HealthChanged {
        /// Enemy
        entity: EntityId,
        /// Current health
        current: f32,
        /// Maximum health
        max: f32,
    },
    /// An enemy died
    EnemyDestroyed {
        /// Enemy
        entity: EntityId,
        /// Template it was spawned from
        archetype: Archetype,
        /// Death position
        position: Vec2,
        /// Experience granted
        xp: u32,
    },
    /// An enemy changed behavior state
    EnemyStateChanged {
        /// Enemy
        entity: EntityId,
        /// Previous state
        from: EnemyState,
        /// New state
        to: EnemyState,
    },
    /// Visual idle cue for a patrolling enemy
    EnemyCue {
        /// Enemy
        entity: EntityId,
        /// Cue kind
        cue: IdleCue,
    },
    /// A projectile was removed
    ProjectileDestroyed {
        /// Projectile
        entity: EntityId,
        /// Last position
        position: Vec2,
        /// Reason
        reason: ProjectileEnd,
    },
    /// An explosion resolved
    ExplosionTriggered {
        /// Center
        position: Vec2,
        /// Radius
        radius: f32,
        /// Chain depth (0 for the originating blast)
        depth: u32,
    },
    /// A laser beam was fired
    LaserFired {
        /// Beam start
        from: Vec2,
        /// Beam end
        to: Vec2,
    },
    /// The player took damage
    PlayerDamaged {
        /// Amount subtracted
        amount: f32,
        /// Health left
        remaining: f32,
        /// Attacker, if an enemy
        source: Option<EntityId>,
    },
}

/// Event bus for broadcasting combat events to collaborators.
#[derive(Debug)]
pub struct EventBus {
    sender: Sender<CombatEvent>,
    receiver: Receiver<CombatEvent>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event. If the bus is full the event is dropped.
    pub fn publish(&self, event: CombatEvent) {
        if self.sender.try_send(event).is_err() {
            tracing::trace!("event bus full, dropping event");
        }
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CombatEvent> {
        self.receiver.try_iter().collect()
    }

    /// Drains pending events into every handler, in publish order.
    pub fn dispatch(&self, handlers: &mut [&mut dyn EventHandler]) {
        for event in self.receiver.try_iter() {
            for handler in handlers.iter_mut() {
                handler.handle(&event);
            }
        }
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<CombatEvent> {
        self.sender.clone()
    }
}

/// Subscriber interface for collaborators.
pub trait EventHandler {
    /// Handles one event.
    fn handle(&mut self, event: &CombatEvent);
}
