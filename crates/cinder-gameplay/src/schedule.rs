//! Deferred actions keyed by simulation time.
//!
//! Fuses, staggered blasts and meteor drops are queued here instead of being
//! held as callbacks. Events tied to an entity are dropped when that entity is
//! destroyed, so nothing ever fires on behalf of something that is gone.

use cinder_common::EntityId;
use glam::Vec2;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// What a scheduled event does when it comes due.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduledAction {
    /// Instant blast (multi-explosion follow-ups)
    Explosion {
        /// Center
        position: Vec2,
        /// Radius
        radius: f32,
        /// Damage to each enemy inside
        damage: f32,
    },
    /// A meteor lands
    MeteorImpact {
        /// Impact point
        position: Vec2,
        /// Blast radius
        radius: f32,
        /// Damage to each enemy inside
        damage: f32,
    },
    /// Ordnance fuse runs out and it explodes
    Detonate(EntityId),
    /// Ordnance lifetime ends without a blast
    Expire(EntityId),
}

/// A queued action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    /// Simulation time it is due at (ms)
    pub due: f64,
    /// Entity whose destruction cancels the event
    pub subject: Option<EntityId>,
    /// What to do
    pub action: ScheduledAction,
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    event: ScheduledEvent,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the max-heap pops the earliest event; ties keep insertion order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .event
            .due
            .total_cmp(&self.event.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Time-ordered event queue.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Entry>,
    next_seq: u64,
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an action at `due`.
    pub fn schedule(&mut self, due: f64, subject: Option<EntityId>, action: ScheduledAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry {
            seq,
            event: ScheduledEvent { due, subject, action },
        });
    }

    /// Removes and returns every event due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: f64) -> Vec<ScheduledEvent> {
        let mut due = Vec::new();
        while self.queue.peek().is_some_and(|entry| entry.event.due <= now) {
            if let Some(entry) = self.queue.pop() {
                due.push(entry.event);
            }
        }
        due
    }

    /// Drops every event whose subject is `id`. Returns how many were dropped.
    pub fn cancel_for(&mut self, id: EntityId) -> usize {
        let before = self.queue.len();
        self.queue.retain(|entry| entry.event.subject != Some(id));
        before - self.queue.len()
    }

    /// Due time of the earliest pending event.
    #[must_use]
    pub fn next_due(&self) -> Option<f64> {
        self.queue.peek().map(|entry| entry.event.due)
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blast(x: f32) -> ScheduledAction {
        ScheduledAction::Explosion {
            position: Vec2::new(x, 0.0),
            radius: 10.0,
            damage: 1.0,
        }
    }

    #[test]
    fn test_drains_in_time_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(300.0, None, blast(3.0));
        scheduler.schedule(100.0, None, blast(1.0));
        scheduler.schedule(200.0, None, blast(2.0));

        let due = scheduler.drain_due(250.0);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].action, blast(1.0));
        assert_eq!(due[1].action, blast(2.0));
        assert_eq!(scheduler.next_due(), Some(300.0));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut scheduler = Scheduler::new();
        for i in 0..5 {
            scheduler.schedule(100.0, None, blast(i as f32));
        }
        let due = scheduler.drain_due(100.0);
        let order: Vec<_> = due.iter().map(|e| e.action).collect();
        assert_eq!(order, (0..5).map(|i| blast(i as f32)).collect::<Vec<_>>());
    }

    #[test]
    fn test_cancel_for_subject() {
        let mut scheduler = Scheduler::new();
        let mine = EntityId::from_raw(7);
        scheduler.schedule(10_000.0, Some(mine), ScheduledAction::Expire(mine));
        scheduler.schedule(500.0, None, blast(0.0));

        assert_eq!(scheduler.cancel_for(mine), 1);
        assert_eq!(scheduler.cancel_for(mine), 0);
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.drain_due(20_000.0).iter().all(|e| e.subject.is_none()));
        assert!(scheduler.is_empty());
    }
}
