//! # Tick Event Bus
//!
//! Lock-free, bounded-capacity channel carrying notable world mutations
//! out of the simulation tick to whoever logs or forwards them (the
//! sync pipeline records its own deltas independently; this bus is for
//! local observers such as logging and metrics).
//!
//! Uses crossbeam channels for zero-allocation delivery in the hot path.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use oroboros_core::EntityId;

/// A notable mutation produced during a simulation tick.
#[derive(Clone, Debug)]
pub enum GameEvent {
    /// A block was set (placed, or otherwise written) by an action handler.
    BlockSet {
        /// Entity that caused the write, if any.
        entity_id: Option<EntityId>,
        /// Addressed layer.
        layer: u8,
        /// Block-space x coordinate.
        x: i32,
        /// Block-space y coordinate.
        y: i32,
        /// New block id.
        block_id: u32,
    },

    /// A block was cleared back to air.
    BlockDelete {
        /// Entity that caused the break, if any.
        entity_id: Option<EntityId>,
        /// Addressed layer.
        layer: u8,
        /// Block-space x coordinate.
        x: i32,
        /// Block-space y coordinate.
        y: i32,
    },

    /// An entity spawned.
    EntitySpawned {
        /// The new entity's id.
        entity_id: EntityId,
        /// Spawn position.
        position: (f32, f32),
    },

    /// An entity despawned.
    EntityDespawned {
        /// The despawned entity's id.
        entity_id: EntityId,
    },

    /// An attack landed.
    AttackHit {
        /// Attacker entity.
        attacker_id: EntityId,
        /// Target entity.
        target_id: EntityId,
        /// Damage dealt.
        damage: u32,
    },

    /// An entity died.
    EntityDied {
        /// Entity that died.
        entity_id: EntityId,
        /// Entity that caused the death, if any.
        killer_id: Option<EntityId>,
    },

    /// An action request was rejected by the bounds checker.
    ActionRejected {
        /// Entity whose action was rejected.
        entity_id: EntityId,
        /// Rejection reason, as its `Display` text.
        reason: String,
    },

    /// A moving entity's AABB overlapped another live entity's; the move
    /// was halted rather than applied.
    Collision {
        /// The entity whose move was halted.
        entity_id: EntityId,
        /// The entity it collided with.
        other_id: EntityId,
    },
}

/// Bounded channel carrying [`GameEvent`]s out of the tick loop.
pub struct EventBus {
    sender: Sender<GameEvent>,
    receiver: Receiver<GameEvent>,
}

impl EventBus {
    /// Creates a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Creates a sender handle. Clone for multiple producers.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Creates a receiver handle. Clone for multiple consumers.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }
}

/// Handle for sending [`GameEvent`]s.
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<GameEvent>,
}

impl EventSender {
    /// Sends an event without blocking. Returns `false` (and drops the
    /// event) if the channel is full; a full event channel means nothing
    /// is draining it, which is its own problem to log at the call site.
    #[inline]
    pub fn send(&self, event: GameEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Handle for receiving [`GameEvent`]s.
#[derive(Clone)]
pub struct EventReceiver {
    receiver: Receiver<GameEvent>,
}

impl EventReceiver {
    /// Drains all pending events without blocking.
    #[must_use]
    pub fn drain(&self) -> Vec<GameEvent> {
        let mut events = Vec::with_capacity(64);
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_and_drain_round_trips_events() {
        let bus = EventBus::new(16);
        let sender = bus.sender();
        let receiver = bus.receiver();

        for i in 0..5u32 {
            assert!(sender.send(GameEvent::EntitySpawned {
                entity_id: EntityId::new(i, 0),
                position: (0.0, 0.0),
            }));
        }

        let events = receiver.drain();
        assert_eq!(events.len(), 5);
        assert_eq!(receiver.pending_count(), 0);
    }

    #[test]
    fn full_channel_drops_rather_than_blocks() {
        let bus = EventBus::new(1);
        let sender = bus.sender();
        assert!(sender.send(GameEvent::EntityDespawned {
            entity_id: EntityId::new(0, 0)
        }));
        assert!(!sender.send(GameEvent::EntityDespawned {
            entity_id: EntityId::new(1, 0)
        }));
    }
}
