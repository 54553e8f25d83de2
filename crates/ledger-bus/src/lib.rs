//! # Ledger Bus
//!
//! The process-wide actor publisher the coordinator emits
//! `TOPIC_SAVE_BLOCK_COMPLETE` onto after each successful block save
//! (SPEC-6, "Upstream events"). A narrowed `shared-bus::publisher` — this
//! engine only ever publishes one event shape, so there is no topic
//! filtering or envelope layer, just a broadcast channel.

use ledger_types::{Block, Hash};
use tokio::sync::broadcast;
use tracing::debug;

/// Default channel capacity, matching `shared-bus::DEFAULT_CHANNEL_CAPACITY`.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Payload of `TOPIC_SAVE_BLOCK_COMPLETE`.
#[derive(Debug, Clone)]
pub struct SaveBlockCompleteMsg {
    pub block: Block,
}

/// Publishing side of the bus. The coordinator depends on this trait, not
/// a concrete bus, so tests can inject a capturing fake (SPEC-9 design
/// note: "explicit dependencies passed in at Open").
pub trait EventPublisher: Send + Sync {
    /// Publish a completed block save. Returns the number of receivers
    /// that got it (0 if nobody is registered — publishing is best-effort,
    /// per SPEC-6 "if one is registered").
    fn publish_save_block_complete(&self, msg: SaveBlockCompleteMsg) -> usize;
}

/// In-memory broadcast implementation, analogous to
/// `shared-bus::InMemoryEventBus`.
pub struct InMemoryLedgerBus {
    sender: broadcast::Sender<SaveBlockCompleteMsg>,
}

impl InMemoryLedgerBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to block-saved notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SaveBlockCompleteMsg> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryLedgerBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for InMemoryLedgerBus {
    fn publish_save_block_complete(&self, msg: SaveBlockCompleteMsg) -> usize {
        let height = msg.block.height();
        match self.sender.send(msg) {
            Ok(n) => {
                debug!(height, receivers = n, "published SaveBlockCompleteMsg");
                n
            }
            Err(_) => {
                debug!(height, "SaveBlockCompleteMsg dropped, no subscribers");
                0
            }
        }
    }
}

/// No-op publisher for when "no publisher is registered" (SPEC-6).
#[derive(Default)]
pub struct NullEventPublisher;

impl EventPublisher for NullEventPublisher {
    fn publish_save_block_complete(&self, _msg: SaveBlockCompleteMsg) -> usize {
        0
    }
}
